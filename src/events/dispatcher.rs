//! In-process publish/subscribe for lifecycle events.
//!
//! Two delivery styles share one dispatcher:
//!
//! - **Listeners** (`on` / `off` / `off_all`): synchronous callbacks, run in
//!   registration order on the dispatching task. A panicking listener is
//!   logged and skipped; the remaining listeners still run.
//! - **Channels** (`subscribe`): an unbounded receiver per subscriber that
//!   gets a clone of every event of one kind, in dispatch order.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{error, trace};

use super::{BridgeEvent, EventKind};

// ============================================================================
// Types
// ============================================================================

/// Listener callback.
///
/// Keep the returned `Arc` to remove the listener later with
/// [`EventDispatcher::off`].
pub type Listener = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// Listener lists keyed by event kind.
type ListenerMap = FxHashMap<EventKind, Vec<Listener>>;

/// Channel subscribers keyed by event kind.
type ChannelMap = FxHashMap<EventKind, Vec<mpsc::UnboundedSender<BridgeEvent>>>;

// ============================================================================
// EventDispatcher
// ============================================================================

/// Event registry shared by the connection manager and subscribers.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    /// Callback listeners.
    listeners: Arc<Mutex<ListenerMap>>,
    /// Channel subscribers.
    channels: Arc<Mutex<ChannelMap>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.lock().values().map(Vec::len).sum::<usize>())
            .field("channels", &self.channels.lock().values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

// ============================================================================
// EventDispatcher - Listeners
// ============================================================================

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `kind` and returns its handle.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Listener
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.add_listener(kind, Arc::clone(&listener));
        listener
    }

    /// Appends an existing listener handle for `kind`.
    ///
    /// The same handle may be registered more than once.
    pub fn add_listener(&self, kind: EventKind, listener: Listener) {
        self.listeners.lock().entry(kind).or_default().push(listener);
    }

    /// Removes the first registration of `listener` for `kind`.
    ///
    /// Returns `true` if a registration was removed.
    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(list) = listeners.get_mut(&kind) else {
            return false;
        };

        match list.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every listener and channel for `kind`.
    ///
    /// Other kinds are untouched.
    pub fn off_all(&self, kind: EventKind) {
        self.listeners.lock().remove(&kind);
        self.channels.lock().remove(&kind);
    }

    /// Returns the number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }
}

// ============================================================================
// EventDispatcher - Channels
// ============================================================================

impl EventDispatcher {
    /// Subscribes to every future event of `kind`.
    ///
    /// Dropping the receiver unsubscribes on the next dispatch.
    #[must_use]
    pub fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<BridgeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.lock().entry(kind).or_default().push(tx);
        rx
    }
}

// ============================================================================
// EventDispatcher - Dispatch
// ============================================================================

impl EventDispatcher {
    /// Delivers `event` to every listener and channel of its kind.
    ///
    /// Listeners run outside the registry lock, so they may register or
    /// remove listeners themselves. Listener panics never escape.
    pub fn dispatch(&self, event: &BridgeEvent) {
        let kind = event.kind();

        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        trace!(event = %kind, listeners = snapshot.len(), "Dispatching event");

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(event = %kind, "Event listener panicked");
            }
        }

        if let Some(senders) = self.channels.lock().get_mut(&kind) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

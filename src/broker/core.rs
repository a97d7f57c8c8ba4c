//! Invocation broker.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::codec::{HostValue, SafeValue};
use crate::error::{Error, Result};
use crate::events::{BridgeEvent, EventKind, Listener};
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::transport::ConnectionManager;

use super::call::PendingCall;
use super::pending::PendingTable;

// ============================================================================
// InvocationBroker
// ============================================================================

struct BrokerInner {
    connection: ConnectionManager,
    pending: Arc<Mutex<PendingTable>>,
    listener: Listener,
}

impl Drop for BrokerInner {
    fn drop(&mut self) {
        self.connection
            .events()
            .off(EventKind::Message, &self.listener);
    }
}

/// Issues correlated invocations over a [`ConnectionManager`].
///
/// The broker owns its pending table; nothing outside [`invoke`](Self::invoke)
/// and the inbound `message` handler touches it. Cloning yields another
/// handle to the same broker.
#[derive(Clone)]
pub struct InvocationBroker {
    inner: Arc<BrokerInner>,
}

impl std::fmt::Debug for InvocationBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationBroker")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl InvocationBroker {
    /// Creates a broker and subscribes it to inbound frames.
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        let pending = Arc::new(Mutex::new(PendingTable::default()));
        let table = Arc::downgrade(&pending);

        let listener = connection.events().on(EventKind::Message, move |event| {
            if let (BridgeEvent::Message(text), Some(table)) = (event, table.upgrade()) {
                Self::handle_inbound(&table, text);
            }
        });

        Self {
            inner: Arc::new(BrokerInner {
                connection,
                pending,
                listener,
            }),
        }
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    /// Registers the inbound listener again after `off_all(Message)`.
    ///
    /// Never leaves more than one registration behind.
    pub(crate) fn reattach(&self) {
        let events = self.inner.connection.events();
        events.off(EventKind::Message, &self.inner.listener);
        events.add_listener(EventKind::Message, Arc::clone(&self.inner.listener));
    }
}

// ============================================================================
// InvocationBroker - Invocation
// ============================================================================

impl InvocationBroker {
    /// Sends `command` with `args` and returns a handle to the reply.
    ///
    /// Pass `()` when the command takes no arguments.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionUnavailable`] if the connection is not open. No
    ///   frame is sent and no id is allocated.
    /// - [`Error::Json`] if the frame cannot be serialized
    pub fn invoke(
        &self,
        command: impl Into<String>,
        args: impl Into<HostValue>,
    ) -> Result<PendingCall> {
        let command = command.into();
        let connection = &self.inner.connection;

        if !connection.is_connected() {
            warn!(command = %command, state = %connection.state(), "Invocation while not connected");
            return Err(Error::connection_unavailable(command));
        }

        let payload = connection.codec().encode(&args.into());
        let (result_id, error_id, receiver) = self.inner.pending.lock().register();

        let message = OutboundMessage::new(command.as_str(), result_id, error_id, payload);
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                self.inner.pending.lock().discard(result_id, error_id);
                return Err(Error::Json(e));
            }
        };

        if !connection.send_text(text) {
            self.inner.pending.lock().discard(result_id, error_id);
            return Err(Error::connection_unavailable(command));
        }

        debug!(command = %command, %result_id, %error_id, "Invocation sent");

        Ok(PendingCall::new(
            command,
            result_id,
            error_id,
            receiver,
            connection.codec().clone(),
            Arc::downgrade(&self.inner.pending),
        ))
    }

    /// Invokes `command` and waits for the decoded reply.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke) and [`PendingCall::wait`].
    pub async fn call(
        &self,
        command: impl Into<String>,
        args: impl Into<HostValue>,
    ) -> Result<HostValue> {
        self.invoke(command, args)?.await
    }

    /// Invokes `command` and waits at most `timeout` for the reply.
    ///
    /// # Errors
    ///
    /// [`Error::RequestTimeout`] on expiry, otherwise as [`call`](Self::call).
    pub async fn call_with_timeout(
        &self,
        command: impl Into<String>,
        args: impl Into<HostValue>,
        timeout: Duration,
    ) -> Result<HostValue> {
        self.invoke(command, args)?.wait_timeout(timeout).await
    }

    /// Rejects every outstanding invocation with [`Error::ConnectionClosed`].
    ///
    /// Returns the number of invocations cancelled. Never called implicitly.
    pub fn cancel_pending(&self) -> usize {
        let count = self.inner.pending.lock().clear();
        if count > 0 {
            info!(count, "Cancelled pending invocations");
        }
        count
    }

    /// Returns the number of outstanding invocations.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

// ============================================================================
// InvocationBroker - Inbound
// ============================================================================

impl InvocationBroker {
    /// Matches an inbound frame against the pending table.
    ///
    /// Malformed frames are logged and dropped. Unknown ids are ignored.
    fn handle_inbound(table: &Mutex<PendingTable>, text: &str) {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping malformed inbound frame");
                return;
            }
        };

        if !message.is_reply() {
            trace!("Uncorrelated frame ignored");
            return;
        }

        let mut table = table.lock();

        if let Some(result_id) = message.result_id {
            if table.settle(result_id, message.result.unwrap_or(SafeValue::Null)) {
                debug!(%result_id, "Invocation resolved");
            } else {
                trace!(%result_id, "No pending invocation for id");
            }
        }

        if let Some(error_id) = message.error_id {
            if table.settle(error_id, message.error.unwrap_or(SafeValue::Null)) {
                debug!(%error_id, "Invocation rejected");
            } else {
                trace!(%error_id, "No pending invocation for id");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

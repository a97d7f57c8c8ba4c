//! Managed WebSocket connection with automatic reconnect.
//!
//! # Event Loop
//!
//! Each successful handshake spawns one link task that handles:
//!
//! - Incoming text frames, dispatched as `message` events
//! - Outgoing frames queued by [`ConnectionManager::send`]
//! - The close handshake, reported as a single `close` event
//!
//! Links are numbered. A link whose number no longer matches the manager's
//! current one has been superseded and exits without touching shared state.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::codec::{Codec, HostValue};
use crate::error::{Error, Result};
use crate::events::{BridgeEvent, CLOSE_NO_STATUS, CLOSE_NORMAL, CloseInfo, EventDispatcher};

use super::config::BridgeConfig;
use super::reconnect::ReconnectTimer;
use super::state::ConnectionState;

// ============================================================================
// Types
// ============================================================================

/// Client-side socket.
type LinkStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a link.
type LinkSink = SplitSink<LinkStream, Message>;

// ============================================================================
// LinkCommand
// ============================================================================

/// Internal commands for the link task.
enum LinkCommand {
    /// Send a text frame.
    Text(String),
    /// Start the close handshake.
    Close(CloseInfo),
}

// ============================================================================
// Link
// ============================================================================

/// One socket attempt and its task.
struct Link {
    generation: u64,
    /// Present once the handshake completed.
    outbound: Option<mpsc::UnboundedSender<LinkCommand>>,
    task: Option<JoinHandle<()>>,
}

// ============================================================================
// ManagerState
// ============================================================================

/// Mutable manager state, guarded by a single lock.
#[derive(Default)]
struct ManagerState {
    phase: ConnectionState,
    should_reconnect: bool,
    /// `connect()` arrived while the previous link was still closing.
    reopen: bool,
    link: Option<Link>,
    generation: u64,
    /// Consecutive reconnect attempts since the last open.
    attempts: u32,
    reconnect: ReconnectTimer,
}

impl ManagerState {
    /// Moves to `next`, logging illegal jumps.
    fn advance(&mut self, next: ConnectionState) {
        if !self.phase.can_transition_to(next) {
            warn!(from = %self.phase, to = %next, "Unexpected state transition");
        }
        trace!(from = %self.phase, to = %next, "State transition");
        self.phase = next;
    }

    #[inline]
    fn is_current(&self, generation: u64) -> bool {
        self.link.as_ref().is_some_and(|l| l.generation == generation)
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

struct ManagerInner {
    config: BridgeConfig,
    codec: Codec,
    events: EventDispatcher,
    state: Mutex<ManagerState>,
}

/// Owns the WebSocket to the host and keeps it alive.
///
/// Lifecycle signals go to the shared [`EventDispatcher`]. Cloning yields
/// another handle to the same connection.
///
/// # Thread Safety
///
/// `ConnectionManager` is `Send + Sync`. Events are always dispatched with
/// no internal lock held, so listeners may call back into the manager.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint.as_ref().map(Url::as_str))
            .field("state", &state.phase)
            .field("should_reconnect", &state.should_reconnect)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Construction
// ============================================================================

impl ConnectionManager {
    /// Creates a disconnected manager.
    #[must_use]
    pub fn new(config: BridgeConfig, codec: Codec, events: EventDispatcher) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                codec,
                events,
                state: Mutex::new(ManagerState::default()),
            }),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Returns the codec used by [`send`](Self::send).
    #[inline]
    #[must_use]
    pub fn codec(&self) -> &Codec {
        &self.inner.codec
    }

    /// Returns the event dispatcher.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventDispatcher {
        &self.inner.events
    }
}

// ============================================================================
// ConnectionManager - Queries
// ============================================================================

impl ConnectionManager {
    /// Returns the current phase.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().phase
    }

    /// Returns `true` if frames can be sent.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns `true` if no socket exists.
    #[inline]
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.state() == ConnectionState::Disconnected
    }

    /// Returns `true` if a reconnect attempt is scheduled.
    #[inline]
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.inner.state.lock().reconnect.is_pending()
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Opens the connection if it is not already open or opening.
    ///
    /// Without a configured endpoint this logs a warning and does nothing.
    /// Re-enables auto-reconnect when the configuration asks for it. While
    /// the previous link is still closing, the new link opens as soon as
    /// that close completes.
    ///
    /// Must be called within a Tokio runtime.
    pub fn connect(&self) {
        let Some(endpoint) = self.inner.config.endpoint.as_ref() else {
            warn!("No endpoint configured, connect ignored");
            return;
        };

        info!(endpoint = %endpoint, "Connecting");

        let mut state = self.inner.state.lock();
        state.should_reconnect = self.inner.config.auto_reconnect;
        state.attempts = 0;
        state.reconnect.cancel();

        if state.phase == ConnectionState::Closing {
            debug!("Previous link still closing, reopen deferred");
            state.reopen = true;
            return;
        }

        Self::open_link(&self.inner, &mut state);
    }

    /// Closes the connection and disables auto-reconnect.
    ///
    /// `code` defaults to 1000 and `reason` to empty. Any scheduled
    /// reconnect attempt is cancelled.
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) {
        let info = CloseInfo::new(code.unwrap_or(CLOSE_NORMAL), reason.unwrap_or_default());

        let aborted = {
            let mut state = self.inner.state.lock();
            state.should_reconnect = false;
            state.reopen = false;
            if state.reconnect.cancel() {
                debug!("Cancelled scheduled reconnect");
            }

            match state.phase {
                ConnectionState::Open => {
                    state.advance(ConnectionState::Closing);
                    if let Some(tx) = state.link.as_ref().and_then(|l| l.outbound.as_ref()) {
                        let _ = tx.send(LinkCommand::Close(info.clone()));
                    }
                    None
                }

                ConnectionState::Connecting => {
                    if let Some(task) = state.link.take().and_then(|l| l.task) {
                        task.abort();
                    }
                    state.advance(ConnectionState::Closing);
                    state.advance(ConnectionState::Disconnected);
                    Some(CloseInfo {
                        was_clean: false,
                        ..info.clone()
                    })
                }

                ConnectionState::Closing | ConnectionState::Disconnected => None,
            }
        };

        debug!(code = info.code, reason = %info.reason, "Close requested");

        if let Some(info) = aborted {
            self.inner.events.dispatch(&BridgeEvent::Close(info));
        }
    }

    /// Starts a link unless one exists. Caller holds the state lock.
    fn open_link(inner: &Arc<ManagerInner>, state: &mut ManagerState) {
        if state.phase != ConnectionState::Disconnected {
            debug!(state = %state.phase, "Connection already active");
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        state.advance(ConnectionState::Connecting);

        let task = tokio::spawn(Self::run_link(Arc::downgrade(inner), generation));
        state.link = Some(Link {
            generation,
            outbound: None,
            task: Some(task),
        });
    }
}

// ============================================================================
// ConnectionManager - Sending
// ============================================================================

impl ConnectionManager {
    /// Encodes `value` and sends it as one text frame.
    ///
    /// Returns `false` (and logs a warning) when the connection is not open.
    pub fn send(&self, value: &HostValue) -> bool {
        let wire = self.inner.codec.encode(value);
        match serde_json::to_string(&wire) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize outbound value");
                false
            }
        }
    }

    /// Sends a pre-serialized text frame.
    pub(crate) fn send_text(&self, text: String) -> bool {
        let state = self.inner.state.lock();

        if state.phase != ConnectionState::Open {
            warn!(state = %state.phase, "Connection not open, message dropped");
            return false;
        }

        let Some(tx) = state.link.as_ref().and_then(|l| l.outbound.as_ref()) else {
            warn!("Connection has no outbound channel, message dropped");
            return false;
        };

        trace!(bytes = text.len(), "Queueing frame");
        tx.send(LinkCommand::Text(text)).is_ok()
    }
}

// ============================================================================
// ConnectionManager - Link Task
// ============================================================================

impl ConnectionManager {
    /// Performs the handshake and runs the link until it closes.
    async fn run_link(inner: Weak<ManagerInner>, generation: u64) {
        let Some(request) = inner.upgrade().map(|i| Self::build_request(&i.config)) else {
            return;
        };

        let stream = match request {
            Ok(request) => connect_async(request)
                .await
                .map(|(stream, _)| stream)
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        let Some(manager) = inner.upgrade() else {
            return;
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Connection attempt failed");
                if manager.state.lock().is_current(generation) {
                    manager.events.dispatch(&BridgeEvent::Error(e.to_string()));
                    Self::finish_link(&manager, generation, CloseInfo::abnormal(e.to_string()));
                }
                return;
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        {
            let mut state = manager.state.lock();
            if !state.is_current(generation) || state.phase != ConnectionState::Connecting {
                debug!(generation, "Superseded link discarded");
                return;
            }

            state.advance(ConnectionState::Open);
            state.attempts = 0;
            if let Some(link) = state.link.as_mut() {
                link.outbound = Some(outbound_tx);
            }
        }

        info!(generation, "Connection open");
        manager.events.dispatch(&BridgeEvent::Open);

        let events = manager.events.clone();
        drop(manager);

        let info = Self::pump(stream, outbound_rx, &events).await;

        if let Some(manager) = inner.upgrade() {
            Self::finish_link(&manager, generation, info);
        }
    }

    /// Builds the handshake request with the sub-protocol header.
    fn build_request(config: &BridgeConfig) -> Result<Request> {
        let endpoint = config
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::config("No endpoint configured"))?;

        let mut request = endpoint.as_str().into_client_request()?;

        if !config.protocols.is_empty() {
            let value = HeaderValue::from_str(&config.protocols.join(", "))
                .map_err(|e| Error::config(format!("Invalid sub-protocol list: {e}")))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        Ok(request)
    }

    /// Frame loop for an open link.
    async fn pump(
        stream: LinkStream,
        mut outbound_rx: mpsc::UnboundedReceiver<LinkCommand>,
        events: &EventDispatcher,
    ) -> CloseInfo {
        let (mut ws_write, mut ws_read) = stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(bytes = text.len(), "Frame received");
                            events.dispatch(&BridgeEvent::Message(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!("WebSocket closed by remote");
                            let _ = ws_write.close().await;
                            return frame.map_or_else(
                                || CloseInfo::new(CLOSE_NO_STATUS, ""),
                                |f| CloseInfo::new(u16::from(f.code), f.reason.as_str()),
                            );
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            events.dispatch(&BridgeEvent::Error(e.to_string()));
                            return CloseInfo::abnormal(e.to_string());
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            return CloseInfo::abnormal("stream ended");
                        }

                        // Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = outbound_rx.recv() => {
                    match command {
                        Some(LinkCommand::Text(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                events.dispatch(&BridgeEvent::Error(e.to_string()));
                                return CloseInfo::abnormal(e.to_string());
                            }
                        }

                        Some(LinkCommand::Close(info)) => {
                            Self::send_close(&mut ws_write, &info).await;
                            return info;
                        }

                        None => {
                            debug!("Outbound channel closed");
                            let _ = ws_write.close().await;
                            return CloseInfo::new(CLOSE_NORMAL, "");
                        }
                    }
                }
            }
        }
    }

    /// Sends a close frame and flushes the sink.
    async fn send_close(ws_write: &mut LinkSink, info: &CloseInfo) {
        let frame = CloseFrame {
            code: CloseCode::from(info.code),
            reason: info.reason.clone().into(),
        };

        if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
            debug!(error = %e, "Close frame not delivered");
        }
        let _ = ws_write.close().await;
    }

    /// Tears down a finished link and reports the close.
    fn finish_link(inner: &Arc<ManagerInner>, generation: u64, info: CloseInfo) {
        {
            let mut state = inner.state.lock();
            if !state.is_current(generation) {
                return;
            }

            state.link = None;
            if state.phase != ConnectionState::Closing {
                state.advance(ConnectionState::Closing);
            }
            state.advance(ConnectionState::Disconnected);

            if state.reopen {
                state.reopen = false;
                debug!(generation, "Opening deferred connection");
                Self::open_link(inner, &mut state);
            } else if state.should_reconnect {
                Self::schedule_reconnect(inner, &mut state);
            }
        }

        info!(code = info.code, reason = %info.reason, clean = info.was_clean, "Connection closed");
        inner.events.dispatch(&BridgeEvent::Close(info));
    }

    /// Arms the reconnect timer. Caller holds the state lock.
    fn schedule_reconnect(inner: &Arc<ManagerInner>, state: &mut ManagerState) {
        let attempt = state.attempts + 1;
        let policy = &inner.config.reconnect;

        if !policy.allows(attempt) {
            warn!(attempts = state.attempts, "Reconnect attempts exhausted");
            state.should_reconnect = false;
            return;
        }

        let delay = policy.delay(inner.config.reconnect_interval(), attempt);
        let weak = Arc::downgrade(inner);

        let scheduled = state.reconnect.schedule(delay, async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            let mut state = inner.state.lock();
            state.reconnect.clear();
            if !state.should_reconnect {
                return;
            }

            state.attempts = attempt;
            info!(attempt, "Reconnecting");
            Self::open_link(&inner, &mut state);
        });

        if scheduled {
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! WebSocket server side of the bridge.
//!
//! Accepts any number of surface connections on one port and answers their
//! command frames through a [`CommandRouter`].
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HostServer                 │
//! │             (single port)               │
//! │  ┌─────────────────────────────────┐    │
//! │  │ ClientId(a) → outbound queue    │    │
//! │  │ ClientId(b) → outbound queue    │    │
//! │  └─────────────────────────────────┘    │
//! │           CommandRouter                 │
//! └─────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::result::Result as StdResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, warn};

use crate::codec::HostValue;
use crate::error::{Error, Result};
use crate::identifiers::ClientId;
use crate::protocol::OutboundMessage;

use super::router::CommandRouter;

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (localhost).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Close code sent to clients on shutdown.
const CLOSE_GOING_AWAY: u16 = 1001;

// ============================================================================
// HostServer
// ============================================================================

/// Serves bridge clients on a single port.
///
/// # Example
///
/// ```ignore
/// let router = CommandRouter::new().with_fn("echo", |p| async move { Ok(p) });
/// let server = HostServer::bind(DEFAULT_BIND_IP, 0, router).await?;
/// println!("listening on {}", server.ws_url());
/// ```
pub struct HostServer {
    ip: IpAddr,
    port: u16,
    /// Required request path, if any.
    path: Option<String>,
    router: CommandRouter,
    clients: RwLock<FxHashMap<ClientId, mpsc::UnboundedSender<Message>>>,
    shutdown: AtomicBool,
}

impl std::fmt::Debug for HostServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServer")
            .field("addr", &SocketAddr::new(self.ip, self.port))
            .field("path", &self.path)
            .field("clients", &self.client_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HostServer - Constructor
// ============================================================================

impl HostServer {
    /// Binds to `ip:port` (0 for random) and starts the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16, router: CommandRouter) -> Result<Arc<Self>> {
        Self::bind_inner(ip, port, None, router).await
    }

    /// Like [`bind`](Self::bind), refusing handshakes for any other path.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `path` does not start with `/`
    /// - [`Error::Io`] if binding fails
    pub async fn bind_with_path(
        ip: IpAddr,
        port: u16,
        path: impl Into<String>,
        router: CommandRouter,
    ) -> Result<Arc<Self>> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(Error::config(format!("Path must start with '/': '{path}'")));
        }
        Self::bind_inner(ip, port, Some(path), router).await
    }

    async fn bind_inner(
        ip: IpAddr,
        port: u16,
        path: Option<String>,
        router: CommandRouter,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "Host server bound");

        let server = Arc::new(Self {
            ip,
            port: actual_port,
            path,
            router,
            clients: RwLock::new(FxHashMap::default()),
            shutdown: AtomicBool::new(false),
        });

        let server_clone = Arc::clone(&server);
        tokio::spawn(async move {
            server_clone.accept_loop(listener).await;
        });

        info!(port = actual_port, commands = ?server.router.commands(), "Host server started");

        Ok(server)
    }
}

// ============================================================================
// HostServer - Public API
// ============================================================================

impl HostServer {
    /// Returns the URL clients connect to.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!(
            "ws://{}{}",
            SocketAddr::new(self.ip, self.port),
            self.path.as_deref().unwrap_or("")
        )
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the number of connected clients.
    #[inline]
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Sends an unsolicited value to every client.
    ///
    /// Returns the number of clients it was queued for.
    pub fn broadcast(&self, value: &HostValue) -> usize {
        match serde_json::to_string(&self.router.codec().encode(value)) {
            Ok(text) => self.broadcast_text(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize broadcast");
                0
            }
        }
    }

    /// Sends a raw text frame to every client.
    pub fn broadcast_text(&self, text: impl Into<String>) -> usize {
        let text = text.into();
        self.push_all(|| Message::Text(text.clone().into()))
    }

    /// Closes every client connection with `code` and `reason`.
    ///
    /// Returns the number of clients asked to close.
    pub fn close_clients(&self, code: u16, reason: &str) -> usize {
        let count = self.push_all(|| {
            Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_owned().into(),
            }))
        });
        debug!(count, code, "Closing clients");
        count
    }

    /// Stops accepting and closes every client.
    pub fn shutdown(&self) {
        info!("Host server shutting down");
        self.shutdown.store(true, Ordering::SeqCst);
        self.close_clients(CLOSE_GOING_AWAY, "Server shutting down");
    }

    fn push_all(&self, make: impl Fn() -> Message) -> usize {
        self.clients
            .read()
            .values()
            .filter(|tx| tx.send(make()).is_ok())
            .count()
    }
}

// ============================================================================
// HostServer - Accept Loop
// ============================================================================

impl HostServer {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Accept loop shutting down");
                break;
            }

            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades one TCP connection and serves it until it closes.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let required_path = self.path.clone();
        let callback = move |request: &Request, response: Response| {
            negotiate(required_path.as_deref(), request, response)
        };

        let ws_stream = accept_hdr_async(stream, callback)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        let client_id = ClientId::generate();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        self.clients.write().insert(client_id, tx.clone());

        info!(client = %client_id, ?addr, "Client connected");

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let server = Arc::clone(&self);
                            let reply_tx = tx.clone();
                            tokio::spawn(async move {
                                if let Some(reply) = server.handle_frame(text.as_str()).await {
                                    let _ = reply_tx.send(Message::Text(reply.into()));
                                }
                            });
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(client = %client_id, "Client closed connection");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(client = %client_id, error = %e, "WebSocket error");
                            break;
                        }

                        None => break,

                        // Binary, Ping, Pong
                        _ => {}
                    }
                }

                outgoing = rx.recv() => {
                    let Some(message) = outgoing else { break };
                    let closing = matches!(message, Message::Close(_));

                    if let Err(e) = ws_write.send(message).await {
                        warn!(client = %client_id, error = %e, "Failed to send frame");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
            }
        }

        self.clients.write().remove(&client_id);
        let _ = ws_write.close().await;

        info!(client = %client_id, "Client disconnected");
        Ok(())
    }

    /// Parses and routes one command frame, returning the serialized reply.
    async fn handle_frame(&self, text: &str) -> Option<String> {
        let message = match OutboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping malformed command frame");
                return None;
            }
        };

        debug!(command = %message.command, result_id = %message.result_id, "Command received");

        let reply = self.router.dispatch(message).await;
        match serde_json::to_string(&reply) {
            Ok(text) => Some(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize reply");
                None
            }
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Checks the request path and echoes the first requested sub-protocol.
fn negotiate(
    required_path: Option<&str>,
    request: &Request,
    mut response: Response,
) -> StdResult<Response, ErrorResponse> {
    let path = request.uri().path();

    if let Some(required) = required_path
        && path != required
    {
        warn!(path, required, "Rejected handshake for unknown path");
        let mut rejection = ErrorResponse::new(Some(format!("Unknown path '{path}'")));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        return Err(rejection);
    }

    let requested = request
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').map(str::trim).find(|p| !p.is_empty()));

    if let Some(protocol) = requested
        && let Ok(value) = HeaderValue::from_str(protocol)
    {
        response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(response)
}

// ============================================================================
// Tests
// ============================================================================

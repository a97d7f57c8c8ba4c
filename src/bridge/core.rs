//! Bridge facade.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use crate::broker::{InvocationBroker, PendingCall};
use crate::codec::{Codec, HostValue};
use crate::error::{Error, Result};
use crate::events::{BridgeEvent, EventDispatcher, EventKind, Listener};
use crate::transport::{BridgeConfig, ConnectionManager, ConnectionState};

use super::builder::BridgeBuilder;

// ============================================================================
// Bridge
// ============================================================================

/// The surface side of the bridge.
///
/// Bundles the connection manager, event dispatcher and invocation broker
/// behind one handle. Cloning yields another handle to the same bridge.
///
/// # Example
///
/// ```ignore
/// let bridge = Bridge::builder().endpoint("ws://127.0.0.1:8765").build()?;
/// bridge.on(EventKind::Close, |event| println!("{event:?}"));
/// bridge.connect();
/// bridge.wait_connected(Duration::from_secs(5)).await?;
///
/// let answer = bridge.call("echo", 42).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Bridge {
    connection: ConnectionManager,
    broker: InvocationBroker,
}

// ============================================================================
// Bridge - Constructor
// ============================================================================

impl Bridge {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Creates a bridge from a configuration with the default codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, Codec::new()))
    }

    /// Wires the components together.
    pub(crate) fn assemble(config: BridgeConfig, codec: Codec) -> Self {
        let connection = ConnectionManager::new(config, codec, EventDispatcher::new());
        let broker = InvocationBroker::new(connection.clone());
        Self { connection, broker }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        self.connection.config()
    }

    /// Returns the codec.
    #[inline]
    #[must_use]
    pub fn codec(&self) -> &Codec {
        self.connection.codec()
    }

    /// Returns the event dispatcher.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventDispatcher {
        self.connection.events()
    }
}

// ============================================================================
// Bridge - Connection
// ============================================================================

impl Bridge {
    /// Opens the connection. See [`ConnectionManager::connect`].
    #[inline]
    pub fn connect(&self) {
        self.connection.connect();
    }

    /// Closes the connection and disables auto-reconnect.
    #[inline]
    pub fn close(&self, code: Option<u16>, reason: Option<&str>) {
        self.connection.close(code, reason);
    }

    /// Encodes and sends an unsolicited value.
    ///
    /// Returns `false` if the connection is not open.
    #[inline]
    pub fn send(&self, value: impl Into<HostValue>) -> bool {
        self.connection.send(&value.into())
    }

    /// Returns `true` if the connection is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Returns `true` if no socket exists.
    #[inline]
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.connection.is_disconnected()
    }

    /// Returns the connection phase.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns `true` if a reconnect attempt is scheduled.
    #[inline]
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.connection.reconnect_pending()
    }

    /// Waits until the connection is open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if it does not open within `limit`.
    pub async fn wait_connected(&self, limit: Duration) -> Result<()> {
        let mut opened = self.subscribe(EventKind::Open);
        if self.is_connected() {
            return Ok(());
        }

        match timeout(limit, opened.recv()).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(Error::connection("Event dispatcher dropped")),
            Err(_) => Err(Error::connection(format!(
                "Not connected after {}ms",
                limit.as_millis()
            ))),
        }
    }
}

// ============================================================================
// Bridge - Events
// ============================================================================

impl Bridge {
    /// Appends a listener for `kind`.
    #[inline]
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Listener
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        self.events().on(kind, listener)
    }

    /// Removes the first registration of `listener` for `kind`.
    #[inline]
    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        self.events().off(kind, listener)
    }

    /// Removes every listener for `kind`.
    ///
    /// The bridge's own `message` listener is re-attached, so invocations
    /// keep settling after `off_all(EventKind::Message)`.
    pub fn off_all(&self, kind: EventKind) {
        self.events().off_all(kind);
        if kind == EventKind::Message {
            debug!("Re-attaching invocation listener");
            self.broker.reattach();
        }
    }

    /// Returns a channel receiving every future event of `kind`.
    #[inline]
    #[must_use]
    pub fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<BridgeEvent> {
        self.events().subscribe(kind)
    }
}

// ============================================================================
// Bridge - Invocation
// ============================================================================

impl Bridge {
    /// Sends a command. See [`InvocationBroker::invoke`].
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionUnavailable`] if the connection is not open.
    #[inline]
    pub fn invoke(
        &self,
        command: impl Into<String>,
        args: impl Into<HostValue>,
    ) -> Result<PendingCall> {
        self.broker.invoke(command, args)
    }

    /// Sends a command and waits for the decoded reply.
    ///
    /// # Errors
    ///
    /// See [`InvocationBroker::call`].
    pub async fn call(
        &self,
        command: impl Into<String>,
        args: impl Into<HostValue>,
    ) -> Result<HostValue> {
        self.broker.call(command, args).await
    }

    /// Sends a command and waits at most `limit` for the reply.
    ///
    /// # Errors
    ///
    /// [`Error::RequestTimeout`] on expiry, otherwise as [`call`](Self::call).
    pub async fn call_with_timeout(
        &self,
        command: impl Into<String>,
        args: impl Into<HostValue>,
        limit: Duration,
    ) -> Result<HostValue> {
        self.broker.call_with_timeout(command, args, limit).await
    }

    /// Returns the number of outstanding invocations.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.broker.pending_count()
    }

    /// Rejects every outstanding invocation with [`Error::ConnectionClosed`].
    #[inline]
    pub fn cancel_pending(&self) -> usize {
        self.broker.cancel_pending()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tracing_subscriber::EnvFilter;

    use crate::events::CLOSE_NORMAL;
    use crate::host::{CommandRouter, DEFAULT_BIND_IP, HostServer};
    use crate::transport::ReconnectPolicy;

    const WAIT: Duration = Duration::from_secs(5);

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn router() -> CommandRouter {
        CommandRouter::new()
            .with_fn("echo", |payload| async move {
                Ok(payload.get("value").cloned().unwrap_or(HostValue::Null))
            })
            .with_fn("fail", |_| async move { Err(HostValue::from("division by zero")) })
            .with_fn("never", |_| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(HostValue::Null)
            })
    }

    async fn server() -> anyhow::Result<Arc<HostServer>> {
        Ok(HostServer::bind(DEFAULT_BIND_IP, 0, router()).await?)
    }

    async fn connected(builder: BridgeBuilder) -> anyhow::Result<Bridge> {
        let bridge = builder.build()?;
        bridge.connect();
        bridge.wait_connected(WAIT).await?;
        Ok(bridge)
    }

    async fn wait_for_clients(server: &HostServer, count: usize) {
        for _ in 0..500 {
            if server.client_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} clients, have {}", server.client_count());
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<BridgeEvent>) -> BridgeEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("event in time")
            .expect("dispatcher alive")
    }

    #[tokio::test]
    async fn test_echo_resolves() -> anyhow::Result<()> {
        init_tracing();
        let server = server().await?;
        let bridge = connected(Bridge::builder().endpoint(server.ws_url())).await?;

        let value = bridge
            .call("echo", HostValue::map([("value", 42)]))
            .await?;
        assert_eq!(value.as_i64(), Some(42));
        assert_eq!(bridge.pending_count(), 0);

        bridge.close(None, None);
        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_error_rejects() -> anyhow::Result<()> {
        init_tracing();
        let server = server().await?;
        let bridge = connected(Bridge::builder().endpoint(server.ws_url())).await?;

        let err = bridge.call("fail", ()).await.expect_err("rejected");
        assert!(err.is_remote());
        assert_eq!(err.to_string(), "Remote error for 'fail': division by zero");

        let err = bridge.call("missing", ()).await.expect_err("rejected");
        assert_eq!(
            err.remote_payload().and_then(HostValue::as_str),
            Some("No handler registered for command 'missing'")
        );

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_invoke_while_disconnected() {
        let bridge = Bridge::builder()
            .endpoint("ws://127.0.0.1:9")
            .build()
            .expect("build");

        let err = bridge.invoke("echo", 1).expect_err("not connected");
        assert!(matches!(err, Error::ConnectionUnavailable { .. }));
        assert_eq!(bridge.pending_count(), 0);
        assert!(!bridge.send("hello"));
    }

    #[tokio::test]
    async fn test_subprotocol_negotiated() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(
            Bridge::builder()
                .endpoint(server.ws_url())
                .protocols(["bridge.v1", "bridge.v0"]),
        )
        .await?;

        assert_eq!(bridge.call("echo", HostValue::map([("value", "ok")])).await?.as_str(), Some("ok"));

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_reply_is_inert() -> anyhow::Result<()> {
        init_tracing();
        let server = server().await?;
        let bridge = connected(Bridge::builder().endpoint(server.ws_url())).await?;
        wait_for_clients(&server, 1).await;

        let call = bridge.invoke("never", ())?;
        let frame = json!({"result_id": call.result_id(), "result": 7}).to_string();
        let late_error = json!({"error_id": call.error_id(), "error": "late"}).to_string();

        server.broadcast_text(frame.as_str());
        assert_eq!(call.await?.as_i64(), Some(7));

        server.broadcast_text(frame);
        server.broadcast_text(late_error);
        server.broadcast_text("{not json");
        assert_eq!(bridge.call("echo", HostValue::map([("value", 1)])).await?.as_i64(), Some(1));
        assert_eq!(bridge.pending_count(), 0);

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_unsolicited_frames_reach_subscribers() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(Bridge::builder().endpoint(server.ws_url())).await?;
        wait_for_clients(&server, 1).await;

        let mut messages = bridge.subscribe(EventKind::Message);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let listener = bridge.on(EventKind::Message, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        server.broadcast(&HostValue::map([("event", "tick")]));
        assert_eq!(
            next_event(&mut messages).await,
            BridgeEvent::Message(r#"{"event":"tick"}"#.to_string())
        );
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert!(bridge.off(EventKind::Message, &listener));
        server.broadcast_text("second");
        next_event(&mut messages).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_off_all_message_keeps_invocations_working() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(Bridge::builder().endpoint(server.ws_url())).await?;

        bridge.on(EventKind::Message, |_| {});
        bridge.off_all(EventKind::Message);
        assert_eq!(bridge.events().listener_count(EventKind::Message), 1);

        assert_eq!(bridge.call("echo", HostValue::map([("value", 5)])).await?.as_i64(), Some(5));

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_client_close_is_clean_and_final() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(
            Bridge::builder()
                .endpoint(server.ws_url())
                .reconnect_interval(Duration::from_millis(20)),
        )
        .await?;
        let mut closes = bridge.subscribe(EventKind::Close);

        bridge.close(None, Some("done"));

        match next_event(&mut closes).await {
            BridgeEvent::Close(info) => {
                assert_eq!(info.code, CLOSE_NORMAL);
                assert_eq!(info.reason, "done");
            }
            other => panic!("expected close, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(bridge.is_disconnected());
        assert!(!bridge.reconnect_pending());
        wait_for_clients(&server, 0).await;

        server.shutdown();
        Ok(())
    }

    async fn assert_connect_after_close_reopens(auto_reconnect: bool) -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(
            Bridge::builder()
                .endpoint(server.ws_url())
                .auto_reconnect(auto_reconnect)
                .reconnect_interval(Duration::from_secs(60)),
        )
        .await?;
        let mut closes = bridge.subscribe(EventKind::Close);

        bridge.close(None, None);
        assert_eq!(bridge.state(), ConnectionState::Closing);
        bridge.connect();

        bridge.wait_connected(Duration::from_secs(2)).await?;
        assert!(matches!(next_event(&mut closes).await, BridgeEvent::Close(_)));
        assert!(!bridge.reconnect_pending());
        assert_eq!(bridge.call("echo", HostValue::map([("value", 3)])).await?.as_i64(), Some(3));

        bridge.close(None, None);
        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_while_closing_reopens_without_auto_reconnect() -> anyhow::Result<()> {
        init_tracing();
        assert_connect_after_close_reopens(false).await
    }

    #[tokio::test]
    async fn test_connect_while_closing_reopens_with_auto_reconnect() -> anyhow::Result<()> {
        assert_connect_after_close_reopens(true).await
    }

    #[tokio::test]
    async fn test_close_after_deferred_connect_stays_closed() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(Bridge::builder().endpoint(server.ws_url())).await?;
        let mut closes = bridge.subscribe(EventKind::Close);

        bridge.close(None, None);
        bridge.connect();
        bridge.close(None, Some("never mind"));

        next_event(&mut closes).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(bridge.is_disconnected());
        assert!(!bridge.reconnect_pending());
        wait_for_clients(&server, 0).await;

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_server_close_schedules_single_reconnect() -> anyhow::Result<()> {
        init_tracing();
        let server = server().await?;
        let bridge = connected(
            Bridge::builder()
                .endpoint(server.ws_url())
                .reconnect_interval(Duration::from_secs(60)),
        )
        .await?;
        wait_for_clients(&server, 1).await;
        let mut closes = bridge.subscribe(EventKind::Close);

        server.close_clients(4000, "going away");

        match next_event(&mut closes).await {
            BridgeEvent::Close(info) => assert_eq!(info.code, 4000),
            other => panic!("expected close, got {other:?}"),
        }
        assert!(bridge.is_disconnected());
        assert!(bridge.reconnect_pending());

        // A close while the timer is armed neither opens nor re-arms anything.
        bridge.close(None, None);
        assert!(!bridge.reconnect_pending());
        assert!(bridge.is_disconnected());

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_reconnects_after_server_close() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(
            Bridge::builder()
                .endpoint(server.ws_url())
                .reconnect_interval(Duration::from_millis(50))
                .reconnect_policy(ReconnectPolicy::fixed().with_max_attempts(5)),
        )
        .await?;
        wait_for_clients(&server, 1).await;
        let mut opens = bridge.subscribe(EventKind::Open);

        server.close_clients(4001, "restart");

        assert_eq!(next_event(&mut opens).await, BridgeEvent::Open);
        assert!(bridge.is_connected());
        assert_eq!(bridge.call("echo", HostValue::map([("value", 2)])).await?.as_i64(), Some(2));

        bridge.close(None, None);
        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_survives_disconnect_until_cancelled() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(
            Bridge::builder()
                .endpoint(server.ws_url())
                .auto_reconnect(false),
        )
        .await?;
        wait_for_clients(&server, 1).await;
        let mut closes = bridge.subscribe(EventKind::Close);

        let call = bridge.invoke("never", ())?;
        server.close_clients(4000, "gone");
        next_event(&mut closes).await;

        assert_eq!(bridge.pending_count(), 1);
        assert_eq!(bridge.cancel_pending(), 1);
        assert!(matches!(call.await, Err(Error::ConnectionClosed)));

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_call_with_timeout() -> anyhow::Result<()> {
        let server = server().await?;
        let bridge = connected(Bridge::builder().endpoint(server.ws_url())).await?;

        let err = bridge
            .call_with_timeout("never", (), Duration::from_millis(50))
            .await
            .expect_err("timed out");
        assert!(err.is_timeout());
        assert_eq!(bridge.pending_count(), 0);

        server.shutdown();
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_without_endpoint_is_noop() {
        let bridge = Bridge::new(BridgeConfig::default()).expect("bridge");
        bridge.connect();
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert!(bridge.wait_connected(Duration::from_millis(20)).await.is_err());
    }
}

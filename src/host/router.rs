//! Command routing for the host peer.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::codec::{Codec, HostValue, SafeValue};
use crate::protocol::{InboundMessage, OutboundMessage};

// ============================================================================
// CommandHandler
// ============================================================================

/// Answers one named command.
///
/// `Ok` is sent back on the result id, `Err` on the error id.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handles the decoded payload.
    async fn handle(&self, payload: HostValue) -> Result<HostValue, HostValue>;
}

/// Adapts an async closure into a [`CommandHandler`].
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(HostValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HostValue, HostValue>> + Send + 'static,
{
    async fn handle(&self, payload: HostValue) -> Result<HostValue, HostValue> {
        (self.0)(payload).await
    }
}

// ============================================================================
// CommandRouter
// ============================================================================

/// Registry of command handlers keyed by command name.
///
/// # Example
///
/// ```ignore
/// let router = CommandRouter::new()
///     .with_fn("echo", |payload| async move { Ok(payload) })
///     .with_fn("fail", |_| async move { Err(HostValue::from("nope")) });
/// ```
#[derive(Clone, Default)]
pub struct CommandRouter {
    handlers: FxHashMap<String, Arc<dyn CommandHandler>>,
    codec: Codec,
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("commands", &self.commands())
            .field("codec", &self.codec)
            .finish()
    }
}

impl CommandRouter {
    /// Creates an empty router with a default codec.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the codec used for payloads and replies.
    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Adds a handler, replacing any previous one for `command`.
    #[must_use]
    pub fn with_handler(mut self, command: impl Into<String>, handler: impl CommandHandler + 'static) -> Self {
        self.register(command, handler);
        self
    }

    /// Adds an async closure handler.
    #[must_use]
    pub fn with_fn<F, Fut>(mut self, command: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HostValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HostValue, HostValue>> + Send + 'static,
    {
        self.register_fn(command, handler);
        self
    }

    /// Registers a handler, replacing any previous one for `command`.
    pub fn register(&mut self, command: impl Into<String>, handler: impl CommandHandler + 'static) {
        let command = command.into();
        if self.handlers.insert(command.clone(), Arc::new(handler)).is_some() {
            debug!(command = %command, "Replaced command handler");
        }
    }

    /// Registers an async closure handler.
    pub fn register_fn<F, Fut>(&mut self, command: impl Into<String>, handler: F)
    where
        F: Fn(HostValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HostValue, HostValue>> + Send + 'static,
    {
        self.register(command, FnHandler(handler));
    }

    /// Returns the registered command names, sorted.
    #[must_use]
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the codec.
    #[inline]
    #[must_use]
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Runs the handler for `message` and builds the reply.
    ///
    /// Unknown commands and payloads that fail to decode are answered on
    /// the error id.
    pub async fn dispatch(&self, message: OutboundMessage) -> InboundMessage {
        let OutboundMessage {
            command,
            result_id,
            error_id,
            payload,
        } = message;

        let Some(handler) = self.handlers.get(&command).cloned() else {
            warn!(command = %command, "No handler registered");
            return InboundMessage::failure(
                error_id,
                SafeValue::String(format!("No handler registered for command '{command}'")),
            );
        };

        let payload = match self.codec.decode_deferred(payload).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(command = %command, error = %e, "Payload decode failed");
                return InboundMessage::failure(error_id, SafeValue::String(e.to_string()));
            }
        };

        match handler.handle(payload).await {
            Ok(value) => InboundMessage::success(result_id, self.codec.encode(&value)),
            Err(value) => {
                debug!(command = %command, "Handler returned error");
                InboundMessage::failure(error_id, self.codec.encode(&value))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::CorrelationId;

    struct Divide;

    #[async_trait]
    impl CommandHandler for Divide {
        async fn handle(&self, payload: HostValue) -> Result<HostValue, HostValue> {
            let a = payload.get("a").and_then(HostValue::as_f64).unwrap_or_default();
            let b = payload.get("b").and_then(HostValue::as_f64).unwrap_or_default();
            if b == 0.0 {
                return Err(HostValue::from("division by zero"));
            }
            Ok(HostValue::from(a / b))
        }
    }

    fn message(command: &str, payload: SafeValue) -> OutboundMessage {
        OutboundMessage::new(command, CorrelationId::new(1), CorrelationId::new(2), payload)
    }

    #[tokio::test]
    async fn test_closure_handler_success() {
        let router = CommandRouter::new().with_fn("echo", |payload| async move { Ok(payload) });

        let reply = router.dispatch(message("echo", json!({"value": 42}))).await;
        assert_eq!(reply, InboundMessage::success(CorrelationId::new(1), json!({"value": 42})));
    }

    #[tokio::test]
    async fn test_trait_handler_error() {
        let router = CommandRouter::new().with_handler("divide", Divide);

        let reply = router.dispatch(message("divide", json!({"a": 1, "b": 0}))).await;
        assert_eq!(reply, InboundMessage::failure(CorrelationId::new(2), json!("division by zero")));

        let reply = router.dispatch(message("divide", json!({"a": 9, "b": 3}))).await;
        assert_eq!(reply.result, Some(json!(3.0)));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let router = CommandRouter::new();
        let reply = router.dispatch(message("missing", SafeValue::Null)).await;

        assert_eq!(reply.error_id, Some(CorrelationId::new(2)));
        assert_eq!(
            reply.error,
            Some(json!("No handler registered for command 'missing'"))
        );
    }

    #[test]
    fn test_commands_sorted() {
        let mut router = CommandRouter::new();
        router.register_fn("zeta", |p| async move { Ok(p) });
        router.register_fn("alpha", |p| async move { Ok(p) });
        assert_eq!(router.commands(), vec!["alpha", "zeta"]);
    }
}

//! WebView Bridge - Command/event bridge between a native host and an
//! embedded web surface.
//!
//! The two sides talk over one persistent WebSocket. The surface invokes
//! named host commands and awaits correlated replies; the host pushes
//! unsolicited events back.
//!
//! # Architecture
//!
//! Four layers, bottom to top:
//!
//! - **Marshalling Codec**: host values ⇄ JSON-safe wire values
//! - **Connection Manager**: socket lifecycle and auto-reconnect
//! - **Event Dispatcher**: fans `open`/`message`/`error`/`close` out to subscribers
//! - **Invocation Broker**: correlation ids and pending calls
//!
//! ```text
//! caller → Bridge::invoke → Codec::encode → ConnectionManager::send
//!                                                    │
//! caller ← PendingCall ← Codec::decode ← Broker ← "message" event
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use webview_bridge::{Bridge, EventKind, HostValue, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let bridge = Bridge::builder()
//!         .endpoint("ws://127.0.0.1:8765")
//!         .protocol("bridge.v1")
//!         .build()?;
//!
//!     bridge.on(EventKind::Close, |event| println!("closed: {event:?}"));
//!     bridge.connect();
//!     bridge.wait_connected(Duration::from_secs(5)).await?;
//!
//!     let answer = bridge.call("echo", HostValue::map([("value", 42)])).await?;
//!     println!("echo: {answer:?}");
//!
//!     bridge.close(None, None);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`] facade and [`BridgeBuilder`] |
//! | [`broker`] | [`InvocationBroker`] and [`PendingCall`] |
//! | [`codec`] | [`Codec`], [`HostValue`] and extension traits |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | [`EventDispatcher`] and [`BridgeEvent`] |
//! | [`host`] | [`HostServer`] and [`CommandRouter`] for the native side |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | [`ConnectionManager`] and [`BridgeConfig`] |

// ============================================================================
// Modules
// ============================================================================

/// Bridge facade and builder.
pub mod bridge;

/// Correlated command invocation.
pub mod broker;

/// Value marshalling.
///
/// Converts host values to a JSON-representable form and back.
pub mod codec;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Lifecycle event dispatch.
pub mod events;

/// Native-side peer: command routing and WebSocket server.
pub mod host;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection state, configuration and reconnect scheduling.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, BridgeBuilder};

// Broker types
pub use broker::{InvocationBroker, PendingCall};

// Codec types
pub use codec::{
    Codec, DecodeExtension, EncodeExtension, HostValue, NumericView, OpaqueValue, SafeValue,
};

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{BridgeEvent, CloseInfo, EventDispatcher, EventKind, Listener};

// Host types
pub use host::{CommandHandler, CommandRouter, HostServer};

// Identifier types
pub use identifiers::{ClientId, CorrelationId};

// Protocol types
pub use protocol::{InboundMessage, OutboundMessage};

// Transport types
pub use transport::{BridgeConfig, ConnectionManager, ConnectionState, ReconnectPolicy};

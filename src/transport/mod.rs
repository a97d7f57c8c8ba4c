//! WebSocket transport layer.
//!
//! The rendering surface is the WebSocket client. The manager here owns the
//! socket, tracks its state and re-opens it after unsolicited closes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐                          ┌─────────────────┐
//! │  Surface (client)   │                          │  Host (server)  │
//! │                     │        WebSocket         │                 │
//! │  ConnectionManager  │◄────────────────────────►│  HostServer     │
//! │  → EventDispatcher  │     endpoint, protos     │  CommandRouter  │
//! └─────────────────────┘                          └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionManager::connect` - Disconnected → Connecting
//! 2. Handshake completes - Connecting → Open, `open` event
//! 3. Frames flow - `message` events, [`ConnectionManager::send`]
//! 4. Either side closes - Open → Closing → Disconnected, `close` event
//! 5. Auto-reconnect re-enters step 1 after the configured delay
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`BridgeConfig`] and [`ReconnectPolicy`] |
//! | `connection` | [`ConnectionManager`] and its link task |
//! | `reconnect` | Single-slot reconnect timer |
//! | `state` | [`ConnectionState`] machine |

// ============================================================================
// Submodules
// ============================================================================

/// Connection configuration.
pub mod config;

/// Managed connection and event loop.
pub mod connection;

/// Reconnect scheduling.
pub mod reconnect;

/// Connection state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{BridgeConfig, DEFAULT_RECONNECT_INTERVAL_MS, ReconnectPolicy};
pub use connection::ConnectionManager;
pub use reconnect::ReconnectTimer;
pub use state::ConnectionState;

//! Host peer.
//!
//! The native side of the bridge: a WebSocket server that answers command
//! frames and can push unsolicited events to connected surfaces.
//!
//! # Connection Lifecycle
//!
//! 1. `HostServer::bind` - Bind and start the accept loop
//! 2. Surface connects, sub-protocol echoed, `ClientId` assigned
//! 3. Each command frame is routed to its handler, reply sent to that client
//! 4. `HostServer::shutdown` - Stop accepting, close clients
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `router` | [`CommandRouter`] and [`CommandHandler`] |
//! | `server` | [`HostServer`] accept loop |

// ============================================================================
// Submodules
// ============================================================================

/// Command handlers.
pub mod router;

/// WebSocket server.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use router::{CommandHandler, CommandRouter};
pub use server::{DEFAULT_BIND_IP, HostServer};

//! Event dispatch.
//!
//! Lifecycle signals (`open`, `message`, `error`, `close`) produced by the
//! connection manager fan out to callback listeners and typed channels.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | [`BridgeEvent`], [`EventKind`], [`CloseInfo`] |
//! | `dispatcher` | [`EventDispatcher`] registry |

// ============================================================================
// Submodules
// ============================================================================

/// Listener registry and fan-out.
pub mod dispatcher;

/// Event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{EventDispatcher, Listener};
pub use event::{BridgeEvent, CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, CloseInfo, EventKind};

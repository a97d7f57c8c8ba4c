//! Correlated command invocation.
//!
//! [`InvocationBroker::invoke`] allocates a result id and an error id, sends
//! `{command, result_id, error_id, payload}` and hands back a
//! [`PendingCall`]. The broker listens for `message` events; a frame whose
//! `result_id` or `error_id` matches settles that call exactly once.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`InvocationBroker`] |
//! | `call` | [`PendingCall`] handle |
//! | `pending` | Correlation table |

// ============================================================================
// Submodules
// ============================================================================

/// Pending call handle.
mod call;

/// Broker.
mod core;

/// Correlation table.
mod pending;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::call::PendingCall;
pub use self::core::InvocationBroker;

//! Wire protocol message types.
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`OutboundMessage`] | Surface → Host | Command invocation |
//! | [`InboundMessage`] | Host → Surface | Correlated reply or unsolicited event |
//!
//! Payloads are [`SafeValue`](crate::codec::SafeValue)s produced by the codec.

// ============================================================================
// Submodules
// ============================================================================

/// Outbound and inbound messages.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{InboundMessage, OutboundMessage};

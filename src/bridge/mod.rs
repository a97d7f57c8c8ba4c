//! Bridge facade and configuration.
//!
//! [`Bridge`] is the subscriber-facing entry point. Build one with
//! [`Bridge::builder()`] or [`Bridge::new`] from a [`BridgeConfig`](crate::BridgeConfig).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`BridgeBuilder`] fluent configuration |
//! | `core` | [`Bridge`] handle |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for configuration.
pub mod builder;

/// Bridge handle.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::builder::BridgeBuilder;
pub use self::core::Bridge;

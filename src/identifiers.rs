//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing correlation ids with other numbers and
//! client handles with arbitrary UUIDs.
//!
//! | Type | Inner | Usage |
//! |------|-------|-------|
//! | [`CorrelationId`] | `u32` | Pairs an inbound frame with a pending invocation |
//! | [`ClientId`] | `Uuid` | Identifies a client connected to the host peer |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// CorrelationId
// ============================================================================

/// Opaque id pairing a pending invocation with its eventual result or error.
///
/// Serialized as a plain JSON integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u32);

impl CorrelationId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Draws a random id.
    ///
    /// No uniqueness check is performed here; the pending table redraws on
    /// collision.
    #[inline]
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random::<u32>())
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CorrelationId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ============================================================================
// ClientId
// ============================================================================

/// Identifies one client connection accepted by the host peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Generates a new random client id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_serializes_as_integer() {
        let id = CorrelationId::new(42);
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "42");

        let parsed: CorrelationId = serde_json::from_str("42").expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_correlation_id_rejects_negative() {
        assert!(serde_json::from_str::<CorrelationId>("-1").is_err());
    }

    #[test]
    fn test_correlation_id_display() {
        assert_eq!(CorrelationId::from(7).to_string(), "7");
    }

    #[test]
    fn test_client_ids_are_unique() {
        let a = ClientId::generate();
        let b = ClientId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }
}

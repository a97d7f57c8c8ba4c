//! Codec extension points.
//!
//! Extensions let callers teach the codec about value kinds it does not
//! know natively, without the codec sniffing runtime types:
//!
//! | Trait | Direction | Consulted by |
//! |-------|-----------|--------------|
//! | [`EncodeExtension`] | host → wire | [`Codec::encode`] for [`HostValue::Opaque`] of a matching kind |
//! | [`DecodeExtension`] | wire → host | [`Codec::decode_deferred`] only |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

use super::{Codec, HostValue, OpaqueValue, SafeValue};

// ============================================================================
// EncodeExtension
// ============================================================================

/// Encodes opaque values of one kind.
pub trait EncodeExtension: Send + Sync {
    /// Kind this extension handles, matched against [`OpaqueValue::kind`].
    fn kind(&self) -> &str;

    /// Encodes the value.
    ///
    /// Returning `None` falls through to the next extension and finally to
    /// the string fallback.
    fn encode(&self, value: &dyn OpaqueValue, codec: &Codec) -> Option<SafeValue>;
}

// ============================================================================
// DecodeExtension
// ============================================================================

/// Restores wire values that need special handling on the receiving side.
///
/// Restoration may suspend (disk or network I/O). The codec hands child
/// values back through `codec` so extensions can recurse.
#[async_trait]
pub trait DecodeExtension: Send + Sync {
    /// Name used in diagnostics and [`Error::Extension`](crate::Error::Extension).
    fn kind(&self) -> &str;

    /// Returns `true` if this extension restores `value`.
    fn matches(&self, value: &SafeValue) -> bool;

    /// Restores the value.
    async fn restore(&self, value: SafeValue, codec: &Codec) -> Result<HostValue>;
}

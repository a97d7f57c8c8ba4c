//! Value marshalling.
//!
//! Converts arbitrary host values into a JSON-representable wire form and
//! restores them on the receiving side.
//!
//! # Round Trip Guarantees
//!
//! | Kind | `decode(encode(v)) == v` |
//! |------|--------------------------|
//! | null, bool, number, string (not date-shaped) | yes |
//! | `DateTime` (millisecond precision) | yes |
//! | nested `Seq` / `Map` of the above | yes |
//! | `Bytes` / `View` | via [`HostValue::to_bytes`] |
//! | `Path`, `Opaque` | no, sent as strings |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `value` | [`HostValue`] and friends |
//! | `core` | [`Codec`] instance and extension registry |
//! | `encode` | Host → wire |
//! | `decode` | Wire → host, immediate and deferred |
//! | `extension` | [`EncodeExtension`] and [`DecodeExtension`] |

// ============================================================================
// Submodules
// ============================================================================

/// Codec instance.
mod core;

/// Wire → host decoding.
mod decode;

/// Host → wire encoding.
mod encode;

/// Extension traits.
mod extension;

/// Host value model.
mod value;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Codec;
pub use decode::{decode_bytes, media_data_uri, parse_datetime};
pub use encode::{encode_bytes, format_datetime};
pub use extension::{DecodeExtension, EncodeExtension};
pub use value::{HostValue, NumericView, OpaqueValue};

/// Transport-safe value: anything `serde_json` can represent.
pub type SafeValue = serde_json::Value;

//! Host → wire encoding.
//!
//! | Host value | Wire form |
//! |------------|-----------|
//! | null, bool, number, string | unchanged |
//! | `DateTime` | ISO-8601, millisecond precision, `Z` suffix |
//! | `Bytes`, `View` | standard base64 |
//! | `Seq` | array, order preserved |
//! | `Map` | object, values encoded recursively |
//! | `Path` | string |
//! | `Opaque` | extension output, else `Display` string (lossy) |

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use super::{Codec, HostValue, OpaqueValue, SafeValue};

// ============================================================================
// Helpers
// ============================================================================

/// Renders a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[inline]
#[must_use]
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Base64-encodes a byte buffer with the standard alphabet and padding.
#[inline]
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

// ============================================================================
// Codec - Encode
// ============================================================================

impl Codec {
    /// Encodes a host value into its transport-safe form.
    ///
    /// Never fails. Opaque values without a matching extension fall back to
    /// their string rendering and a warning is logged.
    #[must_use]
    pub fn encode(&self, value: &HostValue) -> SafeValue {
        match value {
            HostValue::Null => SafeValue::Null,
            HostValue::Bool(b) => SafeValue::Bool(*b),
            HostValue::Number(n) => SafeValue::Number(n.clone()),
            HostValue::String(s) => SafeValue::String(s.clone()),
            HostValue::DateTime(dt) => SafeValue::String(format_datetime(dt)),
            HostValue::Bytes(bytes) => SafeValue::String(encode_bytes(bytes)),
            HostValue::View(view) => SafeValue::String(encode_bytes(&view.to_le_bytes())),
            HostValue::Seq(items) => {
                SafeValue::Array(items.iter().map(|item| self.encode(item)).collect())
            }
            HostValue::Map(entries) => SafeValue::Object(
                entries
                    .iter()
                    .map(|(key, item)| (key.clone(), self.encode(item)))
                    .collect(),
            ),
            HostValue::Path(path) => SafeValue::String(path.to_string_lossy().into_owned()),
            HostValue::Opaque(handle) => self.encode_opaque(handle.as_ref()),
        }
    }

    /// Encodes an opaque handle through extensions or the string fallback.
    fn encode_opaque(&self, handle: &dyn OpaqueValue) -> SafeValue {
        let kind = handle.kind();

        for extension in self.encoders.iter().filter(|e| e.kind() == kind) {
            if let Some(encoded) = extension.encode(handle, self) {
                return encoded;
            }
        }

        let fallback = handle.to_string();
        warn!(kind, fallback = %fallback, "Serialization fallback: opaque value sent as string");
        SafeValue::String(fallback)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::any::Any;
    use std::fmt;
    use std::path::PathBuf;

    use chrono::TimeZone;
    use serde_json::json;

    use crate::codec::{EncodeExtension, NumericView};

    #[derive(Debug)]
    struct Handle(u32);

    impl fmt::Display for Handle {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Handle({})", self.0)
        }
    }

    impl OpaqueValue for Handle {
        fn kind(&self) -> &str {
            "handle"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct HandleEncoder;

    impl EncodeExtension for HandleEncoder {
        fn kind(&self) -> &str {
            "handle"
        }

        fn encode(&self, value: &dyn OpaqueValue, _codec: &Codec) -> Option<SafeValue> {
            let handle = value.as_any().downcast_ref::<Handle>()?;
            Some(json!({ "handle": handle.0 }))
        }
    }

    fn utc(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0)
            .single()
            .expect("valid date")
    }

    #[test]
    fn test_primitives_pass_through() {
        let codec = Codec::new();
        assert_eq!(codec.encode(&HostValue::Null), json!(null));
        assert_eq!(codec.encode(&HostValue::from(true)), json!(true));
        assert_eq!(codec.encode(&HostValue::from(42)), json!(42));
        assert_eq!(codec.encode(&HostValue::from(2.5)), json!(2.5));
        assert_eq!(codec.encode(&HostValue::from("hi")), json!("hi"));
    }

    #[test]
    fn test_datetime_millis_format() {
        let codec = Codec::new();
        let encoded = codec.encode(&HostValue::from(utc(2024, 1, 1)));
        assert_eq!(encoded, json!("2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_record_scenario() {
        let codec = Codec::new();
        let value = HostValue::map([
            ("name", HostValue::from("a")),
            ("created", HostValue::from(utc(2024, 1, 1))),
            ("blob", HostValue::from(vec![1u8, 2, 3])),
        ]);

        assert_eq!(
            codec.encode(&value),
            json!({
                "name": "a",
                "created": "2024-01-01T00:00:00.000Z",
                "blob": "AQID",
            })
        );
    }

    #[test]
    fn test_numeric_view_base64() {
        let codec = Codec::new();
        let encoded = codec.encode(&HostValue::from(NumericView::U16(vec![1, 2])));
        assert_eq!(encoded, json!(encode_bytes(&[1, 0, 2, 0])));
    }

    #[test]
    fn test_sequence_order_preserved() {
        let codec = Codec::new();
        let value = HostValue::seq(["c", "a", "b"]);
        assert_eq!(codec.encode(&value), json!(["c", "a", "b"]));
    }

    #[test]
    fn test_path_as_string() {
        let codec = Codec::new();
        let encoded = codec.encode(&HostValue::from(PathBuf::from("/tmp/file.txt")));
        assert_eq!(encoded, json!("/tmp/file.txt"));
    }

    #[test]
    fn test_opaque_falls_back_to_string() {
        let codec = Codec::new();
        let encoded = codec.encode(&HostValue::opaque(Handle(9)));
        assert_eq!(encoded, json!("Handle(9)"));
    }

    #[test]
    fn test_opaque_uses_matching_extension() {
        let codec = Codec::new().with_encoder(HandleEncoder);
        let value = HostValue::seq([HostValue::opaque(Handle(9))]);
        assert_eq!(codec.encode(&value), json!([{ "handle": 9 }]));
    }

    #[test]
    fn test_nested_structure() {
        let codec = Codec::new();
        let value = HostValue::map([(
            "outer",
            HostValue::map([("inner", HostValue::seq([1, 2]))]),
        )]);
        assert_eq!(codec.encode(&value), json!({"outer": {"inner": [1, 2]}}));
    }
}

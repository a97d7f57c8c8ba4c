//! Wire → host decoding.
//!
//! Two variants share the same rules:
//!
//! - [`Codec::decode`] never suspends and ignores decode extensions.
//! - [`Codec::decode_deferred`] consults decode extensions first and may
//!   suspend. Children are restored concurrently but results keep input
//!   order.
//!
//! Rules:
//!
//! - strings starting with `YYYY-MM-DDTHH:MM:SS` that parse as a timestamp
//!   become [`HostValue::DateTime`]
//! - objects carrying string `media_type` and `bytes` become a
//!   `data:<media_type>;base64,<bytes>` string
//! - other objects and arrays recurse
//! - everything else passes through

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use regex::Regex;
use serde_json::Map;
use tracing::trace;

use crate::error::{Error, Result};

use super::{Codec, HostValue, SafeValue};

// ============================================================================
// Constants
// ============================================================================

/// Prefix a string must carry to be considered a timestamp.
static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("date prefix pattern is valid")
});

/// Key naming the media type in a media mapping.
const MEDIA_TYPE_KEY: &str = "media_type";

/// Key holding the base64 payload in a media mapping.
const MEDIA_BYTES_KEY: &str = "bytes";

// ============================================================================
// Helpers
// ============================================================================

/// Parses a timestamp string.
///
/// Returns `None` unless the string starts with the ISO-8601 date-time
/// prefix. RFC 3339 strings keep their offset; strings without one are
/// read as UTC.
#[must_use]
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if !DATE_PREFIX.is_match(text) {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decodes a standard base64 string.
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if the input is not valid base64.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| Error::malformed(format!("invalid base64: {e}")))
}

/// Renders a media mapping as a data URI, if the mapping is one.
#[must_use]
pub fn media_data_uri(map: &Map<String, SafeValue>) -> Option<String> {
    let media_type = map.get(MEDIA_TYPE_KEY)?.as_str()?;
    let bytes = map.get(MEDIA_BYTES_KEY)?.as_str()?;
    Some(format!("data:{media_type};base64,{bytes}"))
}

/// Restores a scalar wire value.
fn restore_scalar(value: SafeValue) -> HostValue {
    match value {
        SafeValue::String(text) => match parse_datetime(&text) {
            Some(dt) => HostValue::DateTime(dt),
            None => HostValue::String(text),
        },
        other => HostValue::from(other),
    }
}

/// Immediate restoration shared by [`Codec::decode`].
fn restore(value: &SafeValue) -> HostValue {
    match value {
        SafeValue::Array(items) => HostValue::Seq(items.iter().map(restore).collect()),
        SafeValue::Object(map) => match media_data_uri(map) {
            Some(uri) => HostValue::String(uri),
            None => HostValue::Map(
                map.iter()
                    .map(|(key, item)| (key.clone(), restore(item)))
                    .collect(),
            ),
        },
        scalar => restore_scalar(scalar.clone()),
    }
}

// ============================================================================
// Codec - Decode
// ============================================================================

impl Codec {
    /// Restores a wire value without suspending.
    ///
    /// Decode extensions are not consulted.
    #[must_use]
    pub fn decode(&self, value: &SafeValue) -> HostValue {
        restore(value)
    }

    /// Restores a wire value, allowing decode extensions to suspend.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a decode extension.
    pub fn decode_deferred(&self, value: SafeValue) -> BoxFuture<'_, Result<HostValue>> {
        async move {
            if let Some(extension) = self.decoders.iter().find(|d| d.matches(&value)) {
                trace!(kind = extension.kind(), "Decode extension matched");
                return extension.restore(value, self).await;
            }

            match value {
                SafeValue::Array(items) => {
                    let restored =
                        try_join_all(items.into_iter().map(|item| self.decode_deferred(item)))
                            .await?;
                    Ok(HostValue::Seq(restored))
                }
                SafeValue::Object(map) => {
                    if let Some(uri) = media_data_uri(&map) {
                        return Ok(HostValue::String(uri));
                    }

                    let (keys, items): (Vec<String>, Vec<SafeValue>) = map.into_iter().unzip();
                    let restored =
                        try_join_all(items.into_iter().map(|item| self.decode_deferred(item)))
                            .await?;
                    Ok(HostValue::Map(keys.into_iter().zip(restored).collect()))
                }
                scalar => Ok(restore_scalar(scalar)),
            }
        }
        .boxed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    use crate::codec::{DecodeExtension, encode_bytes};

    /// Reads `{ "file": "<path>" }` from disk, sleeping longer for earlier
    /// entries so completion order differs from input order.
    struct FileExtension;

    #[async_trait]
    impl DecodeExtension for FileExtension {
        fn kind(&self) -> &str {
            "file"
        }

        fn matches(&self, value: &SafeValue) -> bool {
            value.get("file").is_some_and(SafeValue::is_string)
        }

        async fn restore(&self, value: SafeValue, _codec: &Codec) -> Result<HostValue> {
            let path = PathBuf::from(value["file"].as_str().unwrap_or_default());
            let delay = value.get("delay_ms").and_then(SafeValue::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let text = tokio::fs::read_to_string(&path).await?;
            Ok(HostValue::String(text))
        }
    }

    struct FailingExtension;

    #[async_trait]
    impl DecodeExtension for FailingExtension {
        fn kind(&self) -> &str {
            "failing"
        }

        fn matches(&self, value: &SafeValue) -> bool {
            value.as_str() == Some("fail")
        }

        async fn restore(&self, _value: SafeValue, _codec: &Codec) -> Result<HostValue> {
            Err(Error::extension("failing", "refused"))
        }
    }

    #[test]
    fn test_date_string_becomes_datetime() {
        let codec = Codec::new();
        let decoded = codec.decode(&json!("2024-01-01T00:00:00.000Z"));
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid");
        assert_eq!(decoded, HostValue::DateTime(expected));
    }

    #[test]
    fn test_date_without_offset_read_as_utc() {
        let parsed = parse_datetime("2024-03-05T10:20:30").expect("parse");
        assert_eq!(parsed.to_rfc3339(), "2024-03-05T10:20:30+00:00");
    }

    #[test]
    fn test_date_prefix_required() {
        assert!(parse_datetime("on 2024-01-01T00:00:00Z").is_none());
        assert!(parse_datetime("2024-01-01").is_none());
        let codec = Codec::new();
        assert_eq!(codec.decode(&json!("2024-13-45T99:99:99")), HostValue::from("2024-13-45T99:99:99"));
    }

    #[test]
    fn test_media_scenario() {
        let codec = Codec::new();
        let decoded = codec.decode(&json!({"media_type": "image/png", "bytes": "AQID"}));
        assert_eq!(decoded, HostValue::from("data:image/png;base64,AQID"));
    }

    #[test]
    fn test_media_requires_string_fields() {
        let codec = Codec::new();
        let decoded = codec.decode(&json!({"media_type": "image/png", "bytes": [1, 2]}));
        assert!(decoded.as_map().is_some());
    }

    #[test]
    fn test_nested_decode() {
        let codec = Codec::new();
        let decoded = codec.decode(&json!({"list": [1, "x", null], "flag": true}));
        assert_eq!(
            decoded,
            HostValue::map([
                ("list", HostValue::Seq(vec![HostValue::from(1), HostValue::from("x"), HostValue::Null])),
                ("flag", HostValue::from(true)),
            ])
        );
    }

    #[test]
    fn test_deferred_matches_immediate_without_extensions() {
        let codec = Codec::new();
        let wire = json!({
            "at": "2024-01-01T00:00:00.000Z",
            "img": {"media_type": "image/gif", "bytes": "R0lG"},
            "items": [1, [2, 3]],
        });
        let deferred = tokio_test::block_on(codec.decode_deferred(wire.clone())).expect("decode");
        assert_eq!(deferred, codec.decode(&wire));
    }

    #[test]
    fn test_decode_bytes_rejects_garbage() {
        assert_eq!(decode_bytes("AQID").expect("decode"), vec![1, 2, 3]);
        assert!(decode_bytes("***").is_err());
    }

    #[tokio::test]
    async fn test_deferred_extension_keeps_input_order() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        tokio::fs::write(&first, "one").await?;
        tokio::fs::write(&second, "two").await?;

        let codec = Codec::new().with_decoder(FileExtension);
        let wire = json!([
            {"file": first.to_string_lossy(), "delay_ms": 40},
            {"file": second.to_string_lossy(), "delay_ms": 0},
            "plain",
        ]);

        let decoded = codec.decode_deferred(wire.clone()).await?;
        assert_eq!(decoded, HostValue::seq(["one", "two", "plain"]));

        // Immediate variant ignores extensions.
        let immediate = codec.decode(&wire);
        assert!(immediate.as_seq().is_some_and(|s| s[0].as_map().is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn test_deferred_extension_error_propagates() {
        let codec = Codec::new().with_decoder(FailingExtension);
        let result = codec.decode_deferred(json!({"nested": ["ok", "fail"]})).await;
        assert!(matches!(result, Err(Error::Extension { .. })));
    }

    fn lossless_value() -> impl Strategy<Value = HostValue> {
        let leaf = prop_oneof![
            Just(HostValue::Null),
            any::<bool>().prop_map(HostValue::from),
            any::<i64>().prop_map(HostValue::from),
            (-1.0e12f64..1.0e12).prop_map(HostValue::from),
            "[a-z ]{0,12}".prop_map(HostValue::from),
            (0i64..4_102_444_800_000).prop_map(|ms| {
                HostValue::DateTime(Utc.timestamp_millis_opt(ms).single().unwrap_or_default())
            }),
        ];

        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(HostValue::Seq),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(HostValue::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_base64_round_trip(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(decode_bytes(&encode_bytes(&bytes)).ok(), Some(bytes));
        }

        #[test]
        fn prop_bytes_restore_through_codec(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let codec = Codec::new();
            let decoded = codec.decode(&codec.encode(&HostValue::from(bytes.clone())));
            prop_assert_eq!(decoded.to_bytes(), Some(bytes));
        }

        #[test]
        fn prop_lossless_round_trip(value in lossless_value()) {
            let codec = Codec::new();
            let decoded = codec.decode(&codec.encode(&value));
            prop_assert_eq!(decoded, value);
        }
    }
}

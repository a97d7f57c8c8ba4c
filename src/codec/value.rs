//! Host-side value model.
//!
//! [`HostValue`] is an explicit tagged value: callers say what a value *is*
//! (a timestamp, a byte buffer, an opaque handle) instead of the codec
//! guessing from its runtime shape.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Number;

use super::SafeValue;

// ============================================================================
// OpaqueValue
// ============================================================================

/// A host-side handle with no structural wire form.
///
/// Unless an [`EncodeExtension`](super::EncodeExtension) is registered for
/// its [`kind`](OpaqueValue::kind), the value is sent as its `Display`
/// rendering. That path is lossy and logged.
pub trait OpaqueValue: fmt::Debug + fmt::Display + Send + Sync {
    /// Name used to look up encode extensions.
    fn kind(&self) -> &str;

    /// Access to the concrete type for extensions that downcast.
    fn as_any(&self) -> &dyn Any;
}

// ============================================================================
// NumericView
// ============================================================================

/// A fixed-width numeric array, sent as its little-endian bytes in base64.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericView {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    U64(Vec<u64>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl NumericView {
    /// Returns the element count.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Returns `true` if the view has no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of one element in bytes.
    #[must_use]
    pub const fn element_width(&self) -> usize {
        match self {
            Self::U8(_) | Self::I8(_) => 1,
            Self::U16(_) | Self::I16(_) => 2,
            Self::U32(_) | Self::I32(_) | Self::F32(_) => 4,
            Self::U64(_) | Self::I64(_) | Self::F64(_) => 8,
        }
    }

    /// Flattens the view into its little-endian byte representation.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::U8(v) => v.clone(),
            Self::I8(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::U64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}

// ============================================================================
// HostValue
// ============================================================================

/// Any value that can cross the bridge.
///
/// Encoding produces a [`SafeValue`]; decoding produces a `HostValue` again.
/// Only primitives, timestamps and pure structure survive the trip
/// unchanged. Binary data comes back as its base64 string (see
/// [`HostValue::to_bytes`]), paths and opaque handles come back as strings.
#[derive(Debug, Clone)]
pub enum HostValue {
    /// JSON null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer or finite float.
    Number(Number),
    /// UTF-8 text.
    String(String),
    /// Point in time, sent as ISO-8601 with millisecond precision.
    DateTime(DateTime<Utc>),
    /// Raw byte buffer, sent as base64.
    Bytes(Vec<u8>),
    /// Fixed-width numeric view, sent as base64 of its bytes.
    View(NumericView),
    /// Ordered sequence (arrays and sets).
    Seq(Vec<HostValue>),
    /// String-keyed mapping.
    Map(BTreeMap<String, HostValue>),
    /// Filesystem path, sent as a string.
    Path(PathBuf),
    /// Opaque host handle, sent through an extension or as a string.
    Opaque(Arc<dyn OpaqueValue>),
}

// ============================================================================
// HostValue - Constructors
// ============================================================================

impl HostValue {
    /// Wraps an opaque host handle.
    #[inline]
    #[must_use]
    pub fn opaque(value: impl OpaqueValue + 'static) -> Self {
        Self::Opaque(Arc::new(value))
    }

    /// Builds a sequence from any iterator of convertible items.
    #[must_use]
    pub fn seq<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<HostValue>,
    {
        Self::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Builds a mapping, coercing every key to a string.
    #[must_use]
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: fmt::Display,
        V: Into<HostValue>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }

    /// Builds a media mapping `{media_type, bytes}`.
    ///
    /// The receiving decoder restores it as a `data:` URI string.
    #[must_use]
    pub fn media(media_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let mut map = BTreeMap::new();
        map.insert("media_type".to_string(), Self::String(media_type.into()));
        map.insert("bytes".to_string(), Self::Bytes(bytes.into()));
        Self::Map(map)
    }
}

// ============================================================================
// HostValue - Accessors
// ============================================================================

impl HostValue {
    /// Returns `true` for [`HostValue::Null`].
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string slice, if this is a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a boolean.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `i64`, if representable.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the number as `f64`.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns the timestamp, if this is a temporal value.
    #[inline]
    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Returns the elements, if this is a sequence.
    #[inline]
    #[must_use]
    pub fn as_seq(&self) -> Option<&[HostValue]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries, if this is a mapping.
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, HostValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key in a mapping.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Returns the binary payload.
    ///
    /// Byte buffers and views return their bytes directly; a string is
    /// treated as the base64 form produced by encoding and decoded.
    #[must_use]
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Some(bytes.clone()),
            Self::View(view) => Some(view.to_le_bytes()),
            Self::String(text) => STANDARD.decode(text).ok(),
            _ => None,
        }
    }
}

// ============================================================================
// HostValue - Equality
// ============================================================================

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::View(a), Self::View(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Path(a), Self::Path(b)) => a == b,
            // Handles compare by identity.
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ============================================================================
// HostValue - Conversions
// ============================================================================

impl From<()> for HostValue {
    #[inline]
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<bool> for HostValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for HostValue {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::Number(Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for HostValue {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Self::Null, Self::Number)
    }
}

impl From<f32> for HostValue {
    fn from(value: f32) -> Self {
        Self::from(f64::from(value))
    }
}

impl From<String> for HostValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for HostValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<u8>> for HostValue {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for HostValue {
    #[inline]
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<NumericView> for HostValue {
    #[inline]
    fn from(value: NumericView) -> Self {
        Self::View(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for HostValue {
    #[inline]
    fn from(value: DateTime<Tz>) -> Self {
        Self::DateTime(value.with_timezone(&Utc))
    }
}

impl From<PathBuf> for HostValue {
    #[inline]
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for HostValue {
    #[inline]
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<HostValue>> for HostValue {
    #[inline]
    fn from(value: Vec<HostValue>) -> Self {
        Self::Seq(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<HostValue>> From<BTreeSet<T>> for HostValue {
    fn from(value: BTreeSet<T>) -> Self {
        Self::seq(value)
    }
}

impl<T: Into<HostValue>> From<HashSet<T>> for HostValue {
    fn from(value: HashSet<T>) -> Self {
        Self::seq(value)
    }
}

impl<K: fmt::Display, V: Into<HostValue>> From<BTreeMap<K, V>> for HostValue {
    fn from(value: BTreeMap<K, V>) -> Self {
        Self::map(value)
    }
}

impl<K: fmt::Display, V: Into<HostValue>> From<HashMap<K, V>> for HostValue {
    fn from(value: HashMap<K, V>) -> Self {
        Self::map(value)
    }
}

impl FromIterator<HostValue> for HostValue {
    fn from_iter<I: IntoIterator<Item = HostValue>>(iter: I) -> Self {
        Self::Seq(iter.into_iter().collect())
    }
}

impl From<SafeValue> for HostValue {
    /// Structural conversion only; strings are never reinterpreted.
    fn from(value: SafeValue) -> Self {
        match value {
            SafeValue::Null => Self::Null,
            SafeValue::Bool(b) => Self::Bool(b),
            SafeValue::Number(n) => Self::Number(n),
            SafeValue::String(s) => Self::String(s),
            SafeValue::Array(items) => items.into_iter().map(Self::from).collect(),
            SafeValue::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Codec instance and extension registry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use super::{DecodeExtension, EncodeExtension};

// ============================================================================
// Codec
// ============================================================================

/// Converts [`HostValue`](super::HostValue)s to and from their wire form.
///
/// Cheap to clone; extensions are shared.
///
/// # Example
///
/// ```ignore
/// use webview_bridge::codec::{Codec, HostValue};
///
/// let codec = Codec::new();
/// let wire = codec.encode(&HostValue::from(vec![1u8, 2, 3]));
/// assert_eq!(wire, serde_json::json!("AQID"));
/// ```
#[derive(Clone, Default)]
pub struct Codec {
    /// Encode extensions, consulted in registration order.
    pub(super) encoders: Vec<Arc<dyn EncodeExtension>>,
    /// Decode extensions, consulted in registration order.
    pub(super) decoders: Vec<Arc<dyn DecodeExtension>>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoders: Vec<&str> = self.encoders.iter().map(|e| e.kind()).collect();
        let decoders: Vec<&str> = self.decoders.iter().map(|d| d.kind()).collect();
        f.debug_struct("Codec")
            .field("encoders", &encoders)
            .field("decoders", &decoders)
            .finish()
    }
}

impl Codec {
    /// Creates a codec with no extensions.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an encode extension.
    #[must_use]
    pub fn with_encoder(mut self, extension: impl EncodeExtension + 'static) -> Self {
        self.encoders.push(Arc::new(extension));
        self
    }

    /// Adds a decode extension.
    #[must_use]
    pub fn with_decoder(mut self, extension: impl DecodeExtension + 'static) -> Self {
        self.decoders.push(Arc::new(extension));
        self
    }

    /// Adds a shared encode extension.
    pub fn register_encoder(&mut self, extension: Arc<dyn EncodeExtension>) {
        self.encoders.push(extension);
    }

    /// Adds a shared decode extension.
    pub fn register_decoder(&mut self, extension: Arc<dyn DecodeExtension>) {
        self.decoders.push(extension);
    }

    /// Returns `true` if any decode extension is registered.
    #[inline]
    #[must_use]
    pub fn has_decoders(&self) -> bool {
        !self.decoders.is_empty()
    }
}

//! Outbound and inbound wire messages.
//!
//! Every frame is a single JSON text frame.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::codec::SafeValue;
use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;

// ============================================================================
// OutboundMessage
// ============================================================================

/// A command invocation from the rendering surface to the host.
///
/// # Format
///
/// ```json
/// {
///   "command": "echo",
///   "result_id": 1804289383,
///   "error_id": 846930886,
///   "payload": { "value": 42 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Command name.
    pub command: String,

    /// Id the host answers with on success.
    pub result_id: CorrelationId,

    /// Id the host answers with on failure.
    pub error_id: CorrelationId,

    /// Encoded arguments.
    #[serde(default)]
    pub payload: SafeValue,
}

impl OutboundMessage {
    /// Creates a new outbound message.
    #[inline]
    #[must_use]
    pub fn new(
        command: impl Into<String>,
        result_id: CorrelationId,
        error_id: CorrelationId,
        payload: SafeValue,
    ) -> Self {
        Self {
            command: command.into(),
            result_id,
            error_id,
            payload,
        }
    }

    /// Parses a raw frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the frame is not valid JSON or
    /// lacks a required field.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))
    }
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A frame received by the rendering surface.
///
/// Replies carry `result_id` with `result`, or `error_id` with `error`.
/// Frames without either id are unsolicited events.
///
/// # Format
///
/// Success:
/// ```json
/// { "result_id": 1804289383, "result": 42 }
/// ```
///
/// Failure:
/// ```json
/// { "error_id": 846930886, "error": "division by zero" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Success correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<CorrelationId>,

    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SafeValue>,

    /// Failure correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<CorrelationId>,

    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SafeValue>,
}

impl InboundMessage {
    /// Creates a success reply.
    #[inline]
    #[must_use]
    pub fn success(result_id: CorrelationId, result: SafeValue) -> Self {
        Self {
            result_id: Some(result_id),
            result: Some(result),
            ..Self::default()
        }
    }

    /// Creates a failure reply.
    #[inline]
    #[must_use]
    pub fn failure(error_id: CorrelationId, error: SafeValue) -> Self {
        Self {
            error_id: Some(error_id),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Parses a raw frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the frame is not JSON, is not
    /// an object, or carries ids that are not unsigned 32-bit integers.
    pub fn parse(text: &str) -> Result<Self> {
        let value: SafeValue =
            serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))?;

        if !value.is_object() {
            return Err(Error::malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }

        serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Returns `true` if the frame carries a correlation id.
    #[inline]
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.result_id.is_some() || self.error_id.is_some()
    }
}

/// Names the JSON type of a value for diagnostics.
fn json_kind(value: &SafeValue) -> &'static str {
    match value {
        SafeValue::Null => "null",
        SafeValue::Bool(_) => "boolean",
        SafeValue::Number(_) => "number",
        SafeValue::String(_) => "string",
        SafeValue::Array(_) => "array",
        SafeValue::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

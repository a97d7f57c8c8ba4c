//! Error types for the bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webview_bridge::{Bridge, Result};
//!
//! async fn example(bridge: &Bridge) -> Result<()> {
//!     let answer = bridge.call("echo", 42).await?;
//!     println!("{answer:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionUnavailable`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::MalformedMessage`], [`Error::Remote`] |
//! | Execution | [`Error::RequestTimeout`], [`Error::Extension`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::codec::{HostValue, SafeValue};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Invocation attempted while the connection is not open.
    ///
    /// No frame was sent and no correlation id was allocated.
    #[error("Connection unavailable for command '{command}'")]
    ConnectionUnavailable {
        /// Command that could not be sent.
        command: String,
    },

    /// The pending invocation was abandoned before it settled.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound frame could not be parsed or has an unrecognized shape.
    ///
    /// Never returned to an invocation caller; the broker logs and drops.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Description of what was wrong with the frame.
        message: String,
    },

    /// The remote end rejected an invocation.
    #[error("Remote error for '{command}': {message}")]
    Remote {
        /// Command that was rejected.
        command: String,
        /// Human readable rendering of the payload.
        message: String,
        /// Decoded error payload.
        payload: HostValue,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Invocation did not settle within the caller's timeout.
    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// Command that timed out.
        command: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// A codec extension failed while restoring a value.
    #[error("Codec extension '{kind}' failed: {message}")]
    Extension {
        /// Kind handled by the failing extension.
        kind: String,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection unavailable error.
    #[inline]
    pub fn connection_unavailable(command: impl Into<String>) -> Self {
        Self::ConnectionUnavailable {
            command: command.into(),
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a remote error from the decoded payload and its wire form.
    ///
    /// String payloads are used verbatim as the message, anything else is
    /// rendered as compact JSON.
    pub fn remote(command: impl Into<String>, payload: HostValue, wire: &SafeValue) -> Self {
        let message = match wire {
            SafeValue::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self::Remote {
            command: command.into(),
            message,
            payload,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(command: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            command: command.into(),
            timeout_ms,
        }
    }

    /// Creates a codec extension error.
    #[inline]
    pub fn extension(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extension {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if the remote end rejected the invocation.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns the decoded remote payload, if this is a remote error.
    #[inline]
    #[must_use]
    pub fn remote_payload(&self) -> Option<&HostValue> {
        match self {
            Self::Remote { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionUnavailable { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

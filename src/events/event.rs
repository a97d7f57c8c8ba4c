//! Connection lifecycle events.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Closed without a status code in the close frame.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Closed without a close frame (transport failure).
pub const CLOSE_ABNORMAL: u16 = 1006;

// ============================================================================
// EventKind
// ============================================================================

/// The four lifecycle signals subscribers can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Connection opened.
    Open,
    /// Text frame received.
    Message,
    /// Transport error.
    Error,
    /// Connection closed.
    Close,
}

impl EventKind {
    /// Returns the event name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Error => "error",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CloseInfo
// ============================================================================

/// Details of a connection close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason, possibly empty.
    pub reason: String,
    /// `true` if a close handshake took place.
    pub was_clean: bool,
}

impl CloseInfo {
    /// Creates a clean close with the given code and reason.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean: true,
        }
    }

    /// Creates an abnormal close (no close frame).
    #[inline]
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: reason.into(),
            was_clean: false,
        }
    }
}

// ============================================================================
// BridgeEvent
// ============================================================================

/// A lifecycle signal delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Connection opened.
    Open,
    /// Raw text frame.
    Message(String),
    /// Transport error description.
    Error(String),
    /// Connection closed.
    Close(CloseInfo),
}

impl BridgeEvent {
    /// Returns the kind of this event.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
            Self::Close(_) => EventKind::Close,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::Open.to_string(), "open");
        assert_eq!(EventKind::Message.as_str(), "message");
        assert_eq!(BridgeEvent::Error("x".into()).kind(), EventKind::Error);
        assert_eq!(
            BridgeEvent::Close(CloseInfo::new(CLOSE_NORMAL, "")).kind(),
            EventKind::Close
        );
    }

    #[test]
    fn test_abnormal_close() {
        let info = CloseInfo::abnormal("reset");
        assert_eq!(info.code, CLOSE_ABNORMAL);
        assert!(!info.was_clean);
    }
}

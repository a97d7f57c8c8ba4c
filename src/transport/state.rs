//! Connection state machine.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle phase of the managed connection.
///
/// ```text
/// Disconnected -> Connecting -> Open -> Closing -> Disconnected
///                     |                    ^
///                     +--------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Frames may be sent.
    Open,
    /// Close in progress.
    Closing,
}

impl ConnectionState {
    /// Returns `true` if `next` is a legal successor of `self`.
    #[inline]
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Closing)
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Disconnected)
        )
    }

    /// Returns the lowercase phase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================

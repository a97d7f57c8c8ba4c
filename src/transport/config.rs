//! Connection configuration.
//!
//! Mirrors the configuration surface handed to the bridge at start-up:
//!
//! ```json
//! {
//!   "endpoint": "ws://127.0.0.1:8765",
//!   "protocols": ["bridge.v1"],
//!   "reconnectInterval": 3000,
//!   "autoReconnect": true
//! }
//! ```
//!
//! Snake-case keys (`reconnect_interval`, `auto_reconnect`) are accepted too.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay before a reconnect attempt.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3000;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Bounds on automatic reconnection.
///
/// The default retries forever at a fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    /// Maximum consecutive attempts, `None` for unbounded.
    #[serde(alias = "max_attempts")]
    pub max_attempts: Option<u32>,

    /// Multiplier applied per attempt (1.0 keeps the interval fixed).
    #[serde(alias = "backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound on a single delay in milliseconds.
    #[serde(alias = "max_interval_ms", alias = "maxInterval")]
    pub max_interval_ms: Option<u64>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_factor: 1.0,
            max_interval_ms: None,
        }
    }
}

impl ReconnectPolicy {
    /// Unbounded retries at the configured interval.
    #[inline]
    #[must_use]
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Exponential backoff capped at `max_interval`.
    #[inline]
    #[must_use]
    pub fn exponential(factor: f64, max_interval: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff_factor: factor,
            max_interval_ms: Some(u64::try_from(max_interval.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Limits the number of consecutive attempts.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Returns `true` if attempt number `attempt` (1-based) may run.
    #[inline]
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }

    /// Delay before attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let mut millis = base.as_millis() as f64 * factor;

        if let Some(cap) = self.max_interval_ms {
            millis = millis.min(cap as f64);
        }

        Duration::from_millis(millis.clamp(0.0, u64::MAX as f64) as u64)
    }
}

// ============================================================================
// BridgeConfig
// ============================================================================

/// Connection settings supplied at bridge initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// WebSocket endpoint. `connect()` does nothing without one.
    #[serde(alias = "url")]
    pub endpoint: Option<Url>,

    /// Requested sub-protocols, in preference order.
    pub protocols: Vec<String>,

    /// Base reconnect delay in milliseconds.
    #[serde(rename = "reconnectInterval", alias = "reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Reconnect after unsolicited closes.
    #[serde(alias = "auto_reconnect")]
    pub auto_reconnect: bool,

    /// Bounds on automatic reconnection.
    pub reconnect: ReconnectPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocols: Vec::new(),
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            auto_reconnect: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl BridgeConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document does not match the schema
    /// - [`Error::Config`] if validation fails
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the base reconnect delay.
    #[inline]
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Checks the endpoint scheme and sub-protocol names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint
            && !matches!(endpoint.scheme(), "ws" | "wss")
        {
            return Err(Error::config(format!(
                "Endpoint must use ws:// or wss://, got '{endpoint}'"
            )));
        }

        if let Some(bad) = self
            .protocols
            .iter()
            .find(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_graphic() && c != ','))
        {
            return Err(Error::config(format!("Invalid sub-protocol name: '{bad}'")));
        }

        if !self.reconnect.backoff_factor.is_finite() || self.reconnect.backoff_factor < 1.0 {
            return Err(Error::config("Reconnect backoff factor must be >= 1.0"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.endpoint.is_none());
        assert!(config.protocols.is_empty());
        assert_eq!(config.reconnect_interval(), Duration::from_millis(3000));
        assert!(config.auto_reconnect);
        assert_eq!(config.reconnect, ReconnectPolicy::fixed());
    }

    #[test]
    fn test_from_json_camel_case() {
        let config = BridgeConfig::from_json(
            r#"{
                "endpoint": "ws://127.0.0.1:9000/bridge",
                "protocols": ["bridge.v1"],
                "reconnectInterval": 500,
                "autoReconnect": false
            }"#,
        )
        .expect("parse");

        assert_eq!(
            config.endpoint.as_ref().map(Url::as_str),
            Some("ws://127.0.0.1:9000/bridge")
        );
        assert_eq!(config.protocols, vec!["bridge.v1".to_string()]);
        assert_eq!(config.reconnect_interval_ms, 500);
        assert!(!config.auto_reconnect);
    }

    #[test]
    fn test_from_json_snake_case_and_defaults() {
        let config = BridgeConfig::from_json(r#"{"url": "wss://host/ws", "auto_reconnect": true, "reconnect_interval": 10}"#)
            .expect("parse");
        assert_eq!(config.reconnect_interval_ms, 10);
        assert!(config.auto_reconnect);
        assert!(config.protocols.is_empty());
    }

    #[test]
    fn test_rejects_http_scheme() {
        let result = BridgeConfig::from_json(r#"{"endpoint": "http://localhost:1"}"#);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_rejects_bad_protocol_name() {
        let config = BridgeConfig {
            protocols: vec!["a,b".to_string()],
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::fixed();
        let base = Duration::from_millis(3000);
        assert_eq!(policy.delay(base, 1), base);
        assert_eq!(policy.delay(base, 10), base);
        assert!(policy.allows(u32::MAX));
    }

    #[test]
    fn test_exponential_delay_capped() {
        let policy = ReconnectPolicy::exponential(2.0, Duration::from_millis(5000));
        let base = Duration::from_millis(1000);
        assert_eq!(policy.delay(base, 1), Duration::from_millis(1000));
        assert_eq!(policy.delay(base, 2), Duration::from_millis(2000));
        assert_eq!(policy.delay(base, 3), Duration::from_millis(4000));
        assert_eq!(policy.delay(base, 4), Duration::from_millis(5000));
        assert_eq!(policy.delay(base, 60), Duration::from_millis(5000));
    }

    #[test]
    fn test_max_attempts() {
        let policy = ReconnectPolicy::fixed().with_max_attempts(2);
        assert!(policy.allows(1));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn test_policy_from_json() {
        let config = BridgeConfig::from_json(
            r#"{"reconnect": {"maxAttempts": 5, "backoffFactor": 1.5, "maxIntervalMs": 9000}}"#,
        )
        .expect("parse");
        assert_eq!(config.reconnect.max_attempts, Some(5));
        assert_eq!(config.reconnect.max_interval_ms, Some(9000));
    }
}

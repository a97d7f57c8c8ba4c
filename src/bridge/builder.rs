//! Builder pattern for bridge configuration.
//!
//! Provides a fluent API for configuring and creating [`Bridge`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use webview_bridge::Bridge;
//!
//! # fn example() -> webview_bridge::Result<()> {
//! let bridge = Bridge::builder()
//!     .endpoint("ws://127.0.0.1:8765")
//!     .protocol("bridge.v1")
//!     .reconnect_interval(Duration::from_secs(3))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::codec::{Codec, DecodeExtension, EncodeExtension};
use crate::error::{Error, Result};
use crate::transport::{BridgeConfig, ReconnectPolicy};

use super::core::Bridge;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`] instance.
///
/// Use [`Bridge::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct BridgeBuilder {
    /// Endpoint as given, parsed in `build`.
    endpoint: Option<String>,
    protocols: Vec<String>,
    reconnect_interval: Option<Duration>,
    auto_reconnect: Option<bool>,
    policy: Option<ReconnectPolicy>,
    codec: Codec,
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a new builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    #[must_use]
    pub fn from_config(config: BridgeConfig) -> Self {
        Self {
            endpoint: config.endpoint.map(String::from),
            protocols: config.protocols,
            reconnect_interval: Some(Duration::from_millis(config.reconnect_interval_ms)),
            auto_reconnect: Some(config.auto_reconnect),
            policy: Some(config.reconnect),
            codec: Codec::new(),
        }
    }

    /// Sets the WebSocket endpoint (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Appends one requested sub-protocol.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Replaces the requested sub-protocols.
    #[must_use]
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the base reconnect delay (default 3 s).
    #[inline]
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = Some(interval);
        self
    }

    /// Enables or disables reconnect after unsolicited closes (default on).
    #[inline]
    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = Some(enabled);
        self
    }

    /// Sets attempt limits and backoff.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Registers an encode extension for opaque values.
    #[must_use]
    pub fn extension(mut self, extension: impl EncodeExtension + 'static) -> Self {
        self.codec.register_encoder(Arc::new(extension));
        self
    }

    /// Registers a decode extension.
    #[must_use]
    pub fn decode_extension(mut self, extension: impl DecodeExtension + 'static) -> Self {
        self.codec.register_decoder(Arc::new(extension));
        self
    }

    /// Replaces the codec, dropping extensions registered so far.
    #[inline]
    #[must_use]
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Builds the bridge with validation.
    ///
    /// A missing endpoint is not an error; `connect()` then does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is not a `ws`/`wss` URL
    /// - [`Error::Config`] if a sub-protocol name or the policy is invalid
    pub fn build(self) -> Result<Bridge> {
        let config = self.to_config()?;
        Ok(Bridge::assemble(config, self.codec))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeBuilder {
    /// Resolves the builder into a validated configuration.
    fn to_config(&self) -> Result<BridgeConfig> {
        let endpoint = self
            .endpoint
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| {
                    Error::config(format!(
                        "Invalid endpoint '{raw}': {e}\n\
                         Example: Bridge::builder().endpoint(\"ws://127.0.0.1:8765\")"
                    ))
                })
            })
            .transpose()?;

        let defaults = BridgeConfig::default();
        let config = BridgeConfig {
            endpoint,
            protocols: self.protocols.clone(),
            reconnect_interval_ms: self.reconnect_interval.map_or(defaults.reconnect_interval_ms, |d| {
                u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
            }),
            auto_reconnect: self.auto_reconnect.unwrap_or(defaults.auto_reconnect),
            reconnect: self.policy.clone().unwrap_or(defaults.reconnect),
        };

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default outbound queue capacity per session.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 5;

/// Default interval between liveness pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Default deadline for a single write.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(5);

/// Default upper bound on an inbound frame, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024;

/// Tunables for a catcher session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of messages that may wait in the outbound queue.
    pub outbound_capacity: usize,

    /// Cadence of liveness pings.
    #[serde(with = "humantime_serde")]
    pub ping_interval: Duration,

    /// Deadline applied to every ping, message and close write.
    #[serde(with = "humantime_serde")]
    pub write_wait: Duration,

    /// Inbound frames larger than this terminate the read side.
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            ping_interval: DEFAULT_PING_INTERVAL,
            write_wait: DEFAULT_WRITE_WAIT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Configuration error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Outbound capacity must be at least 1")]
    ZeroCapacity,
    #[error("Ping interval must be non-zero")]
    ZeroPingInterval,
    #[error("Write wait must be non-zero")]
    ZeroWriteWait,
    #[error("Max message size must be non-zero")]
    ZeroMessageSize,
}

impl SessionConfig {
    /// Check that every tunable is usable.
    ///
    /// # Errors
    /// Returns the first zero-valued setting found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.ping_interval.is_zero() {
            return Err(ConfigError::ZeroPingInterval);
        }
        if self.write_wait.is_zero() {
            return Err(ConfigError::ZeroWriteWait);
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::ZeroMessageSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.outbound_capacity, 5);
        assert_eq!(config.ping_interval, Duration::from_secs(1));
        assert_eq!(config.write_wait, Duration::from_secs(5));
        assert_eq!(config.max_message_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_humantime_deserialization() {
        let json = r#"{"ping_interval": "250ms", "write_wait": "2s"}"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ping_interval, Duration::from_millis(250));
        assert_eq!(config.write_wait, Duration::from_secs(2));
        // Missing fields fall back to defaults
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = SessionConfig {
            outbound_capacity: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        let config = SessionConfig {
            ping_interval: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPingInterval));

        let config = SessionConfig {
            max_message_size: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMessageSize));
    }
}

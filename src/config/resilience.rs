//! Configuration for the rate limiter and circuit breaker.

use crate::error::ConfigError;
use core::fmt;
use std::time::Duration;

/// Configuration for a token-bucket [`RateLimiter`](crate::RateLimiter).
///
/// A full bucket of `rate` tokens is granted once per elapsed `interval`.
///
/// ```
/// use cmdhint_core::config::RateLimiterConfig;
/// use std::time::Duration;
///
/// // At most 10 lookups against a remote source per second.
/// let config = RateLimiterConfig {
///     rate: 10,
///     interval: Duration::from_secs(1),
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateLimiterConfig {
    /// Tokens granted per interval (also the bucket size).
    pub rate: u64,
    /// Refill period.
    pub interval: Duration,
}

impl RateLimiterConfig {
    /// Checks the config for values that cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate == 0 {
            return Err(ConfigError::Zero("rate"));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Zero("interval"));
        }
        Ok(())
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rate: 100,
            interval: Duration::from_secs(1),
        }
    }
}

impl fmt::Debug for RateLimiterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiterConfig")
            .field("rate", &self.rate)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// How long the breaker stays open after the last failure.
    pub timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Checks the config for values that cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Zero("failure_threshold"));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("failure_threshold", &self.failure_threshold)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_validate() {
        assert!(RateLimiterConfig::default().validate().is_ok());
        let zero_rate = RateLimiterConfig {
            rate: 0,
            interval: Duration::from_secs(1),
        };
        assert_eq!(zero_rate.validate(), Err(ConfigError::Zero("rate")));
        let zero_interval = RateLimiterConfig {
            rate: 1,
            interval: Duration::ZERO,
        };
        assert_eq!(zero_interval.validate(), Err(ConfigError::Zero("interval")));
    }

    #[test]
    fn test_circuit_breaker_config_validate() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
        let zero = CircuitBreakerConfig {
            failure_threshold: 0,
            timeout: Duration::from_secs(1),
        };
        assert!(zero.validate().is_err());
    }
}

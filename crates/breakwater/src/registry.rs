//! Named-instance registry for breakers and limiters.
//!
//! One breaker and one limiter exist per guarded dependency name. The
//! composition root owns a [`GuardRegistry`] and hands shared instances to
//! callers, instead of callers importing ambient module-level state.

use std::sync::Arc;

use dashmap::DashMap;

use crate::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::error::ConfigError;
use crate::ratelimit::RateLimiter;

/// Default pacing for resources without a registered rate.
const DEFAULT_REQUESTS_PER_MINUTE: f64 = 60.0;

/// Owns the per-dependency breaker and limiter instances.
///
/// Instances are created lazily from the registry defaults on first use and
/// shared from then on: every caller asking for the same name paces and
/// trips against the same state.
pub struct GuardRegistry {
    breaker_defaults: BreakerConfig,
    default_rate: f64,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    limiters: DashMap<String, Arc<RateLimiter>>,
}

impl GuardRegistry {
    /// Registry with the given defaults for unregistered names.
    ///
    /// Defaults are validated here so lazy instance creation cannot fail.
    pub fn new(
        breaker_defaults: BreakerConfig,
        requests_per_minute: f64,
    ) -> Result<Self, ConfigError> {
        breaker_defaults.validate()?;
        if !(requests_per_minute > 0.0) {
            return Err(ConfigError::NonPositiveRate(requests_per_minute));
        }
        Ok(Self {
            breaker_defaults,
            default_rate: requests_per_minute,
            breakers: DashMap::new(),
            limiters: DashMap::new(),
        })
    }

    /// Breaker for `name`, created from the registry defaults on first use.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| CircuitBreaker::new_unchecked(name, self.breaker_defaults.clone()))
            .clone()
    }

    /// Limiter for `name`, created from the registry default rate on first use.
    pub fn limiter(&self, name: &str) -> Arc<RateLimiter> {
        self.limiters
            .entry(name.to_string())
            .or_insert_with(|| RateLimiter::new_unchecked(name, self.default_rate))
            .clone()
    }

    /// Install a purpose-built breaker for `name`, replacing any existing
    /// instance (and its accumulated state).
    pub fn register_breaker(
        &self,
        name: &str,
        config: BreakerConfig,
    ) -> Result<Arc<CircuitBreaker>, ConfigError> {
        let breaker = CircuitBreaker::new(name, config)?;
        self.breakers.insert(name.to_string(), breaker.clone());
        Ok(breaker)
    }

    /// Install a purpose-built limiter for `name`, replacing any existing
    /// instance (and its accumulated state).
    pub fn register_limiter(
        &self,
        name: &str,
        requests_per_minute: f64,
    ) -> Result<Arc<RateLimiter>, ConfigError> {
        let limiter = RateLimiter::new(name, requests_per_minute)?;
        self.limiters.insert(name.to_string(), limiter.clone());
        Ok(limiter)
    }
}

impl Default for GuardRegistry {
    fn default() -> Self {
        Self {
            breaker_defaults: BreakerConfig::default(),
            default_rate: DEFAULT_REQUESTS_PER_MINUTE,
            breakers: DashMap::new(),
            limiters: DashMap::new(),
        }
    }
}

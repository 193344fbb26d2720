//! Shared request pacing
//!
//! One token bucket gates every API call the process makes, from every worker
//! and from the live war monitor. The bucket holds `requests` tokens and
//! refills one token every `window / requests`.

use crate::config::ApiConfig;
use crate::ConfigError;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Token-bucket limiter shared behind an `Arc`
pub struct RequestLimiter {
    inner: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    requests: u32,
    window: Duration,
}

impl RequestLimiter {
    /// Creates a limiter allowing `requests` calls per `window`
    ///
    /// # Returns
    ///
    /// * `Ok(RequestLimiter)` - The limiter, starting with a full bucket
    /// * `Err(ConfigError)` - Zero requests or a window too short to divide
    pub fn new(requests: u32, window: Duration) -> Result<Self, ConfigError> {
        let burst = NonZeroU32::new(requests).ok_or_else(|| {
            ConfigError::Validation("requests-per-window must be at least 1".to_string())
        })?;

        let quota = Quota::with_period(window / requests)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "window of {:?} is too short for {} requests",
                    window, requests
                ))
            })?
            .allow_burst(burst);

        Ok(Self {
            inner: RateLimiter::direct(quota),
            requests,
            window,
        })
    }

    /// Builds the limiter described by the `[api]` section
    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.requests_per_window,
            Duration::from_secs(config.window_secs),
        )
    }

    /// Waits until a request may be made
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }

    /// Takes a token if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }

    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("requests", &self.requests)
            .field("window", &self.window)
            .finish()
    }
}

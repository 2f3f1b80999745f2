//! Credential verification and rate limiting configuration.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    default_lookup_timeout_ms, default_rate_limit, default_retention_secs,
    default_retry_after_secs, default_sweep_interval_secs, default_token_hash_cost,
    default_window_secs,
};

/// Credential verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session JWTs. When absent, JWT credentials are
    /// answered with 503 rather than being treated as invalid.
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim, if any.
    pub jwt_issuer: Option<String>,
    /// Deadline for token store and permission store lookups (default: 5000ms).
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    /// Use the first `X-Forwarded-For` entry as the source address.
    /// Only enable behind a trusted reverse proxy.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    /// bcrypt cost for newly issued API tokens (default: 12).
    #[serde(default = "default_token_hash_cost")]
    pub token_hash_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_issuer: None,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            trust_forwarded_for: false,
            token_hash_cost: default_token_hash_cost(),
        }
    }
}

impl AuthConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

/// Token bucket configuration.
///
/// Each credential gets `default_limit` requests per `window_secs` unless the
/// credential carries its own positive ceiling. Refill is continuous.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per window (default: 1000).
    #[serde(default = "default_rate_limit")]
    pub default_limit: u32,
    /// Refill window in seconds (default: 3600).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Interval between idle bucket sweeps (default: 600).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Idle time after which a bucket is reclaimed (default: 600).
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Value of the `Retry-After` header on 429 responses (default: 60).
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_limit: default_rate_limit(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
            retry_after_secs: default_retry_after_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Minimum HMAC secret length for session JWTs.
const MIN_JWT_SECRET_LEN: usize = 32;

/// bcrypt's accepted cost range.
const HASH_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("rate_limit.default_limit must be greater than zero")]
    ZeroDefaultLimit,
    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,
    #[error("rate_limit.sweep_interval_secs must be greater than zero")]
    ZeroSweepInterval,
    #[error("rate_limit.retention_secs must be greater than zero")]
    ZeroRetention,
    #[error("auth.lookup_timeout_ms must be greater than zero")]
    ZeroLookupTimeout,
    #[error("auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes, got {0}")]
    WeakJwtSecret(usize),
    #[error("auth.token_hash_cost must be between 4 and 31, got {0}")]
    InvalidHashCost(u32),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.default_limit == 0 {
        errors.push(ValidationError::ZeroDefaultLimit);
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if config.rate_limit.retention_secs == 0 {
        errors.push(ValidationError::ZeroRetention);
    }
    if config.auth.lookup_timeout_ms == 0 {
        errors.push(ValidationError::ZeroLookupTimeout);
    }

    if let Some(ref secret) = config.auth.jwt_secret
        && secret.len() < MIN_JWT_SECRET_LEN
    {
        errors.push(ValidationError::WeakJwtSecret(secret.len()));
    }

    let cost = config.auth.token_hash_cost;
    if !HASH_COST_RANGE.contains(&cost) {
        errors.push(ValidationError::InvalidHashCost(cost));
    }

    // Database path validation
    if let Some(ref db) = config.database
        && db.path != ":memory:"
    {
        let db_path = Path::new(&db.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

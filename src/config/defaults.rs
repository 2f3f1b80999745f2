//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "deskgate".to_string()
}

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

pub fn default_database_path() -> String {
    "deskgate.db".to_string()
}

// =============================================================================
// Auth Defaults
// =============================================================================

pub fn default_lookup_timeout_ms() -> u64 {
    5_000
}

pub fn default_token_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

// =============================================================================
// Rate Limit Defaults
// =============================================================================

/// Requests per window for credentials without their own ceiling.
pub fn default_rate_limit() -> u32 {
    1000
}

pub fn default_window_secs() -> u64 {
    3600
}

pub fn default_sweep_interval_secs() -> u64 {
    600
}

pub fn default_retention_secs() -> u64 {
    600
}

pub fn default_retry_after_secs() -> u64 {
    60
}

//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, DatabaseConfig, LoggingConfig)
//! - [`security`]: Credential and rate limiting configuration (AuthConfig, RateLimitConfig)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup validation

mod defaults;
mod security;
mod types;
pub mod validation;

pub use security::{AuthConfig, RateLimitConfig};
pub use types::{Config, ConfigError, DatabaseConfig, LogFormat, LoggingConfig, ServerConfig};
pub use validation::{ValidationError, validate};

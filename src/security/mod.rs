//! Admission control.
//!
//! - **Rate Limiting**: per-key token buckets with continuous refill, keyed by
//!   credential prefix for authenticated traffic and by source address for
//!   public routes.

pub mod rate_limit;

pub use rate_limit::{RateDecision, RateLimiter};

//! Prometheus metrics for authorization decisions.
//!
//! - `deskgate_auth_decisions_total{outcome}` - admitted vs rejected requests
//! - `deskgate_rejections_total{code}` - rejections by error code
//! - `deskgate_rate_limited_total` - requests refused by the rate limiter
//! - `deskgate_rate_limit_buckets` - live rate limit buckets
//! - `deskgate_authorization_duration_seconds` - time spent in the gateway
//!
//! Recording before [`init`] is a no-op, so unit tests never need a registry.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Authorization outcomes (`admitted`, `rejected`).
pub static AUTH_DECISIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Rejections by error code.
pub static REJECTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Requests refused by the rate limiter.
pub static RATE_LIMITED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

/// Live rate limit buckets.
pub static RATE_LIMIT_BUCKETS: OnceLock<IntGauge> = OnceLock::new();

/// Time from credential extraction to admission or rejection.
pub static AUTH_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Called once at startup. Repeated calls keep the first set of metrics.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(AUTH_DECISIONS, IntCounterVec::new(Opts::new("deskgate_auth_decisions_total", "Authorization decisions by outcome"), &["outcome"]));
    register!(REJECTIONS, IntCounterVec::new(Opts::new("deskgate_rejections_total", "Rejected requests by error code"), &["code"]));
    register!(RATE_LIMITED, IntCounter::new("deskgate_rate_limited_total", "Requests refused by the rate limiter"));
    register!(RATE_LIMIT_BUCKETS, IntGauge::new("deskgate_rate_limit_buckets", "Live rate limit buckets"));
    register!(AUTH_LATENCY, Histogram::with_opts(
        HistogramOpts::new("deskgate_authorization_duration_seconds", "Time spent authorizing a request")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

#[inline]
pub fn record_admitted(duration_secs: f64) {
    if let Some(c) = AUTH_DECISIONS.get() {
        c.with_label_values(&["admitted"]).inc();
    }
    if let Some(h) = AUTH_LATENCY.get() {
        h.observe(duration_secs);
    }
}

/// Record a rejected request under its error code.
#[inline]
pub fn record_rejection(code: &str) {
    if let Some(c) = AUTH_DECISIONS.get() {
        c.with_label_values(&["rejected"]).inc();
    }
    if let Some(c) = REJECTIONS.get() {
        c.with_label_values(&[code]).inc();
    }
}

#[inline]
pub fn record_rate_limited() {
    if let Some(c) = RATE_LIMITED.get() {
        c.inc();
    }
}

#[inline]
pub fn set_rate_limit_buckets(count: usize) {
    if let Some(g) = RATE_LIMIT_BUCKETS.get() {
        g.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

//! deskgated - helpdesk API authorization gateway.

use deskgate::config::{self, Config, LogFormat};
use deskgate::db::Database;
use deskgate::http::{self, AppState};
use deskgate::metrics;
use deskgate::security::RateLimiter;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path)
            .map_err(|e| anyhow::anyhow!("failed to load {config_path}: {e}"))?
    } else {
        Config::default()
    };

    init_tracing(config.logging.format);

    if !Path::new(&config_path).exists() {
        warn!(path = %config_path, "Config file not found, using defaults");
    }

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "refusing to start with {} configuration error(s)",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        "Starting deskgated"
    );
    if config.auth.jwt_secret.is_none() {
        warn!("auth.jwt_secret not set, session credentials will be answered with 503");
    }

    let db = Database::new(&config.database_path()).await?;

    metrics::init();

    let limiter = Arc::new(RateLimiter::new(config.rate_limit.window()));
    RateLimiter::spawn_sweeper(
        Arc::clone(&limiter),
        config.rate_limit.sweep_interval(),
        config.rate_limit.retention(),
    );

    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics endpoint disabled");
    } else {
        tokio::spawn(async move {
            http::run_metrics_server(metrics_port).await;
        });
    }

    let state = AppState::from_config(&config, db, limiter);
    http::serve(config.server.listen, http::build_router(state)).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

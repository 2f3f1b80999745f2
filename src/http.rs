//! Router composition and HTTP listeners.
//!
//! The API router puts [`authenticate`] in front of every `/api/v1` route
//! and attaches each route's [`RoutePolicy`]. `/health` is public and
//! limited per source address. Prometheus metrics are served on a separate
//! port.

use axum::routing::{delete, get, patch, post};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::{CredentialVerifier, JwtKeys, TokenService};
use crate::config::Config;
use crate::db::Database;
use crate::gateway::policy::{
    ADMIN, QUEUE_CREATE, QUEUE_READ, TICKET_DELETE, TICKET_NOTE, TICKET_PRIORITY, TICKET_READ,
    TICKET_UPDATE,
};
use crate::gateway::{
    Gateway, GatewaySettings, GuardedRoute, RoutePolicy, authenticate, limit_by_address,
};
use crate::handlers::{self, queues, scopes, tickets, tokens};
use crate::permissions::PermissionService;
use crate::scopes::{ScopeEvaluator, ScopeRegistry};
use crate::security::RateLimiter;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub db: Database,
    pub tokens: TokenService,
}

impl AppState {
    /// Wire the gateway and services from configuration.
    ///
    /// The limiter is passed in so the caller owns its sweeper.
    pub fn from_config(config: &Config, db: Database, limiter: Arc<RateLimiter>) -> Self {
        let registry = Arc::new(ScopeRegistry::new());
        let tokens =
            TokenService::new(db.clone(), Arc::clone(&registry), config.auth.token_hash_cost);
        let deadline = config.auth.lookup_timeout();

        let mut verifier =
            CredentialVerifier::new(deadline).with_token_store(Arc::new(tokens.clone()));
        if let Some(secret) = config.auth.jwt_secret.as_deref() {
            verifier = verifier.with_session_validator(Arc::new(JwtKeys::new(
                secret.as_bytes(),
                config.auth.jwt_issuer.as_deref(),
            )));
        }

        let gateway = Gateway::new(
            verifier,
            limiter,
            ScopeEvaluator::new(registry),
            PermissionService::new(Arc::new(db.clone()), deadline),
            GatewaySettings {
                default_limit: config.rate_limit.default_limit,
                retry_after_secs: config.rate_limit.retry_after_secs,
                trust_forwarded_for: config.auth.trust_forwarded_for,
            },
        );

        Self {
            gateway: Arc::new(gateway),
            db,
            tokens,
        }
    }
}

/// Build the public router.
pub fn build_router(state: AppState) -> Router {
    let gw = &state.gateway;
    let any = RoutePolicy::authenticated();

    let api = Router::new()
        .route("/whoami", get(scopes::whoami).guarded(gw, any))
        .route("/scopes", get(scopes::available).guarded(gw, any))
        .route("/tokens", get(tokens::list).guarded(gw, any))
        .route("/tokens", post(tokens::create).guarded(gw, any))
        .route("/tokens/:id", delete(tokens::revoke).guarded(gw, any))
        .route("/tickets/:id", get(tickets::show).guarded(gw, TICKET_READ))
        .route("/tickets/:id", patch(tickets::update).guarded(gw, TICKET_UPDATE))
        .route("/tickets/:id", delete(tickets::delete).guarded(gw, TICKET_DELETE))
        .route("/tickets/:id/articles", post(tickets::add_article).guarded(gw, TICKET_NOTE))
        .route("/tickets/:id/priority", patch(tickets::set_priority).guarded(gw, TICKET_PRIORITY))
        .route("/queues/:id", get(queues::show).guarded(gw, QUEUE_READ))
        .route("/queues/:id/tickets", post(queues::create_ticket).guarded(gw, QUEUE_CREATE))
        .route("/admin/scopes", get(scopes::all).guarded(gw, ADMIN))
        .route("/admin/tokens", get(tokens::list_all).guarded(gw, ADMIN))
        .route("/admin/tokens/:id", delete(tokens::revoke_any).guarded(gw, ADMIN))
        .route("/admin/users/:user_id/tokens", get(tokens::list_agent_tokens).guarded(gw, ADMIN))
        .route("/admin/users/:user_id/tokens", post(tokens::create_agent_token).guarded(gw, ADMIN))
        .route(
            "/admin/users/:user_id/tokens/:token_id",
            delete(tokens::revoke_agent_token).guarded(gw, ADMIN),
        )
        .route(
            "/admin/customer-users/:customer_id/tokens",
            get(tokens::list_customer_tokens).guarded(gw, ADMIN),
        )
        .route(
            "/admin/customer-users/:customer_id/tokens",
            post(tokens::create_customer_token).guarded(gw, ADMIN),
        )
        .route(
            "/admin/customer-users/:customer_id/tokens/:token_id",
            delete(tokens::revoke_customer_token).guarded(gw, ADMIN),
        )
        .route_layer(middleware::from_fn_with_state(Arc::clone(gw), authenticate));

    let public = Router::new()
        .route("/health", get(handlers::health))
        .route_layer(middleware::from_fn_with_state(Arc::clone(gw), limit_by_address));

    Router::new()
        .nest("/api/v1", api)
        .merge(public)
        .with_state(state)
}

/// Serve the API until the process stops.
pub async fn serve(listen: SocketAddr, router: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(%listen, "API listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

/// Serve `GET /metrics` on all interfaces until the process stops.
///
/// A bind failure is logged and ends the task; the API keeps running.
pub async fn run_metrics_server(port: u16) {
    let app = Router::new().route(
        "/metrics",
        get(|| async { crate::metrics::gather_metrics() }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "metrics listener bind failed");
            return;
        }
    };
    tracing::info!(%addr, "metrics listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(%addr, error = %e, "metrics server stopped");
    }
}

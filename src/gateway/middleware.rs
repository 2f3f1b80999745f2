//! axum middleware wiring the gateway in front of handlers.

use axum::RequestExt;
use axum::extract::{Path, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use http::HeaderValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::{Authenticated, Gateway, RoutePolicy, extract_credential, source_address};
use crate::auth::VerifyError;
use crate::error::ApiError;
use crate::security::RateDecision;

/// Verify the credential, apply the identity's rate limit, and attach the
/// identity to the request.
///
/// Every response past this point carries `X-RateLimit-Limit` and
/// `X-RateLimit-Remaining`.
pub async fn authenticate(
    State(gateway): State<Arc<Gateway>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let settings = gateway.settings();

    let raw = extract_credential(req.headers()).ok_or(ApiError::NoCredential)?;
    let source = source_address(req.headers(), req.extensions(), settings.trust_forwarded_for);

    let identity = gateway
        .verifier()
        .verify(&raw, source.as_deref())
        .await
        .map_err(|e| {
            match &e {
                VerifyError::Unavailable | VerifyError::Backend(_) | VerifyError::Timeout => {
                    warn!(error = %e, "credential verification unavailable");
                }
                _ => debug!(error = %e, source = ?source, "credential rejected"),
            }
            ApiError::from(e)
        })?;

    let key = format!("token:{}", identity.credential_prefix());
    let decision = gateway.limiter().check(&key, gateway.ceiling_for(&identity));
    if !decision.allowed {
        crate::metrics::record_rate_limited();
        return Err(rate_limited(decision, settings.retry_after_secs));
    }

    req.extensions_mut().insert(Authenticated {
        identity: Arc::new(identity),
        started,
    });

    let mut response = next.run(req).await;
    insert_rate_headers(&mut response, decision);
    Ok(response)
}

/// Admission control keyed by source address, for public routes.
pub async fn limit_by_address(
    State(gateway): State<Arc<Gateway>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let settings = gateway.settings();
    let source = source_address(req.headers(), req.extensions(), settings.trust_forwarded_for)
        .unwrap_or_else(|| "unknown".to_string());

    let decision = gateway
        .limiter()
        .check(&format!("ip:{source}"), settings.default_limit);
    if !decision.allowed {
        crate::metrics::record_rate_limited();
        return Err(rate_limited(decision, settings.retry_after_secs));
    }

    let mut response = next.run(req).await;
    insert_rate_headers(&mut response, decision);
    Ok(response)
}

/// Apply a route's policy to an authenticated request.
pub async fn guard_route(
    State((gateway, policy)): State<(Arc<Gateway>, RoutePolicy)>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<Authenticated>()
        .cloned()
        .ok_or(ApiError::NoCredential)?;

    let resource_id = match policy.resource {
        Some(guard) => Some(resource_id(&mut req, guard.param()).await?),
        None => None,
    };

    gateway
        .authorize(&auth.identity, &policy, resource_id)
        .await?;

    crate::metrics::record_admitted(auth.started.elapsed().as_secs_f64());
    Ok(next.run(req).await)
}

async fn resource_id(req: &mut Request, param: &str) -> Result<i64, ApiError> {
    let Path(params) = req
        .extract_parts::<Path<HashMap<String, String>>>()
        .await
        .map_err(|_| ApiError::InvalidId(param.to_string()))?;
    params
        .get(param)
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::InvalidId(param.to_string()))
}

fn rate_limited(decision: RateDecision, retry_after_secs: u64) -> ApiError {
    ApiError::RateLimited {
        limit: decision.limit,
        remaining: decision.remaining,
        retry_after_secs,
    }
}

fn insert_rate_headers(response: &mut Response, decision: RateDecision) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
}

/// Attach a [`RoutePolicy`] to a method router.
///
/// Only the methods already on the router are guarded, so give each method
/// its own router and merge them with repeated `Router::route` calls.
pub trait GuardedRoute {
    fn guarded(self, gateway: &Arc<Gateway>, policy: RoutePolicy) -> Self;
}

impl<S> GuardedRoute for MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn guarded(self, gateway: &Arc<Gateway>, policy: RoutePolicy) -> Self {
        self.route_layer(middleware::from_fn_with_state(
            (Arc::clone(gateway), policy),
            guard_route,
        ))
    }
}

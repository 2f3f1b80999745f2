//! HTTP handlers behind the gateway.
//!
//! Handlers assume authorization already happened: each takes
//! [`CurrentIdentity`](crate::gateway::CurrentIdentity) and trusts the route
//! policy that guarded it.

pub mod queues;
pub mod scopes;
pub mod tickets;
pub mod tokens;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;

use crate::error::ApiError;

/// Map a JSON body rejection into the common error shape.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

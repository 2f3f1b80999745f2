//! Identity and scope introspection.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::auth::{Identity, Role};
use crate::gateway::CurrentIdentity;
use crate::http::AppState;
use crate::scopes::ScopeDefinition;

/// `GET /api/v1/whoami`
pub async fn whoami(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(identity.as_ref().clone())
}

#[derive(Debug, Serialize)]
pub struct ScopeListing {
    pub scopes: Vec<ScopeDefinition>,
}

/// `GET /api/v1/scopes`: scopes the caller may put on a new token.
pub async fn available(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> Json<ScopeListing> {
    let scopes = state
        .gateway
        .scopes()
        .registry()
        .available_for(identity.role(), identity.is_customer());
    Json(ScopeListing { scopes })
}

/// `GET /api/v1/admin/scopes`: every registered scope.
pub async fn all(State(state): State<AppState>) -> Json<ScopeListing> {
    let scopes = state
        .gateway
        .scopes()
        .registry()
        .available_for(Role::Admin, false);
    Json(ScopeListing { scopes })
}

//! API token management for the calling principal, plus the administrative
//! routes that manage anyone's tokens.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use super::body;
use crate::auth::{IdentityKind, IssueRequest, IssuedToken, TokenRecord, TokenStatus};
use crate::error::ApiError;
use crate::gateway::CurrentIdentity;
use crate::http::AppState;

/// Token as listed back to its owner. Never includes secret material.
#[derive(Debug, Serialize)]
pub struct TokenSummary {
    pub id: i64,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<TokenRecord> for TokenSummary {
    fn from(record: TokenRecord) -> Self {
        let is_active = record.status_at(Utc::now()) == TokenStatus::Active;
        Self {
            id: record.id,
            name: record.name,
            prefix: record.prefix,
            scopes: record.scopes,
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
            created_at: record.created_at,
            revoked_at: record.revoked_at,
            is_active,
        }
    }
}

/// `POST /api/v1/tokens`
pub async fn create(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    let req = body(payload)?;
    let issued = state.tokens.issue(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// `GET /api/v1/tokens`
pub async fn list(
    State(state): State<AppState>,
    identity: CurrentIdentity,
) -> Result<Json<Vec<TokenSummary>>, ApiError> {
    let tokens = state.tokens.list(&identity).await?;
    Ok(Json(tokens.into_iter().map(TokenSummary::from).collect()))
}

/// `DELETE /api/v1/tokens/:id`
pub async fn revoke(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    state.tokens.revoke(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_id(raw: &str, field: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::InvalidId(field.to_string()))
}

// ============================================================================
// Administration
// ============================================================================

/// Token as listed to administrators, with its owner.
#[derive(Debug, Serialize)]
pub struct OwnedTokenSummary {
    pub owner_id: i64,
    pub owner_type: IdentityKind,
    #[serde(flatten)]
    pub token: TokenSummary,
}

impl From<TokenRecord> for OwnedTokenSummary {
    fn from(record: TokenRecord) -> Self {
        Self {
            owner_id: record.owner_id,
            owner_type: record.owner_kind,
            token: TokenSummary::from(record),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAllParams {
    #[serde(default)]
    pub include_revoked: bool,
}

#[derive(Debug, Serialize)]
pub struct AllTokens {
    pub tokens: Vec<OwnedTokenSummary>,
}

/// One account's tokens. Exactly one of the id fields is set.
#[derive(Debug, Serialize)]
pub struct AccountTokens {
    pub tokens: Vec<TokenSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
}

/// `GET /api/v1/admin/tokens?include_revoked=`
pub async fn list_all(
    State(state): State<AppState>,
    params: Result<Query<ListAllParams>, QueryRejection>,
) -> Result<Json<AllTokens>, ApiError> {
    let Query(params) = params.map_err(|r| ApiError::InvalidRequest(r.body_text()))?;
    let tokens = state.tokens.list_all(params.include_revoked).await?;
    Ok(Json(AllTokens {
        tokens: tokens.into_iter().map(OwnedTokenSummary::from).collect(),
    }))
}

/// `DELETE /api/v1/admin/tokens/:id`
pub async fn revoke_any(
    State(state): State<AppState>,
    identity: CurrentIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "id")?;
    state.tokens.revoke_any(id, identity.principal_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/admin/users/:user_id/tokens`
pub async fn list_agent_tokens(
    state: State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<AccountTokens>, ApiError> {
    list_account(state, &owner, IdentityKind::Agent).await
}

/// `GET /api/v1/admin/customer-users/:customer_id/tokens`
pub async fn list_customer_tokens(
    state: State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<AccountTokens>, ApiError> {
    list_account(state, &owner, IdentityKind::Customer).await
}

/// `POST /api/v1/admin/users/:user_id/tokens`
pub async fn create_agent_token(
    state: State<AppState>,
    Path(owner): Path<String>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    create_for_account(state, &owner, IdentityKind::Agent, payload).await
}

/// `POST /api/v1/admin/customer-users/:customer_id/tokens`
pub async fn create_customer_token(
    state: State<AppState>,
    Path(owner): Path<String>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    create_for_account(state, &owner, IdentityKind::Customer, payload).await
}

/// `DELETE /api/v1/admin/users/:user_id/tokens/:token_id`
pub async fn revoke_agent_token(
    state: State<AppState>,
    identity: CurrentIdentity,
    Path((owner, token)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    revoke_for_account(state, &identity, &owner, &token, IdentityKind::Agent).await
}

/// `DELETE /api/v1/admin/customer-users/:customer_id/tokens/:token_id`
pub async fn revoke_customer_token(
    state: State<AppState>,
    identity: CurrentIdentity,
    Path((owner, token)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    revoke_for_account(state, &identity, &owner, &token, IdentityKind::Customer).await
}

fn owner_field(kind: IdentityKind) -> &'static str {
    match kind {
        IdentityKind::Agent => "user_id",
        IdentityKind::Customer => "customer_id",
    }
}

async fn list_account(
    State(state): State<AppState>,
    owner: &str,
    kind: IdentityKind,
) -> Result<Json<AccountTokens>, ApiError> {
    let owner_id = parse_id(owner, owner_field(kind))?;
    let tokens = state.tokens.list_for(owner_id, kind).await?;
    let (user_id, customer_id) = match kind {
        IdentityKind::Agent => (Some(owner_id), None),
        IdentityKind::Customer => (None, Some(owner_id)),
    };
    Ok(Json(AccountTokens {
        tokens: tokens.into_iter().map(TokenSummary::from).collect(),
        user_id,
        customer_id,
    }))
}

async fn create_for_account(
    State(state): State<AppState>,
    owner: &str,
    kind: IdentityKind,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    let owner_id = parse_id(owner, owner_field(kind))?;
    let req = body(payload)?;
    let issued = state.tokens.issue_for(owner_id, kind, req).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

async fn revoke_for_account(
    State(state): State<AppState>,
    identity: &CurrentIdentity,
    owner: &str,
    token: &str,
    kind: IdentityKind,
) -> Result<StatusCode, ApiError> {
    let owner_id = parse_id(owner, owner_field(kind))?;
    let token_id = parse_id(token, "token_id")?;
    state
        .tokens
        .revoke_owned_by(owner_id, kind, token_id, identity.principal_id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

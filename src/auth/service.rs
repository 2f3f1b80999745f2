//! API token issuance, listing and revocation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::token::{self, DEFAULT_RATE_LIMIT, TokenError, TokenRecord};
use super::verifier::TokenStore;
use super::{Identity, IdentityKind, VerifyError};
use crate::db::{Database, DbError, NewToken, StoredToken};
use crate::scopes::ScopeRegistry;

/// Body of a token creation request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// `30d`, `90d`, `6m`, `1y` or `never`.
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Issuance result. `token` is the only copy of the secret.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub id: i64,
    pub token: String,
    pub prefix: String,
    pub name: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Owns the token lifecycle and serves as the verifier's token store.
#[derive(Clone)]
pub struct TokenService {
    db: Database,
    registry: Arc<ScopeRegistry>,
    hash_cost: u32,
}

impl TokenService {
    pub fn new(db: Database, registry: Arc<ScopeRegistry>, hash_cost: u32) -> Self {
        Self {
            db,
            registry,
            hash_cost,
        }
    }

    /// Issue a token for `owner`.
    pub async fn issue(
        &self,
        owner: &Identity,
        req: IssueRequest,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_token(owner.principal_id(), owner.kind(), req).await
    }

    /// Issue a token on behalf of another account.
    pub async fn issue_for(
        &self,
        owner_id: i64,
        kind: IdentityKind,
        req: IssueRequest,
    ) -> Result<IssuedToken, TokenError> {
        if !self.db.directory().principal_exists(owner_id, kind).await? {
            return Err(TokenError::UnknownOwner);
        }
        self.issue_token(owner_id, kind, req).await
    }

    async fn issue_token(
        &self,
        owner_id: i64,
        kind: IdentityKind,
        req: IssueRequest,
    ) -> Result<IssuedToken, TokenError> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(TokenError::MissingName);
        }
        for scope in &req.scopes {
            if !self.registry.is_valid(scope) {
                return Err(TokenError::InvalidScope(scope.clone()));
            }
            if kind == IdentityKind::Customer && scope.starts_with("admin:") {
                return Err(TokenError::InvalidScope(scope.clone()));
            }
        }
        let expires_at =
            token::parse_expiration(req.expires_in.as_deref().unwrap_or("never"), Utc::now())?;

        let generated = token::generate();
        let hash = hash_token(generated.raw.clone(), self.hash_cost).await?;

        let id = self
            .db
            .tokens()
            .insert(&NewToken {
                owner_id,
                owner_kind: kind,
                name: &name,
                prefix: &generated.prefix,
                token_hash: &hash,
                scopes: &req.scopes,
                rate_limit: DEFAULT_RATE_LIMIT,
                expires_at,
            })
            .await?;

        info!(
            token_id = id,
            owner = owner_id,
            kind = ?kind,
            prefix = %generated.prefix,
            "API token issued"
        );

        Ok(IssuedToken {
            id,
            token: generated.raw,
            prefix: generated.prefix,
            name,
            scopes: req.scopes,
            expires_at,
        })
    }

    /// Tokens owned by `owner`, newest first.
    pub async fn list(&self, owner: &Identity) -> Result<Vec<TokenRecord>, TokenError> {
        self.list_for(owner.principal_id(), owner.kind()).await
    }

    pub async fn list_for(
        &self,
        owner_id: i64,
        kind: IdentityKind,
    ) -> Result<Vec<TokenRecord>, TokenError> {
        Ok(self.db.tokens().list_for_owner(owner_id, kind).await?)
    }

    /// Every token in the store, newest first.
    pub async fn list_all(&self, include_revoked: bool) -> Result<Vec<TokenRecord>, TokenError> {
        Ok(self.db.tokens().list_all(include_revoked).await?)
    }

    /// Revoke one of `owner`'s tokens. Someone else's token is `NotFound`.
    pub async fn revoke(&self, owner: &Identity, token_id: i64) -> Result<(), TokenError> {
        let revoked = self
            .db
            .tokens()
            .revoke(token_id, owner.principal_id(), owner.kind(), Utc::now())
            .await?;
        if !revoked {
            return Err(TokenError::NotFound);
        }
        info!(token_id, owner = owner.principal_id(), "API token revoked");
        Ok(())
    }

    /// Revoke any live token. Unknown and already revoked tokens are
    /// `NotFound`.
    pub async fn revoke_any(&self, token_id: i64, admin_id: i64) -> Result<(), TokenError> {
        if !self.db.tokens().revoke_by_id(token_id, Utc::now()).await? {
            return Err(TokenError::NotFound);
        }
        info!(token_id, admin = admin_id, "API token revoked by administrator");
        Ok(())
    }

    /// Revoke a token after checking it belongs to the named account.
    pub async fn revoke_owned_by(
        &self,
        owner_id: i64,
        kind: IdentityKind,
        token_id: i64,
        admin_id: i64,
    ) -> Result<(), TokenError> {
        let record = self
            .db
            .tokens()
            .find_by_id(token_id)
            .await?
            .ok_or(TokenError::NotFound)?;
        if record.owner_id != owner_id || record.owner_kind != kind {
            return Err(TokenError::WrongOwner);
        }
        self.revoke_any(token_id, admin_id).await
    }
}

#[async_trait]
impl TokenStore for TokenService {
    async fn verify_token(&self, raw: &str) -> Result<TokenRecord, VerifyError> {
        let prefix = token::lookup_prefix(raw).ok_or(VerifyError::Malformed)?;
        let candidates = self
            .db
            .tokens()
            .find_by_prefix(prefix)
            .await
            .map_err(verify_db_error)?;
        if candidates.is_empty() {
            return Err(VerifyError::Invalid);
        }

        let raw = raw.to_string();
        tokio::task::spawn_blocking(move || match_candidate(&raw, candidates))
            .await
            .map_err(|e| VerifyError::Internal(e.to_string()))?
            .ok_or(VerifyError::Invalid)
    }

    async fn update_last_used(
        &self,
        token_id: i64,
        source: Option<String>,
    ) -> Result<(), VerifyError> {
        self.db
            .tokens()
            .touch(token_id, Utc::now(), source.as_deref())
            .await
            .map_err(verify_db_error)
    }
}

fn match_candidate(raw: &str, candidates: Vec<StoredToken>) -> Option<TokenRecord> {
    candidates
        .into_iter()
        .find(|c| bcrypt::verify(raw, &c.token_hash).unwrap_or(false))
        .map(|c| c.record)
}

async fn hash_token(raw: String, cost: u32) -> Result<String, TokenError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(raw, cost))
        .await
        .map_err(|e| TokenError::Hash(e.to_string()))?
        .map_err(|e| TokenError::Hash(e.to_string()))
}

fn verify_db_error(err: DbError) -> VerifyError {
    match err {
        DbError::Internal(detail) => VerifyError::Internal(detail),
        other => VerifyError::Backend(other.to_string()),
    }
}

//! Credential verification.
//!
//! Dispatches on credential shape: `gf_` tokens go to the opaque token store,
//! everything else is treated as a session JWT. Both paths produce the same
//! [`Identity`] or a [`VerifyError`] the gateway can branch on.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::jwt::ClaimsValidator;
use super::token::{self, TokenRecord, TokenStatus};
use super::{Identity, IdentityKind, VerifyError};
use crate::scopes::ScopeSet;

/// Backing store for opaque API tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Find the record whose hash matches `raw`.
    ///
    /// Returns the record regardless of expiry or revocation; the verifier
    /// classifies those. No match is [`VerifyError::Invalid`].
    async fn verify_token(&self, raw: &str) -> Result<TokenRecord, VerifyError>;

    /// Record a successful use.
    async fn update_last_used(&self, token_id: i64, source: Option<String>)
    -> Result<(), VerifyError>;
}

/// Turns raw credentials into identities.
#[derive(Clone)]
pub struct CredentialVerifier {
    tokens: Option<Arc<dyn TokenStore>>,
    sessions: Option<Arc<dyn ClaimsValidator>>,
    deadline: Duration,
}

impl CredentialVerifier {
    pub fn new(deadline: Duration) -> Self {
        Self {
            tokens: None,
            sessions: None,
            deadline,
        }
    }

    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }

    pub fn with_session_validator(mut self, validator: Arc<dyn ClaimsValidator>) -> Self {
        self.sessions = Some(validator);
        self
    }

    /// Verify a raw credential. `source` is the caller's address, recorded
    /// against API tokens on success.
    pub async fn verify(&self, raw: &str, source: Option<&str>) -> Result<Identity, VerifyError> {
        if raw.is_empty() {
            return Err(VerifyError::Malformed);
        }
        if token::is_api_token(raw) {
            self.verify_api_token(raw, source).await
        } else {
            self.verify_session(raw)
        }
    }

    async fn verify_api_token(
        &self,
        raw: &str,
        source: Option<&str>,
    ) -> Result<Identity, VerifyError> {
        if token::lookup_prefix(raw).is_none() {
            return Err(VerifyError::Malformed);
        }
        let store = self.tokens.as_ref().ok_or(VerifyError::Unavailable)?;

        let record = tokio::time::timeout(self.deadline, store.verify_token(raw))
            .await
            .map_err(|_| VerifyError::Timeout)??;

        match record.status_at(Utc::now()) {
            TokenStatus::Revoked => return Err(VerifyError::Revoked),
            TokenStatus::Expired => return Err(VerifyError::Expired),
            TokenStatus::Active => {}
        }

        let identity = identity_from_record(&record)?;

        // Last-used bookkeeping must never delay or fail the request.
        let store = Arc::clone(store);
        let token_id = record.id;
        let source = source.map(str::to_owned);
        tokio::spawn(async move {
            if let Err(e) = store.update_last_used(token_id, source).await {
                debug!(token_id, error = %e, "failed to record token use");
            }
        });

        Ok(identity)
    }

    fn verify_session(&self, raw: &str) -> Result<Identity, VerifyError> {
        let validator = self.sessions.as_ref().ok_or(VerifyError::Unavailable)?;
        validator.validate(raw)?.into_identity()
    }
}

fn identity_from_record(record: &TokenRecord) -> Result<Identity, VerifyError> {
    let scopes = ScopeSet::new(record.scopes.clone());
    let identity = match record.owner_kind {
        IdentityKind::Agent => {
            Identity::agent(record.owner_id, record.role, scopes, record.prefix.clone())
        }
        IdentityKind::Customer => {
            let Some(customer) = record.customer.clone() else {
                warn!(token_id = record.id, "token owner account no longer exists");
                return Err(VerifyError::Invalid);
            };
            Identity::customer(record.owner_id, customer, scopes, record.prefix.clone())
        }
    };
    Ok(identity
        .with_rate_limit(record.rate_limit)
        .with_token_id(record.id))
}

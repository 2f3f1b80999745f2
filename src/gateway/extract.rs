//! Request-scoped identity.

use axum::extract::FromRequestParts;
use http::request::Parts;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::Identity;
use crate::error::ApiError;

/// Request extension inserted once the credential is verified.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Arc<Identity>,
    /// When the gateway began processing the request.
    pub started: Instant,
}

/// Handler argument carrying the verified caller.
///
/// There is no fallback principal: a handler reached without the gateway
/// answers 401.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Arc<Identity>);

impl Deref for CurrentIdentity {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .map(|auth| Self(Arc::clone(&auth.identity)))
            .ok_or(ApiError::NoCredential)
    }
}

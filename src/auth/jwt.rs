//! Session JWT validation (HS256).

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{CustomerRef, Identity, Role, VerifyError};
use crate::scopes::ScopeSet;

/// Claims carried by session tokens issued by the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

impl SessionClaims {
    /// `user_id` wins over a numeric `sub`.
    pub fn principal_id(&self) -> Option<i64> {
        self.user_id
            .or_else(|| self.sub.as_deref().and_then(|s| s.parse().ok()))
    }

    /// Map claims into the common identity shape.
    ///
    /// Session identities hold every scope; resource checks still apply.
    pub fn into_identity(self) -> Result<Identity, VerifyError> {
        let principal = self.principal_id().ok_or(VerifyError::Invalid)?;
        let prefix = format!("jwt:{principal}");
        let is_customer = self
            .role
            .parse::<Role>()
            .is_ok_and(|role| role == Role::Customer);

        if is_customer {
            let login = self
                .customer_login
                .or(self.sub)
                .ok_or(VerifyError::Invalid)?;
            return Ok(Identity::customer(
                principal,
                CustomerRef {
                    login,
                    company_id: self.company_id,
                },
                ScopeSet::all(),
                prefix,
            ));
        }

        let role = if self.is_admin || self.role.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Agent
        };
        Ok(Identity::agent(principal, role, ScopeSet::all(), prefix))
    }
}

/// Validates signed session credentials.
pub trait ClaimsValidator: Send + Sync {
    fn validate(&self, raw: &str) -> Result<SessionClaims, VerifyError>;
}

/// HMAC key pair for session tokens.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &[u8], issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign claims. Used by the login flow and by tests.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String, VerifyError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| VerifyError::Internal(e.to_string()))
    }
}

impl ClaimsValidator for JwtKeys {
    fn validate(&self, raw: &str) -> Result<SessionClaims, VerifyError> {
        jsonwebtoken::decode::<SessionClaims>(raw, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => VerifyError::Malformed,
                _ => VerifyError::Invalid,
            })
    }
}

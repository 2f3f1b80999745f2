//! Caller authentication.
//!
//! - [`identity`]: the verified [`Identity`] attached to each request
//! - [`token`]: opaque `gf_` token format and lifecycle state
//! - [`jwt`]: session JWT validation
//! - [`verifier`]: [`CredentialVerifier`], dispatching on credential shape
//! - [`service`]: [`TokenService`], issuing tokens and backing the verifier

pub mod identity;
pub mod jwt;
pub mod service;
pub mod token;
pub mod verifier;

pub use identity::{CustomerRef, Identity, IdentityKind, Role};
pub use jwt::{ClaimsValidator, JwtKeys, SessionClaims};
pub use service::{IssueRequest, IssuedToken, TokenService};
pub use token::{TokenError, TokenRecord, TokenStatus};
pub use verifier::{CredentialVerifier, TokenStore};

use thiserror::Error;

/// Classified verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("malformed credential")]
    Malformed,
    #[error("credential expired")]
    Expired,
    #[error("credential revoked")]
    Revoked,
    #[error("credential not recognized")]
    Invalid,
    /// No backend configured for this credential shape.
    #[error("no verifier configured")]
    Unavailable,
    #[error("verifier backend error: {0}")]
    Backend(String),
    #[error("verifier lookup timed out")]
    Timeout,
    #[error("internal verifier error: {0}")]
    Internal(String),
}

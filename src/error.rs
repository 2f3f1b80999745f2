//! Unified error handling for deskgate.
//!
//! Every rejection the gateway produces is an [`ApiError`]. Each variant maps
//! to a namespaced code in a fixed registry, and the registry decides the
//! HTTP status and default message. Responses always use the same JSON shape:
//!
//! ```text
//! { "error": { "code": "core:forbidden", "message": "..." } }
//! ```

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{TokenError, VerifyError};
use crate::db::DbError;
use crate::permissions::PermissionError;
use crate::scopes::ScopeDenial;

// ============================================================================
// Error code registry
// ============================================================================

/// A registered API error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    /// Full namespaced code (e.g. `core:not_found`).
    pub code: &'static str,
    /// Default English message.
    pub message: &'static str,
    /// HTTP status sent with the code.
    pub status: u16,
}

pub const CODE_UNAUTHORIZED: &str = "core:unauthorized";
pub const CODE_FORBIDDEN: &str = "core:forbidden";
pub const CODE_INVALID_TOKEN: &str = "core:invalid_token";
pub const CODE_TOKEN_EXPIRED: &str = "core:token_expired";
pub const CODE_TOKEN_REVOKED: &str = "core:token_revoked";
pub const CODE_INVALID_REQUEST: &str = "core:invalid_request";
pub const CODE_INVALID_SCOPE: &str = "core:invalid_scope";
pub const CODE_INVALID_EXPIRATION: &str = "core:invalid_expiration";
pub const CODE_INVALID_ID: &str = "core:invalid_id";
pub const CODE_NOT_FOUND: &str = "core:not_found";
pub const CODE_RATE_LIMITED: &str = "core:rate_limited";
pub const CODE_INTERNAL_ERROR: &str = "core:internal_error";
pub const CODE_SERVICE_UNAVAILABLE: &str = "core:service_unavailable";

static CORE_ERRORS: &[ErrorCode] = &[
    ErrorCode { code: CODE_UNAUTHORIZED, message: "Authentication required", status: 401 },
    ErrorCode { code: CODE_FORBIDDEN, message: "Permission denied", status: 403 },
    ErrorCode { code: CODE_INVALID_TOKEN, message: "Invalid or malformed token", status: 401 },
    ErrorCode { code: CODE_TOKEN_EXPIRED, message: "Token has expired", status: 401 },
    ErrorCode { code: CODE_TOKEN_REVOKED, message: "Token has been revoked", status: 401 },
    ErrorCode { code: CODE_INVALID_REQUEST, message: "Invalid request body", status: 400 },
    ErrorCode { code: CODE_INVALID_SCOPE, message: "Invalid scope value", status: 400 },
    ErrorCode { code: CODE_INVALID_EXPIRATION, message: "Invalid expiration format", status: 400 },
    ErrorCode { code: CODE_INVALID_ID, message: "Invalid ID format", status: 400 },
    ErrorCode { code: CODE_NOT_FOUND, message: "Resource not found", status: 404 },
    ErrorCode { code: CODE_RATE_LIMITED, message: "Too many requests", status: 429 },
    ErrorCode { code: CODE_INTERNAL_ERROR, message: "Internal server error", status: 500 },
    ErrorCode { code: CODE_SERVICE_UNAVAILABLE, message: "Service temporarily unavailable", status: 503 },
];

/// All registered error codes.
pub fn registry() -> &'static [ErrorCode] {
    CORE_ERRORS
}

/// Look up a registered code.
pub fn lookup(code: &str) -> Option<&'static ErrorCode> {
    CORE_ERRORS.iter().find(|e| e.code == code)
}

/// HTTP status for a code, 500 if the code is unknown.
pub fn status_for(code: &str) -> StatusCode {
    lookup(code)
        .and_then(|e| StatusCode::from_u16(e.status).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// ============================================================================
// API errors (request rejection)
// ============================================================================

/// Errors that terminate request processing.
///
/// None of these are retried. Each one is rendered through the registry so
/// clients only ever see the fixed JSON shape.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no credential presented")]
    NoCredential,

    #[error("malformed credential")]
    MalformedCredential,

    #[error("token expired")]
    TokenExpired,

    #[error("token revoked")]
    TokenRevoked,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("verification backend unavailable")]
    BackendUnavailable,

    #[error("missing scope: {0}")]
    MissingScope(String),

    #[error("scope {scope} restricted (customer: {customer})")]
    RoleRestricted { scope: String, customer: bool },

    #[error("forbidden on resource")]
    ResourceForbidden,

    /// Denial reported as 404 so the resource's existence is not confirmed.
    #[error("resource hidden")]
    ResourceHidden,

    #[error("rate limited (limit {limit}, retry after {retry_after_secs}s)")]
    RateLimited {
        limit: u32,
        remaining: u32,
        retry_after_secs: u64,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),

    /// Detail is logged, never sent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Namespaced code for the response body and metrics labels.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoCredential => CODE_UNAUTHORIZED,
            Self::MalformedCredential | Self::InvalidCredential => CODE_INVALID_TOKEN,
            Self::TokenExpired => CODE_TOKEN_EXPIRED,
            Self::TokenRevoked => CODE_TOKEN_REVOKED,
            Self::BackendUnavailable => CODE_SERVICE_UNAVAILABLE,
            Self::MissingScope(_) | Self::RoleRestricted { .. } | Self::ResourceForbidden => {
                CODE_FORBIDDEN
            }
            Self::ResourceHidden => CODE_NOT_FOUND,
            Self::RateLimited { .. } => CODE_RATE_LIMITED,
            Self::InvalidRequest(_) => CODE_INVALID_REQUEST,
            Self::InvalidId(_) => CODE_INVALID_ID,
            Self::InvalidScope(_) => CODE_INVALID_SCOPE,
            Self::InvalidExpiration(_) => CODE_INVALID_EXPIRATION,
            Self::Internal(_) => CODE_INTERNAL_ERROR,
        }
    }

    /// HTTP status drawn from the registry.
    pub fn status(&self) -> StatusCode {
        status_for(self.error_code())
    }

    /// Client-visible message.
    ///
    /// Scope failures name the scope; everything else uses the registry text.
    pub fn client_message(&self) -> String {
        match self {
            Self::MissingScope(scope) => format!("Token missing required scope: {scope}"),
            Self::RoleRestricted { customer: true, .. } => {
                "This endpoint is not available to customers".to_string()
            }
            Self::RoleRestricted { scope, customer: false } => {
                format!("Insufficient role for scope: {scope}")
            }
            Self::InvalidScope(scope) => format!("Invalid scope value: {scope}"),
            Self::InvalidRequest(detail) => format!("Invalid request: {detail}"),
            other => lookup(other.error_code())
                .map(|e| e.message.to_string())
                .unwrap_or_else(|| "Internal server error".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.error_code();
        if let Self::Internal(detail) = &self {
            tracing::error!(detail = %detail, "internal error while handling request");
        }
        crate::metrics::record_rejection(code);

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.client_message(),
            },
        };
        let mut response = (self.status(), Json(body)).into_response();

        if let Self::RateLimited {
            limit,
            remaining,
            retry_after_secs,
        } = self
        {
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert(http::header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Malformed => Self::MalformedCredential,
            VerifyError::Expired => Self::TokenExpired,
            VerifyError::Revoked => Self::TokenRevoked,
            VerifyError::Invalid => Self::InvalidCredential,
            VerifyError::Unavailable | VerifyError::Backend(_) | VerifyError::Timeout => {
                Self::BackendUnavailable
            }
            VerifyError::Internal(detail) => Self::Internal(detail),
        }
    }
}

impl From<ScopeDenial> for ApiError {
    fn from(denial: ScopeDenial) -> Self {
        match denial {
            ScopeDenial::Missing(scope) => Self::MissingScope(scope),
            ScopeDenial::RoleRestricted { scope, customer } => {
                Self::RoleRestricted { scope, customer }
            }
        }
    }
}

impl From<PermissionError> for ApiError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Unavailable(detail) => {
                tracing::warn!(detail = %detail, "permission store unavailable");
                Self::BackendUnavailable
            }
            PermissionError::Timeout => {
                tracing::warn!("permission lookup exceeded deadline");
                Self::BackendUnavailable
            }
            PermissionError::Internal(detail) => Self::Internal(detail),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidScope(scope) => Self::InvalidScope(scope),
            TokenError::InvalidExpiration(value) => Self::InvalidExpiration(value),
            TokenError::MissingName => Self::InvalidRequest("name is required".to_string()),
            TokenError::NotFound | TokenError::UnknownOwner => Self::ResourceHidden,
            TokenError::WrongOwner => Self::ResourceForbidden,
            TokenError::Hash(detail) => Self::Internal(detail),
            TokenError::Db(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(_) => Self::ResourceHidden,
            DbError::Sqlx(sqlx::Error::PoolTimedOut) => {
                tracing::warn!("database pool exhausted");
                Self::BackendUnavailable
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_has_registered_code() {
        let errors = [
            ApiError::NoCredential,
            ApiError::MalformedCredential,
            ApiError::TokenExpired,
            ApiError::TokenRevoked,
            ApiError::InvalidCredential,
            ApiError::BackendUnavailable,
            ApiError::MissingScope("tickets:write".into()),
            ApiError::RoleRestricted { scope: "admin:*".into(), customer: true },
            ApiError::ResourceForbidden,
            ApiError::ResourceHidden,
            ApiError::RateLimited { limit: 1, remaining: 0, retry_after_secs: 60 },
            ApiError::InvalidRequest("x".into()),
            ApiError::InvalidId("x".into()),
            ApiError::InvalidScope("x".into()),
            ApiError::InvalidExpiration("x".into()),
            ApiError::Internal("x".into()),
        ];
        for err in errors {
            assert!(lookup(err.error_code()).is_some(), "{} not registered", err.error_code());
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NoCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::MissingScope("a".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::ResourceForbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::ResourceHidden.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::BackendUnavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::RateLimited { limit: 1, remaining: 0, retry_after_secs: 1 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_unknown_code_is_internal() {
        assert_eq!(status_for("plugin:nope"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_codes_are_namespaced() {
        for entry in registry() {
            assert!(entry.code.starts_with("core:"), "{}", entry.code);
        }
    }

    #[test]
    fn test_role_restricted_messages_differ() {
        let customer = ApiError::RoleRestricted { scope: "tickets:delete".into(), customer: true };
        let agent = ApiError::RoleRestricted { scope: "admin:*".into(), customer: false };
        assert_eq!(customer.client_message(), "This endpoint is not available to customers");
        assert_eq!(agent.client_message(), "Insufficient role for scope: admin:*");
        assert_eq!(
            ApiError::MissingScope("tickets:write".into()).client_message(),
            "Token missing required scope: tickets:write"
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = ApiError::Internal("sqlite: malformed scopes column".into());
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_rate_limited_response_headers() {
        let resp = ApiError::RateLimited { limit: 10, remaining: 0, retry_after_secs: 60 }
            .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()["x-ratelimit-limit"], "10");
        assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(resp.headers()["retry-after"], "60");
    }
}

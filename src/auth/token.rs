//! Opaque API token format and lifecycle state.
//!
//! Tokens look like `gf_<prefix>_<secret>`: 32 random bytes, hex encoded,
//! with the first 8 hex characters doubling as the lookup prefix. Only a
//! bcrypt hash of the full token is stored.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;

use super::{CustomerRef, IdentityKind, Role};
use crate::db::DbError;

/// Marker that routes a credential to the opaque token store.
pub const TOKEN_PREFIX: &str = "gf_";
/// Random bytes per token.
pub const TOKEN_RANDOM_BYTES: usize = 32;
/// Hex characters used as the lookup prefix.
pub const PREFIX_LEN: usize = 8;
/// Requests per window for newly issued tokens.
pub const DEFAULT_RATE_LIMIT: u32 = 1000;

/// Whether a credential uses the API token shape.
pub fn is_api_token(raw: &str) -> bool {
    raw.starts_with(TOKEN_PREFIX)
}

/// Extract the lookup prefix from a raw token.
///
/// Returns `None` when the body after `gf_` is too short to hold a prefix
/// and at least one secret character.
pub fn lookup_prefix(raw: &str) -> Option<&str> {
    let body = raw.strip_prefix(TOKEN_PREFIX)?;
    if body.len() <= PREFIX_LEN || !body.is_char_boundary(PREFIX_LEN) {
        return None;
    }
    Some(&body[..PREFIX_LEN])
}

/// A freshly minted token. The raw value is shown to the caller once.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    pub raw: String,
    pub prefix: String,
}

/// Mint a new random token.
pub fn generate() -> GeneratedToken {
    let mut bytes = [0u8; TOKEN_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let (prefix, secret) = hex.split_at(PREFIX_LEN);
    GeneratedToken {
        raw: format!("{TOKEN_PREFIX}{prefix}_{secret}"),
        prefix: prefix.to_string(),
    }
}

/// Parse an expiry option into an absolute timestamp.
///
/// Accepts a positive count with a `d`, `m` (30 days) or `y` (365 days)
/// suffix, case-insensitive and ignoring surrounding whitespace. `never` and
/// the empty string mean no expiry.
pub fn parse_expiration(
    value: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, TokenError> {
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized == "never" {
        return Ok(None);
    }
    let invalid = || TokenError::InvalidExpiration(value.to_string());

    let (count, unit_days) = [("d", 1), ("m", 30), ("y", 365)]
        .into_iter()
        .find_map(|(suffix, days)| normalized.strip_suffix(suffix).map(|count| (count, days)))
        .ok_or_else(invalid)?;
    let count: i64 = count.parse().map_err(|_| invalid())?;
    if count <= 0 {
        return Err(invalid());
    }
    let days = count.checked_mul(unit_days).ok_or_else(invalid)?;
    let lifetime = Duration::try_days(days).ok_or_else(invalid)?;
    now.checked_add_signed(lifetime).map(Some).ok_or_else(invalid)
}

/// Stored API token, as returned by the token store.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRecord {
    pub id: i64,
    pub owner_id: i64,
    pub owner_kind: IdentityKind,
    /// Role of the owner at lookup time.
    pub role: Role,
    /// Present for customer-owned tokens.
    pub customer: Option<CustomerRef>,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<String>,
    pub rate_limit: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_used_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a token at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Active,
    Expired,
    Revoked,
}

impl TokenRecord {
    /// Revocation wins over expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.revoked_at.is_some() {
            TokenStatus::Revoked
        } else if self.expires_at.is_some_and(|exp| exp <= now) {
            TokenStatus::Expired
        } else {
            TokenStatus::Active
        }
    }
}

/// Token management errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid scope: {0}")]
    InvalidScope(String),
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),
    #[error("token name is required")]
    MissingName,
    #[error("token not found")]
    NotFound,
    #[error("no such account")]
    UnknownOwner,
    #[error("token belongs to another account")]
    WrongOwner,
    #[error("hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

//! API token persistence.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;

use super::DbError;
use crate::auth::{CustomerRef, IdentityKind, Role, TokenRecord};

/// Token row plus its bcrypt hash, for verification only.
#[derive(Debug, Clone)]
pub struct StoredToken {
    pub record: TokenRecord,
    pub token_hash: String,
}

/// Insert parameters.
#[derive(Debug)]
pub struct NewToken<'a> {
    pub owner_id: i64,
    pub owner_kind: IdentityKind,
    pub name: &'a str,
    pub prefix: &'a str,
    pub token_hash: &'a str,
    pub scopes: &'a [String],
    pub rate_limit: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    user_id: i64,
    user_type: String,
    name: String,
    prefix: String,
    token_hash: String,
    scopes: String,
    rate_limit: Option<i64>,
    expires_at: Option<i64>,
    last_used_at: Option<i64>,
    last_used_ip: Option<String>,
    created_at: i64,
    revoked_at: Option<i64>,
    is_admin: Option<bool>,
    customer_login: Option<String>,
    company_id: Option<String>,
}

const SELECT_TOKEN: &str = r#"
    SELECT t.id, t.user_id, t.user_type, t.name, t.prefix, t.token_hash, t.scopes,
           t.rate_limit, t.expires_at, t.last_used_at, t.last_used_ip, t.created_at,
           t.revoked_at, a.is_admin, c.login AS customer_login, c.customer_id AS company_id
    FROM api_tokens t
    LEFT JOIN agents a ON t.user_type = 'agent' AND a.id = t.user_id
    LEFT JOIN customer_users c ON t.user_type = 'customer' AND c.id = t.user_id
"#;

/// Excludes tokens whose agent or customer row no longer exists.
const OWNER_PRESENT: &str = "(a.id IS NOT NULL OR c.id IS NOT NULL)";

/// Repository for API tokens.
pub struct TokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TokenRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, token: &NewToken<'_>) -> Result<i64, DbError> {
        let scopes = serde_json::to_string(token.scopes)
            .map_err(|e| DbError::Internal(e.to_string()))?;
        let result = sqlx::query(
            r#"
            INSERT INTO api_tokens
                (user_id, user_type, name, prefix, token_hash, scopes, rate_limit, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(token.owner_id)
        .bind(kind_str(token.owner_kind))
        .bind(token.name)
        .bind(token.prefix)
        .bind(token.token_hash)
        .bind(scopes)
        .bind(i64::from(token.rate_limit))
        .bind(token.expires_at.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// All tokens sharing a lookup prefix, revoked and expired included.
    ///
    /// Tokens of deleted principals are never candidates.
    pub async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<StoredToken>, DbError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "{SELECT_TOKEN} WHERE t.prefix = ? AND {OWNER_PRESENT}"
        ))
        .bind(prefix)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TokenRow::into_stored).collect()
    }

    pub async fn find_by_id(&self, token_id: i64) -> Result<Option<TokenRecord>, DbError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!("{SELECT_TOKEN} WHERE t.id = ?"))
            .bind(token_id)
            .fetch_optional(self.pool)
            .await?;
        row.map(|r| r.into_stored().map(|s| s.record)).transpose()
    }

    /// Every token in the store, newest first.
    pub async fn list_all(&self, include_revoked: bool) -> Result<Vec<TokenRecord>, DbError> {
        let filter = if include_revoked {
            ""
        } else {
            "WHERE t.revoked_at IS NULL"
        };
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "{SELECT_TOKEN} {filter} ORDER BY t.created_at DESC, t.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter()
            .map(|row| row.into_stored().map(|s| s.record))
            .collect()
    }

    pub async fn list_for_owner(
        &self,
        owner_id: i64,
        kind: IdentityKind,
    ) -> Result<Vec<TokenRecord>, DbError> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "{SELECT_TOKEN} WHERE t.user_id = ? AND t.user_type = ? ORDER BY t.created_at DESC, t.id DESC"
        ))
        .bind(owner_id)
        .bind(kind_str(kind))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter()
            .map(|row| row.into_stored().map(|s| s.record))
            .collect()
    }

    /// Revoke a token owned by the given principal.
    ///
    /// Returns false when no such token belongs to the owner. Revoking an
    /// already revoked token keeps the original timestamp.
    pub async fn revoke(
        &self,
        token_id: i64,
        owner_id: i64,
        kind: IdentityKind,
        at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE api_tokens SET revoked_at = COALESCE(revoked_at, ?)
            WHERE id = ? AND user_id = ? AND user_type = ?
            "#,
        )
        .bind(at.timestamp())
        .bind(token_id)
        .bind(owner_id)
        .bind(kind_str(kind))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke any token that is still live. Returns false when the token
    /// does not exist or was already revoked.
    pub async fn revoke_by_id(&self, token_id: i64, at: DateTime<Utc>) -> Result<bool, DbError> {
        let result =
            sqlx::query("UPDATE api_tokens SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
                .bind(at.timestamp())
                .bind(token_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a successful use.
    pub async fn touch(
        &self,
        token_id: i64,
        at: DateTime<Utc>,
        source: Option<&str>,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE api_tokens SET last_used_at = ?, last_used_ip = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(source)
            .bind(token_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

fn kind_str(kind: IdentityKind) -> &'static str {
    match kind {
        IdentityKind::Agent => "agent",
        IdentityKind::Customer => "customer",
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, DbError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DbError::Internal(format!("timestamp out of range: {secs}")))
}

fn opt_timestamp(secs: Option<i64>) -> Result<Option<DateTime<Utc>>, DbError> {
    secs.map(timestamp).transpose()
}

impl TokenRow {
    fn into_stored(self) -> Result<StoredToken, DbError> {
        let scopes: Vec<String> = serde_json::from_str(&self.scopes).map_err(|e| {
            DbError::Internal(format!("token {} has malformed scopes: {e}", self.id))
        })?;

        let (owner_kind, role, customer) = match self.user_type.as_str() {
            "agent" => {
                let role = if self.is_admin.unwrap_or(false) {
                    Role::Admin
                } else {
                    Role::Agent
                };
                (IdentityKind::Agent, role, None)
            }
            "customer" => {
                let customer = self.customer_login.map(|login| CustomerRef {
                    login,
                    company_id: self.company_id,
                });
                (IdentityKind::Customer, Role::Customer, customer)
            }
            other => {
                return Err(DbError::Internal(format!(
                    "token {} has unknown owner type {other}",
                    self.id
                )));
            }
        };

        let rate_limit = self
            .rate_limit
            .map(|l| u32::try_from(l).unwrap_or(0))
            .filter(|&l| l > 0);

        Ok(StoredToken {
            record: TokenRecord {
                id: self.id,
                owner_id: self.user_id,
                owner_kind,
                role,
                customer,
                name: self.name,
                prefix: self.prefix,
                scopes,
                rate_limit,
                expires_at: opt_timestamp(self.expires_at)?,
                last_used_at: opt_timestamp(self.last_used_at)?,
                last_used_ip: self.last_used_ip,
                created_at: timestamp(self.created_at)?,
                revoked_at: opt_timestamp(self.revoked_at)?,
            },
            token_hash: self.token_hash,
        })
    }
}

//! Group grants and their queue-level resolution.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::warn;

use super::{Database, DbError};
use crate::permissions::{
    GrantSet, PermissionError, PermissionKind, PermissionStore, TicketLocation,
};

/// Repository for group grants.
pub struct GrantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GrantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Grant a kind to an agent on a group. Re-granting is a no-op.
    pub async fn grant_agent(
        &self,
        agent_id: i64,
        group_id: i64,
        kind: PermissionKind,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT OR IGNORE INTO group_user (user_id, group_id, permission_key) VALUES (?, ?, ?)",
        )
        .bind(agent_id)
        .bind(group_id)
        .bind(kind.as_str())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn revoke_agent(
        &self,
        agent_id: i64,
        group_id: i64,
        kind: PermissionKind,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "DELETE FROM group_user WHERE user_id = ? AND group_id = ? AND permission_key = ?",
        )
        .bind(agent_id)
        .bind(group_id)
        .bind(kind.as_str())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Company-wide grant for every member of a customer company.
    pub async fn grant_company(
        &self,
        company_id: &str,
        group_id: i64,
        kind: PermissionKind,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT OR IGNORE INTO group_customer (customer_id, group_id, permission_key) VALUES (?, ?, ?)",
        )
        .bind(company_id)
        .bind(group_id)
        .bind(kind.as_str())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Grant for a single customer user.
    pub async fn grant_customer(
        &self,
        login: &str,
        group_id: i64,
        kind: PermissionKind,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT OR IGNORE INTO group_customer_user (user_login, group_id, permission_key) VALUES (?, ?, ?)",
        )
        .bind(login)
        .bind(group_id)
        .bind(kind.as_str())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn ticket_location(&self, ticket_id: i64) -> Result<Option<TicketLocation>, DbError> {
        let row = sqlx::query_as::<_, (i64, Option<String>)>(
            "SELECT queue_id, customer_id FROM tickets WHERE id = ?",
        )
        .bind(ticket_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(queue_id, customer_id)| TicketLocation {
            queue_id,
            customer_id,
        }))
    }

    pub async fn agent_queue_grants(
        &self,
        agent_id: i64,
        queue_id: i64,
    ) -> Result<GrantSet, DbError> {
        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT gu.permission_key FROM group_user gu
            JOIN queues q ON q.group_id = gu.group_id
            WHERE gu.user_id = ? AND q.id = ?
            "#,
        )
        .bind(agent_id)
        .bind(queue_id)
        .fetch_all(self.pool)
        .await?;
        Ok(collect_grants(keys))
    }

    pub async fn company_queue_grants(
        &self,
        company_id: &str,
        queue_id: i64,
    ) -> Result<GrantSet, DbError> {
        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT gc.permission_key FROM group_customer gc
            JOIN queues q ON q.group_id = gc.group_id
            WHERE gc.customer_id = ? AND q.id = ?
            "#,
        )
        .bind(company_id)
        .bind(queue_id)
        .fetch_all(self.pool)
        .await?;
        Ok(collect_grants(keys))
    }

    pub async fn customer_queue_grants(
        &self,
        login: &str,
        queue_id: i64,
    ) -> Result<GrantSet, DbError> {
        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT gcu.permission_key FROM group_customer_user gcu
            JOIN queues q ON q.group_id = gcu.group_id
            WHERE gcu.user_login = ? AND q.id = ?
            "#,
        )
        .bind(login)
        .bind(queue_id)
        .fetch_all(self.pool)
        .await?;
        Ok(collect_grants(keys))
    }
}

/// Unknown keys grant nothing.
fn collect_grants(keys: Vec<String>) -> GrantSet {
    keys.iter()
        .filter_map(|key| match key.parse::<PermissionKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unknown permission key");
                None
            }
        })
        .collect()
}

fn permission_error(err: DbError) -> PermissionError {
    match err {
        DbError::Internal(detail) => PermissionError::Internal(detail),
        other => PermissionError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl PermissionStore for Database {
    async fn ticket_location(
        &self,
        ticket_id: i64,
    ) -> Result<Option<TicketLocation>, PermissionError> {
        self.grants()
            .ticket_location(ticket_id)
            .await
            .map_err(permission_error)
    }

    async fn agent_queue_grants(
        &self,
        agent_id: i64,
        queue_id: i64,
    ) -> Result<GrantSet, PermissionError> {
        self.grants()
            .agent_queue_grants(agent_id, queue_id)
            .await
            .map_err(permission_error)
    }

    async fn company_queue_grants(
        &self,
        company_id: &str,
        queue_id: i64,
    ) -> Result<GrantSet, PermissionError> {
        self.grants()
            .company_queue_grants(company_id, queue_id)
            .await
            .map_err(permission_error)
    }

    async fn customer_queue_grants(
        &self,
        login: &str,
        queue_id: i64,
    ) -> Result<GrantSet, PermissionError> {
        self.grants()
            .customer_queue_grants(login, queue_id)
            .await
            .map_err(permission_error)
    }
}

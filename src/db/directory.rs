//! Principals, groups and queues.

use serde::Serialize;
use sqlx::SqlitePool;

use super::DbError;
use crate::auth::IdentityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Queue {
    pub id: i64,
    pub name: String,
    pub group_id: i64,
}

/// Repository for the entities grants refer to.
pub struct DirectoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DirectoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_agent(&self, login: &str, is_admin: bool) -> Result<i64, DbError> {
        let result = sqlx::query("INSERT INTO agents (login, is_admin) VALUES (?, ?)")
            .bind(login)
            .bind(is_admin)
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn create_company(&self, customer_id: &str, name: &str) -> Result<(), DbError> {
        sqlx::query("INSERT INTO customer_companies (customer_id, name) VALUES (?, ?)")
            .bind(customer_id)
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_customer(
        &self,
        login: &str,
        company_id: Option<&str>,
    ) -> Result<i64, DbError> {
        let result = sqlx::query("INSERT INTO customer_users (login, customer_id) VALUES (?, ?)")
            .bind(login)
            .bind(company_id)
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn create_group(&self, name: &str) -> Result<i64, DbError> {
        let result = sqlx::query("INSERT INTO groups (name) VALUES (?)")
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn create_queue(&self, name: &str, group_id: i64) -> Result<i64, DbError> {
        let result = sqlx::query("INSERT INTO queues (name, group_id) VALUES (?, ?)")
            .bind(name)
            .bind(group_id)
            .execute(self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn find_queue(&self, id: i64) -> Result<Option<Queue>, DbError> {
        let row = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT id, name, group_id FROM queues WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(id, name, group_id)| Queue { id, name, group_id }))
    }

    /// Whether an agent or customer account with this id exists.
    pub async fn principal_exists(&self, id: i64, kind: IdentityKind) -> Result<bool, DbError> {
        let sql = match kind {
            IdentityKind::Agent => "SELECT EXISTS(SELECT 1 FROM agents WHERE id = ?)",
            IdentityKind::Customer => "SELECT EXISTS(SELECT 1 FROM customer_users WHERE id = ?)",
        };
        let exists: bool = sqlx::query_scalar(sql).bind(id).fetch_one(self.pool).await?;
        Ok(exists)
    }
}

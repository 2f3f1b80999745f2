//! Ticket and article persistence.

use serde::Serialize;
use sqlx::SqlitePool;

use super::DbError;

/// A stored ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub queue_id: i64,
    pub customer_id: Option<String>,
    pub title: String,
    pub priority: i64,
    pub created_at: i64,
    pub changed_at: i64,
}

type TicketRow = (i64, i64, Option<String>, String, i64, i64, i64);

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        let (id, queue_id, customer_id, title, priority, created_at, changed_at) = row;
        Self {
            id,
            queue_id,
            customer_id,
            title,
            priority,
            created_at,
            changed_at,
        }
    }
}

/// Repository for tickets.
pub struct TicketRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TicketRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        queue_id: i64,
        customer_id: Option<&str>,
        title: &str,
        priority: i64,
    ) -> Result<Ticket, DbError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO tickets (queue_id, customer_id, title, priority, created_at, changed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(queue_id)
        .bind(customer_id)
        .bind(title)
        .bind(priority)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(Ticket {
            id: result.last_insert_rowid(),
            queue_id,
            customer_id: customer_id.map(str::to_owned),
            title: title.to_string(),
            priority,
            created_at: now,
            changed_at: now,
        })
    }

    pub async fn find(&self, id: i64) -> Result<Option<Ticket>, DbError> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, queue_id, customer_id, title, priority, created_at, changed_at
            FROM tickets WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Ticket::from))
    }

    /// Fetch a ticket that is known to exist.
    pub async fn get(&self, id: i64) -> Result<Ticket, DbError> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("ticket {id}")))
    }

    pub async fn set_title(&self, id: i64, title: &str) -> Result<Ticket, DbError> {
        sqlx::query("UPDATE tickets SET title = ?, changed_at = ? WHERE id = ?")
            .bind(title)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(self.pool)
            .await?;
        self.get(id).await
    }

    pub async fn set_priority(&self, id: i64, priority: i64) -> Result<Ticket, DbError> {
        sqlx::query("UPDATE tickets SET priority = ?, changed_at = ? WHERE id = ?")
            .bind(priority)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(self.pool)
            .await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_article(
        &self,
        ticket_id: i64,
        author_kind: &str,
        author_id: i64,
        body: &str,
        is_internal: bool,
    ) -> Result<i64, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (ticket_id, author_kind, author_id, body, is_internal, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ticket_id)
        .bind(author_kind)
        .bind(author_id)
        .bind(body)
        .bind(is_internal)
        .bind(chrono::Utc::now().timestamp())
        .execute(self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn count_articles(&self, ticket_id: i64) -> Result<i64, DbError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE ticket_id = ?")
            .bind(ticket_id)
            .fetch_one(self.pool)
            .await?)
    }
}

//! Composable permission queries with a lookup deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{GrantSet, PermissionError, PermissionKind, PermissionStore, TicketLocation};

/// Answers "may this principal do X to resource Y" by composing store reads.
///
/// Every call re-reads current grants. Each store call is bounded by the
/// configured deadline and a miss surfaces as [`PermissionError::Timeout`].
#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
    deadline: Duration,
}

impl PermissionService {
    pub fn new(store: Arc<dyn PermissionStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, PermissionError>>,
    ) -> Result<T, PermissionError> {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| PermissionError::Timeout)?
    }

    pub async fn ticket_location(
        &self,
        ticket_id: i64,
    ) -> Result<Option<TicketLocation>, PermissionError> {
        self.bounded(self.store.ticket_location(ticket_id)).await
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Effective grants an agent holds on a queue.
    pub async fn agent_grants(
        &self,
        agent_id: i64,
        queue_id: i64,
    ) -> Result<GrantSet, PermissionError> {
        self.bounded(self.store.agent_queue_grants(agent_id, queue_id))
            .await
    }

    /// Effective grants on the ticket's queue, `None` if the ticket is unknown.
    pub async fn agent_ticket_grants(
        &self,
        agent_id: i64,
        ticket_id: i64,
    ) -> Result<Option<GrantSet>, PermissionError> {
        let Some(location) = self.ticket_location(ticket_id).await? else {
            return Ok(None);
        };
        let grants = self.agent_grants(agent_id, location.queue_id).await?;
        debug!(agent_id, ticket_id, queue_id = location.queue_id, ?grants, "agent ticket grants");
        Ok(Some(grants))
    }

    async fn agent_queue_allows(
        &self,
        agent_id: i64,
        queue_id: i64,
        kind: PermissionKind,
    ) -> Result<bool, PermissionError> {
        Ok(self.agent_grants(agent_id, queue_id).await?.allows(kind))
    }

    async fn agent_ticket_allows(
        &self,
        agent_id: i64,
        ticket_id: i64,
        kind: PermissionKind,
    ) -> Result<bool, PermissionError> {
        Ok(self
            .agent_ticket_grants(agent_id, ticket_id)
            .await?
            .is_some_and(|grants| grants.allows(kind)))
    }

    /// `ro` or `rw` on the queue's group.
    pub async fn can_read_queue(
        &self,
        agent_id: i64,
        queue_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_queue_allows(agent_id, queue_id, PermissionKind::Ro)
            .await
    }

    /// `rw` on the queue's group.
    pub async fn can_write_queue(
        &self,
        agent_id: i64,
        queue_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_queue_allows(agent_id, queue_id, PermissionKind::Rw)
            .await
    }

    pub async fn can_create(&self, agent_id: i64, queue_id: i64) -> Result<bool, PermissionError> {
        self.agent_queue_allows(agent_id, queue_id, PermissionKind::Create)
            .await
    }

    pub async fn can_move_into(
        &self,
        agent_id: i64,
        queue_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_queue_allows(agent_id, queue_id, PermissionKind::MoveInto)
            .await
    }

    pub async fn can_be_owner(
        &self,
        agent_id: i64,
        queue_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_queue_allows(agent_id, queue_id, PermissionKind::Owner)
            .await
    }

    pub async fn can_read_ticket(
        &self,
        agent_id: i64,
        ticket_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_ticket_allows(agent_id, ticket_id, PermissionKind::Ro)
            .await
    }

    pub async fn can_write_ticket(
        &self,
        agent_id: i64,
        ticket_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_ticket_allows(agent_id, ticket_id, PermissionKind::Rw)
            .await
    }

    pub async fn can_add_note(
        &self,
        agent_id: i64,
        ticket_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_ticket_allows(agent_id, ticket_id, PermissionKind::Note)
            .await
    }

    pub async fn can_change_priority(
        &self,
        agent_id: i64,
        ticket_id: i64,
    ) -> Result<bool, PermissionError> {
        self.agent_ticket_allows(agent_id, ticket_id, PermissionKind::Priority)
            .await
    }

    // ------------------------------------------------------------------
    // Customers
    // ------------------------------------------------------------------

    /// Company-wide grant (`ro` or `rw`) on the queue's group.
    pub async fn customer_company_can_access_queue(
        &self,
        company_id: &str,
        queue_id: i64,
    ) -> Result<bool, PermissionError> {
        Ok(self
            .bounded(self.store.company_queue_grants(company_id, queue_id))
            .await?
            .can_read())
    }

    /// Individual grant (`ro` or `rw`) on the queue's group.
    pub async fn customer_can_access_queue(
        &self,
        login: &str,
        queue_id: i64,
    ) -> Result<bool, PermissionError> {
        Ok(self
            .bounded(self.store.customer_queue_grants(login, queue_id))
            .await?
            .can_read())
    }

    /// Company grant, falling back to the individual grant.
    pub async fn customer_queue_access(
        &self,
        login: &str,
        company_id: Option<&str>,
        queue_id: i64,
    ) -> Result<bool, PermissionError> {
        if let Some(company) = company_id
            && self.customer_company_can_access_queue(company, queue_id).await?
        {
            return Ok(true);
        }
        self.customer_can_access_queue(login, queue_id).await
    }

    /// Ownership by the customer's company, else a company or individual
    /// grant on the ticket's queue. Unknown tickets are never accessible.
    pub async fn customer_can_access_ticket(
        &self,
        login: &str,
        company_id: Option<&str>,
        ticket_id: i64,
    ) -> Result<bool, PermissionError> {
        let Some(location) = self.ticket_location(ticket_id).await? else {
            return Ok(false);
        };

        if let (Some(owner), Some(company)) = (location.customer_id.as_deref(), company_id)
            && owner == company
        {
            return Ok(true);
        }

        self.customer_queue_access(login, company_id, location.queue_id)
            .await
    }
}

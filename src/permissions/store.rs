//! Read-only view of groups, queues and grants.

use async_trait::async_trait;

use super::{GrantSet, PermissionError};

/// Where a ticket lives and who owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketLocation {
    pub queue_id: i64,
    /// Owning customer company.
    pub customer_id: Option<String>,
}

/// Queries the permission service composes.
///
/// Every method resolves the queue's owning group itself; an unknown queue
/// yields an empty set.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn ticket_location(&self, ticket_id: i64)
    -> Result<Option<TicketLocation>, PermissionError>;

    /// Union of the agent's grants on the queue's group.
    async fn agent_queue_grants(&self, agent_id: i64, queue_id: i64)
    -> Result<GrantSet, PermissionError>;

    /// Company-wide customer grants on the queue's group.
    async fn company_queue_grants(
        &self,
        company_id: &str,
        queue_id: i64,
    ) -> Result<GrantSet, PermissionError>;

    /// Individual customer grants on the queue's group.
    async fn customer_queue_grants(
        &self,
        login: &str,
        queue_id: i64,
    ) -> Result<GrantSet, PermissionError>;
}

//! Resource-level permissions.
//!
//! Agents hold grants per (group, kind); a queue belongs to one group, so an
//! agent's permission on a queue is the union of their grants on its group.
//! Customers reach a ticket through company ownership, a company grant on
//! the ticket's queue group, or an individual grant.
//!
//! `rw` implies every other kind. No other kind implies anything.

mod kind;
mod service;
mod store;

pub use kind::{GrantSet, PermissionKind};
pub use service::PermissionService;
pub use store::{PermissionStore, TicketLocation};

use thiserror::Error;

/// Failure to answer a permission question.
///
/// Never treated as "allowed": the gateway turns these into 503 or 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("permission store unavailable: {0}")]
    Unavailable(String),
    #[error("permission lookup timed out")]
    Timeout,
    #[error("permission data invalid: {0}")]
    Internal(String),
}

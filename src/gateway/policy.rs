//! Per-route authorization policies.

use crate::permissions::PermissionKind;
use crate::scopes;

/// What to report when a resource check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Always 404: the caller learns nothing about the resource.
    Hide,
    /// 403 when the caller can read the resource, 404 otherwise.
    RevealIfReadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketAccess {
    Read,
    Write,
    Note,
    Priority,
}

impl TicketAccess {
    /// Agent permission kind required.
    pub fn required_kind(self) -> PermissionKind {
        match self {
            Self::Read => PermissionKind::Ro,
            Self::Write => PermissionKind::Rw,
            Self::Note => PermissionKind::Note,
            Self::Priority => PermissionKind::Priority,
        }
    }

    /// Customers with access to a ticket may read, update and reply to it.
    pub fn customer_may(self) -> bool {
        !matches!(self, Self::Priority)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAccess {
    Read,
    Create,
    MoveInto,
    Owner,
}

impl QueueAccess {
    pub fn required_kind(self) -> PermissionKind {
        match self {
            Self::Read => PermissionKind::Ro,
            Self::Create => PermissionKind::Create,
            Self::MoveInto => PermissionKind::MoveInto,
            Self::Owner => PermissionKind::Owner,
        }
    }

    pub fn customer_may(self) -> bool {
        matches!(self, Self::Read | Self::Create)
    }
}

/// Resource check attached to a route. `param` names the path segment that
/// carries the numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceGuard {
    Ticket {
        param: &'static str,
        access: TicketAccess,
        denial: Denial,
    },
    Queue {
        param: &'static str,
        access: QueueAccess,
        denial: Denial,
    },
}

impl ResourceGuard {
    pub fn param(&self) -> &'static str {
        match self {
            Self::Ticket { param, .. } | Self::Queue { param, .. } => param,
        }
    }
}

/// Scope and resource requirements of one route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    pub scope: Option<&'static str>,
    pub resource: Option<ResourceGuard>,
}

impl RoutePolicy {
    /// Any authenticated caller.
    pub const fn authenticated() -> Self {
        Self {
            scope: None,
            resource: None,
        }
    }

    pub const fn scope(scope: &'static str) -> Self {
        Self {
            scope: Some(scope),
            resource: None,
        }
    }

    pub const fn ticket(mut self, access: TicketAccess, denial: Denial) -> Self {
        self.resource = Some(ResourceGuard::Ticket {
            param: "id",
            access,
            denial,
        });
        self
    }

    pub const fn queue(mut self, access: QueueAccess, denial: Denial) -> Self {
        self.resource = Some(ResourceGuard::Queue {
            param: "id",
            access,
            denial,
        });
        self
    }
}

// Route policies for the ticket API.
pub const TICKET_READ: RoutePolicy =
    RoutePolicy::scope(scopes::TICKETS_READ).ticket(TicketAccess::Read, Denial::Hide);
pub const TICKET_UPDATE: RoutePolicy = RoutePolicy::scope(scopes::TICKETS_WRITE)
    .ticket(TicketAccess::Write, Denial::RevealIfReadable);
pub const TICKET_DELETE: RoutePolicy =
    RoutePolicy::scope(scopes::TICKETS_DELETE).ticket(TicketAccess::Write, Denial::Hide);
pub const TICKET_NOTE: RoutePolicy = RoutePolicy::scope(scopes::ARTICLES_WRITE)
    .ticket(TicketAccess::Note, Denial::RevealIfReadable);
pub const TICKET_PRIORITY: RoutePolicy = RoutePolicy::scope(scopes::TICKETS_WRITE)
    .ticket(TicketAccess::Priority, Denial::RevealIfReadable);
pub const QUEUE_READ: RoutePolicy =
    RoutePolicy::scope(scopes::QUEUES_READ).queue(QueueAccess::Read, Denial::Hide);
pub const QUEUE_CREATE: RoutePolicy =
    RoutePolicy::scope(scopes::TICKETS_WRITE).queue(QueueAccess::Create, Denial::Hide);
pub const ADMIN: RoutePolicy = RoutePolicy::scope(scopes::ADMIN_ALL);

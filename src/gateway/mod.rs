//! Authorization gateway.
//!
//! Every protected request moves through the same states:
//!
//! ```text
//! Unauthenticated -> Identified -> ScopeChecked -> (ResourceChecked) -> Admitted
//!        \               \              \                  \
//!         +---------------+--------------+------------------+--> Rejected(ApiError)
//! ```
//!
//! [`middleware::authenticate`] covers the first transition plus admission
//! control; [`middleware::guard_route`] applies the route's [`RoutePolicy`].
//! Handlers receive the identity through [`CurrentIdentity`], which rejects
//! with 401 if the gateway did not run.

mod credential;
mod extract;
pub mod middleware;
pub mod policy;

pub use credential::{extract_credential, source_address};
pub use extract::{Authenticated, CurrentIdentity};
pub use middleware::{GuardedRoute, authenticate, limit_by_address};
pub use policy::{Denial, QueueAccess, ResourceGuard, RoutePolicy, TicketAccess};

use std::sync::Arc;
use tracing::debug;

use crate::auth::{CredentialVerifier, Identity};
use crate::error::ApiError;
use crate::permissions::{GrantSet, PermissionService};
use crate::scopes::ScopeEvaluator;
use crate::security::RateLimiter;

/// Gateway knobs taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct GatewaySettings {
    /// Ceiling for identities without their own, and for address keys.
    pub default_limit: u32,
    pub retry_after_secs: u64,
    pub trust_forwarded_for: bool,
}

/// The collaborators each request is checked against.
pub struct Gateway {
    verifier: CredentialVerifier,
    limiter: Arc<RateLimiter>,
    scopes: ScopeEvaluator,
    permissions: PermissionService,
    settings: GatewaySettings,
}

impl Gateway {
    pub fn new(
        verifier: CredentialVerifier,
        limiter: Arc<RateLimiter>,
        scopes: ScopeEvaluator,
        permissions: PermissionService,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            verifier,
            limiter,
            scopes,
            permissions,
            settings,
        }
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn scopes(&self) -> &ScopeEvaluator {
        &self.scopes
    }

    pub fn permissions(&self) -> &PermissionService {
        &self.permissions
    }

    pub fn settings(&self) -> GatewaySettings {
        self.settings
    }

    /// Ceiling applied to an identity's bucket.
    pub fn ceiling_for(&self, identity: &Identity) -> u32 {
        identity.rate_limit().unwrap_or(self.settings.default_limit)
    }

    /// Scope check, then the resource check if the route has one.
    pub async fn authorize(
        &self,
        identity: &Identity,
        policy: &RoutePolicy,
        resource_id: Option<i64>,
    ) -> Result<(), ApiError> {
        self.scopes.check(identity, policy.scope)?;

        match (policy.resource, resource_id) {
            (None, _) => Ok(()),
            (Some(guard), Some(id)) => self.authorize_resource(identity, guard, id).await,
            (Some(guard), None) => Err(ApiError::InvalidId(guard.param().to_string())),
        }
    }

    /// Resource-level check with the 404-vs-403 policy applied.
    pub async fn authorize_resource(
        &self,
        identity: &Identity,
        guard: ResourceGuard,
        id: i64,
    ) -> Result<(), ApiError> {
        let (allowed, readable, denial) = match guard {
            ResourceGuard::Ticket { access, denial, .. } => {
                let (allowed, readable) = self.ticket_access(identity, access, id).await?;
                (allowed, readable, denial)
            }
            ResourceGuard::Queue { access, denial, .. } => {
                let (allowed, readable) = self.queue_access(identity, access, id).await?;
                (allowed, readable, denial)
            }
        };

        if allowed {
            return Ok(());
        }
        debug!(
            prefix = %identity.credential_prefix(),
            resource = ?guard,
            id,
            readable,
            "resource access denied"
        );
        Err(match denial {
            Denial::RevealIfReadable if readable => ApiError::ResourceForbidden,
            _ => ApiError::ResourceHidden,
        })
    }

    /// Returns (allowed, readable).
    async fn ticket_access(
        &self,
        identity: &Identity,
        access: TicketAccess,
        ticket_id: i64,
    ) -> Result<(bool, bool), ApiError> {
        if identity.is_customer() {
            let customer = identity
                .customer_ref()
                .ok_or_else(|| ApiError::Internal("customer identity without account".into()))?;
            let readable = self
                .permissions
                .customer_can_access_ticket(
                    &customer.login,
                    customer.company_id.as_deref(),
                    ticket_id,
                )
                .await?;
            return Ok((readable && access.customer_may(), readable));
        }

        let grants = self
            .permissions
            .agent_ticket_grants(identity.principal_id(), ticket_id)
            .await?
            .unwrap_or_else(GrantSet::empty);
        Ok((grants.allows(access.required_kind()), grants.can_read()))
    }

    async fn queue_access(
        &self,
        identity: &Identity,
        access: QueueAccess,
        queue_id: i64,
    ) -> Result<(bool, bool), ApiError> {
        if identity.is_customer() {
            let customer = identity
                .customer_ref()
                .ok_or_else(|| ApiError::Internal("customer identity without account".into()))?;
            let readable = self
                .permissions
                .customer_queue_access(&customer.login, customer.company_id.as_deref(), queue_id)
                .await?;
            return Ok((readable && access.customer_may(), readable));
        }

        let grants = self
            .permissions
            .agent_grants(identity.principal_id(), queue_id)
            .await?;
        Ok((grants.allows(access.required_kind()), grants.can_read()))
    }
}

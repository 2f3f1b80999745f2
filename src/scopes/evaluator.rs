//! Scope evaluation for authenticated callers.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::ScopeRegistry;
use crate::auth::{Identity, Role};

/// Why a scope check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeDenial {
    /// The credential does not carry the scope.
    #[error("credential lacks scope {0}")]
    Missing(String),
    /// The credential carries the scope but the caller's kind or role may not use it.
    #[error("scope {scope} not available to caller")]
    RoleRestricted { scope: String, customer: bool },
}

/// Decides whether an identity may exercise a scope.
#[derive(Debug, Clone)]
pub struct ScopeEvaluator {
    registry: Arc<ScopeRegistry>,
}

impl ScopeEvaluator {
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    /// Whether the identity's granted scopes cover `required`.
    pub fn allowed(&self, identity: &Identity, required: &str) -> bool {
        identity.scopes().satisfies(required)
    }

    /// Whether a caller of this role and kind may use `required` at all.
    pub fn role_allowed(&self, required: &str, role: Role, is_customer: bool) -> bool {
        self.registry.is_allowed(required, role, is_customer)
    }

    /// Full check for a route. `None` passes through.
    ///
    /// Scope possession is checked before role restrictions, so a customer
    /// token lacking the scope reports the missing scope.
    pub fn check(&self, identity: &Identity, required: Option<&str>) -> Result<(), ScopeDenial> {
        let Some(required) = required.filter(|s| !s.is_empty()) else {
            return Ok(());
        };

        if !self.allowed(identity, required) {
            debug!(
                prefix = %identity.credential_prefix(),
                scope = %required,
                "scope missing"
            );
            return Err(ScopeDenial::Missing(required.to_string()));
        }

        let is_customer = identity.is_customer();
        if !self.role_allowed(required, identity.role(), is_customer) {
            debug!(
                prefix = %identity.credential_prefix(),
                scope = %required,
                customer = is_customer,
                "scope restricted for role"
            );
            return Err(ScopeDenial::RoleRestricted {
                scope: required.to_string(),
                customer: is_customer,
            });
        }
        Ok(())
    }
}

//! Scope definitions and caller restrictions.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use super::{
    ADMIN_ALL, ARTICLES_READ, ARTICLES_WRITE, QUEUES_READ, SCOPE_ALL, TICKETS_DELETE,
    TICKETS_READ, TICKETS_WRITE, USERS_READ,
};
use crate::auth::Role;

/// A registered scope and the restrictions attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeDefinition {
    pub scope: String,
    pub description: String,
    pub category: String,
    /// Role the caller must hold (Admin satisfies every role).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_role: Option<Role>,
    /// Customers may never use this scope.
    pub agent_only: bool,
}

impl ScopeDefinition {
    pub fn new(scope: &str, description: &str, category: &str) -> Self {
        Self {
            scope: scope.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            require_role: None,
            agent_only: false,
        }
    }

    pub fn agent_only(mut self) -> Self {
        self.agent_only = true;
        self
    }

    pub fn require_role(mut self, role: Role) -> Self {
        self.require_role = Some(role);
        self
    }

    /// Whether a caller with `role` may use this scope.
    pub fn permits(&self, role: Role, is_customer: bool) -> bool {
        if self.agent_only && is_customer {
            return false;
        }
        match self.require_role {
            Some(required) => role.satisfies(required),
            None => true,
        }
    }
}

/// Thread-safe registry of known scopes.
///
/// Core scopes are present from construction; extensions may add their own
/// at runtime.
#[derive(Debug)]
pub struct ScopeRegistry {
    scopes: RwLock<HashMap<String, ScopeDefinition>>,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry {
    /// Registry holding the core scopes.
    pub fn new() -> Self {
        let registry = Self::empty();
        for def in core_scopes() {
            registry.register(def);
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace a definition.
    pub fn register(&self, def: ScopeDefinition) {
        self.scopes.write().insert(def.scope.clone(), def);
    }

    /// Remove a definition. Returns whether it existed.
    pub fn unregister(&self, scope: &str) -> bool {
        self.scopes.write().remove(scope).is_some()
    }

    pub fn get(&self, scope: &str) -> Option<ScopeDefinition> {
        self.scopes.read().get(scope).cloned()
    }

    /// Registered scopes, plus any `<prefix>:*` wildcard pattern.
    pub fn is_valid(&self, scope: &str) -> bool {
        if self.scopes.read().contains_key(scope) {
            return true;
        }
        scope
            .strip_suffix(":*")
            .is_some_and(|prefix| !prefix.is_empty())
    }

    /// Whether a caller may use `scope`.
    ///
    /// Unregistered scopes carry no restrictions.
    pub fn is_allowed(&self, scope: &str, role: Role, is_customer: bool) -> bool {
        match self.scopes.read().get(scope) {
            Some(def) => def.permits(role, is_customer),
            None => true,
        }
    }

    /// Scopes a caller may request, sorted by category then scope.
    pub fn available_for(&self, role: Role, is_customer: bool) -> Vec<ScopeDefinition> {
        let mut defs: Vec<_> = self
            .scopes
            .read()
            .values()
            .filter(|def| def.permits(role, is_customer))
            .cloned()
            .collect();
        defs.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.scope.cmp(&b.scope)));
        defs
    }

    pub fn len(&self) -> usize {
        self.scopes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.read().is_empty()
    }
}

fn core_scopes() -> Vec<ScopeDefinition> {
    vec![
        ScopeDefinition::new(SCOPE_ALL, "Full access (inherits all user permissions)", "general"),
        ScopeDefinition::new(TICKETS_READ, "Read tickets", "tickets"),
        ScopeDefinition::new(TICKETS_WRITE, "Create and update tickets", "tickets"),
        ScopeDefinition::new(TICKETS_DELETE, "Delete tickets", "tickets").agent_only(),
        ScopeDefinition::new(ARTICLES_READ, "Read ticket articles", "articles"),
        ScopeDefinition::new(ARTICLES_WRITE, "Create ticket articles", "articles"),
        ScopeDefinition::new(USERS_READ, "Read user information", "users").agent_only(),
        ScopeDefinition::new(QUEUES_READ, "Read queue information", "queues").agent_only(),
        ScopeDefinition::new(ADMIN_ALL, "Full administrative access", "admin")
            .agent_only()
            .require_role(Role::Admin),
    ]
}

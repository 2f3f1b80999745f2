//! Credential scopes.
//!
//! A scope names an action class (`tickets:read`, `admin:*`). Credentials
//! carry a [`ScopeSet`]; routes declare the scope they need. Two questions
//! are answered here:
//!
//! 1. **Does the credential hold the scope?** [`ScopeSet::satisfies`] applies
//!    exact, `*` and `<prefix>:*` matching.
//! 2. **May this caller use the scope at all?** The [`ScopeRegistry`] tags
//!    scopes as agent-only or role-restricted, so a customer holding `*`
//!    still cannot reach an agent-only endpoint.
//!
//! [`ScopeEvaluator`] combines both and reports which one failed.

mod evaluator;
mod registry;
mod set;

pub use evaluator::{ScopeDenial, ScopeEvaluator};
pub use registry::{ScopeDefinition, ScopeRegistry};
pub use set::ScopeSet;

pub const SCOPE_ALL: &str = "*";
pub const TICKETS_READ: &str = "tickets:read";
pub const TICKETS_WRITE: &str = "tickets:write";
pub const TICKETS_DELETE: &str = "tickets:delete";
pub const ARTICLES_READ: &str = "articles:read";
pub const ARTICLES_WRITE: &str = "articles:write";
pub const USERS_READ: &str = "users:read";
pub const QUEUES_READ: &str = "queues:read";
pub const ADMIN_ALL: &str = "admin:*";

//! Verified caller identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::scopes::ScopeSet;

/// Which population the principal id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Agent,
    Customer,
}

/// Business role of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Agent,
    Admin,
    Customer,
}

impl Role {
    /// Admin satisfies every role requirement.
    pub fn satisfies(self, required: Role) -> bool {
        self == Role::Admin || self == required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::Admin => "Admin",
            Self::Customer => "Customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("admin") {
            Ok(Self::Admin)
        } else if s.eq_ignore_ascii_case("agent") || s.eq_ignore_ascii_case("user") {
            Ok(Self::Agent)
        } else if s.eq_ignore_ascii_case("customer") {
            Ok(Self::Customer)
        } else {
            Err(format!("unknown role: {s}"))
        }
    }
}

/// Customer account details needed for ticket access checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerRef {
    pub login: String,
    /// Company the customer belongs to, if any.
    pub company_id: Option<String>,
}

/// The caller, as established by the credential verifier.
///
/// Built once per request and shared read-only through request extensions.
/// Fields are private so nothing downstream can alter the scopes or role
/// after verification.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    kind: IdentityKind,
    principal_id: i64,
    role: Role,
    scopes: ScopeSet,
    credential_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<CustomerRef>,
    #[serde(skip)]
    token_id: Option<i64>,
}

impl Identity {
    pub fn agent(
        principal_id: i64,
        role: Role,
        scopes: ScopeSet,
        credential_prefix: String,
    ) -> Self {
        Self {
            kind: IdentityKind::Agent,
            principal_id,
            role,
            scopes,
            credential_prefix,
            rate_limit: None,
            customer: None,
            token_id: None,
        }
    }

    pub fn customer(
        principal_id: i64,
        customer: CustomerRef,
        scopes: ScopeSet,
        credential_prefix: String,
    ) -> Self {
        Self {
            kind: IdentityKind::Customer,
            principal_id,
            role: Role::Customer,
            scopes,
            credential_prefix,
            rate_limit: None,
            customer: Some(customer),
            token_id: None,
        }
    }

    /// Attach a per-credential ceiling. Zero means "use the default".
    pub fn with_rate_limit(mut self, limit: Option<u32>) -> Self {
        self.rate_limit = limit.filter(|&l| l > 0);
        self
    }

    pub fn with_token_id(mut self, token_id: i64) -> Self {
        self.token_id = Some(token_id);
        self
    }

    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    pub fn is_customer(&self) -> bool {
        self.kind == IdentityKind::Customer
    }

    pub fn principal_id(&self) -> i64 {
        self.principal_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    pub fn credential_prefix(&self) -> &str {
        &self.credential_prefix
    }

    pub fn rate_limit(&self) -> Option<u32> {
        self.rate_limit
    }

    pub fn customer_ref(&self) -> Option<&CustomerRef> {
        self.customer.as_ref()
    }

    /// Id of the API token that authenticated this request, if any.
    pub fn token_id(&self) -> Option<i64> {
        self.token_id
    }
}

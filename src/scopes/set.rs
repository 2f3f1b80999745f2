//! Granted scope sets.

use serde::Serialize;

use super::SCOPE_ALL;

/// Ordered list of scopes granted to a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    /// Build a set from stored scopes.
    ///
    /// An empty list grants everything, matching how tokens without an
    /// explicit scope list inherit their owner's permissions.
    pub fn new(scopes: Vec<String>) -> Self {
        if scopes.is_empty() {
            Self::all()
        } else {
            Self(scopes)
        }
    }

    /// The `*` set.
    pub fn all() -> Self {
        Self(vec![SCOPE_ALL.to_string()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// True if any granted scope covers `required`.
    pub fn satisfies(&self, required: &str) -> bool {
        self.0.iter().any(|granted| covers(granted, required))
    }
}

/// `granted` covers `required` on exact match, `*`, or a `<prefix>:*`
/// wildcard whose prefix starts `required`.
fn covers(granted: &str, required: &str) -> bool {
    if granted == SCOPE_ALL || granted == required {
        return true;
    }
    match granted.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => {
            required.len() > prefix.len() && required.starts_with(prefix)
        }
        _ => false,
    }
}

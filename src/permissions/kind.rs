//! Permission kinds and grant sets.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A single permission kind on a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    Rw,
    Ro,
    Note,
    Create,
    MoveInto,
    Owner,
    Priority,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 7] = [
        Self::Rw,
        Self::Ro,
        Self::Note,
        Self::Create,
        Self::MoveInto,
        Self::Owner,
        Self::Priority,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rw => "rw",
            Self::Ro => "ro",
            Self::Note => "note",
            Self::Create => "create",
            Self::MoveInto => "move_into",
            Self::Owner => "owner",
            Self::Priority => "priority",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::Rw => 1 << 0,
            Self::Ro => 1 << 1,
            Self::Note => 1 << 2,
            Self::Create => 1 << 3,
            Self::MoveInto => 1 << 4,
            Self::Owner => 1 << 5,
            Self::Priority => 1 << 6,
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown permission kind: {s}"))
    }
}

impl Serialize for PermissionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Set of kinds held on a group (or the union over a queue's group).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantSet(u8);

impl GrantSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, kind: PermissionKind) {
        self.0 |= kind.bit();
    }

    pub fn with(mut self, kind: PermissionKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn union(self, other: GrantSet) -> Self {
        Self(self.0 | other.0)
    }

    /// Literal membership, without `rw` expansion.
    pub fn contains(self, kind: PermissionKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Whether the set permits `kind`: held directly or via `rw`.
    pub fn allows(self, kind: PermissionKind) -> bool {
        self.contains(PermissionKind::Rw) || self.contains(kind)
    }

    /// Read access: `ro` or `rw`.
    pub fn can_read(self) -> bool {
        self.allows(PermissionKind::Ro)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Kinds held literally, in canonical order.
    pub fn kinds(self) -> Vec<PermissionKind> {
        PermissionKind::ALL
            .into_iter()
            .filter(|k| self.contains(*k))
            .collect()
    }
}

impl FromIterator<PermissionKind> for GrantSet {
    fn from_iter<I: IntoIterator<Item = PermissionKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), GrantSet::with)
    }
}

impl Serialize for GrantSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.kinds().serialize(serializer)
    }
}

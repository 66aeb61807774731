#![allow(clippy::match_same_arms)]
//! Decision vocabulary.
//!
//! [`AccessPath`] names the delegation route that granted access.
//! [`ActionLevel`] names how destructive the requested operation is.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The route through the organizational graph that granted access.
///
/// Paths are listed in evaluation order. The five predicates form a logical
/// OR; the order only decides which path is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPath {
    /// The actor's account created the target party.
    DirectOwner,
    /// The actor owns a master organization delegated over one of the
    /// target's organizations.
    MasterDelegation,
    /// The actor manages one of the target's organizations.
    OrgManager,
    /// The actor manages one of the target's locations.
    LocationManager,
    /// No predicate matched.
    None,
}

impl AccessPath {
    /// All granting paths, in evaluation order.
    pub const GRANTING: [AccessPath; 4] = [
        AccessPath::DirectOwner,
        AccessPath::MasterDelegation,
        AccessPath::OrgManager,
        AccessPath::LocationManager,
    ];

    /// Returns whether this path grants anything at all.
    pub fn is_granting(&self) -> bool {
        !matches!(self, AccessPath::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPath::DirectOwner => "direct_owner",
            AccessPath::MasterDelegation => "master_delegation",
            AccessPath::OrgManager => "org_manager",
            AccessPath::LocationManager => "location_manager",
            AccessPath::None => "none",
        }
    }
}

impl Display for AccessPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct_owner" => Ok(AccessPath::DirectOwner),
            "master_delegation" => Ok(AccessPath::MasterDelegation),
            "org_manager" => Ok(AccessPath::OrgManager),
            "location_manager" => Ok(AccessPath::LocationManager),
            "none" => Ok(AccessPath::None),
            _ => Err(format!("Invalid access path: {s}")),
        }
    }
}

/// How destructive the requested operation is.
///
/// Ordered from least to most destructive: Read < Write < Delete.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionLevel {
    /// GET-style access.
    #[default]
    Read,
    /// Create or update.
    Write,
    /// Removal of a record.
    Delete,
}

impl ActionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionLevel::Read => "read",
            ActionLevel::Write => "write",
            ActionLevel::Delete => "delete",
        }
    }
}

impl Display for ActionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" | "get" => Ok(ActionLevel::Read),
            "write" | "put" | "post" => Ok(ActionLevel::Write),
            "delete" => Ok(ActionLevel::Delete),
            _ => Err(format!("Invalid action level: {s}. Use read, write or delete")),
        }
    }
}

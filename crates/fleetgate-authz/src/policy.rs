//! Action-level policy.
//!
//! The predicate chain answers *how* an actor reaches a party's records. The
//! policy decides which of those routes are good enough for a given action:
//! a location manager may read a driver's file but not delete it.

use std::collections::BTreeSet;

use fleetgate_types::{AccessPath, ActionLevel};
use serde::{Deserialize, Serialize};

/// Accepted delegation paths per action level.
///
/// [`AccessPath::None`] is never accepted, whatever the sets contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    pub read: BTreeSet<AccessPath>,
    pub write: BTreeSet<AccessPath>,
    pub delete: BTreeSet<AccessPath>,
}

impl ActionPolicy {
    /// Creates a policy that accepts nothing.
    pub fn empty() -> Self {
        Self {
            read: BTreeSet::new(),
            write: BTreeSet::new(),
            delete: BTreeSet::new(),
        }
    }

    /// Creates a policy that accepts every granting path at every level.
    ///
    /// This is the behavior of handlers that apply one check to GET, PUT and
    /// DELETE alike.
    pub fn permissive() -> Self {
        let all: BTreeSet<AccessPath> = AccessPath::GRANTING.into_iter().collect();
        Self {
            read: all.clone(),
            write: all.clone(),
            delete: all,
        }
    }

    /// Adds an accepted path for `level`.
    pub fn accept(mut self, level: ActionLevel, path: AccessPath) -> Self {
        if path.is_granting() {
            self.paths_mut(level).insert(path);
        }
        self
    }

    /// Removes an accepted path for `level`.
    pub fn reject(mut self, level: ActionLevel, path: AccessPath) -> Self {
        self.paths_mut(level).remove(&path);
        self
    }

    /// Returns whether `path` is good enough for `level`.
    pub fn accepts(&self, level: ActionLevel, path: AccessPath) -> bool {
        path.is_granting() && self.paths(level).contains(&path)
    }

    pub fn paths(&self, level: ActionLevel) -> &BTreeSet<AccessPath> {
        match level {
            ActionLevel::Read => &self.read,
            ActionLevel::Write => &self.write,
            ActionLevel::Delete => &self.delete,
        }
    }

    fn paths_mut(&mut self, level: ActionLevel) -> &mut BTreeSet<AccessPath> {
        match level {
            ActionLevel::Read => &mut self.read,
            ActionLevel::Write => &mut self.write,
            ActionLevel::Delete => &mut self.delete,
        }
    }
}

impl Default for ActionPolicy {
    /// Read and write accept every granting path; delete requires ownership,
    /// master delegation, or organization management.
    fn default() -> Self {
        Self::permissive().reject(ActionLevel::Delete, AccessPath::LocationManager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_blocks_location_manager_deletes() {
        let policy = ActionPolicy::default();

        for path in AccessPath::GRANTING {
            assert!(policy.accepts(ActionLevel::Read, path));
            assert!(policy.accepts(ActionLevel::Write, path));
        }

        assert!(policy.accepts(ActionLevel::Delete, AccessPath::DirectOwner));
        assert!(policy.accepts(ActionLevel::Delete, AccessPath::MasterDelegation));
        assert!(policy.accepts(ActionLevel::Delete, AccessPath::OrgManager));
        assert!(!policy.accepts(ActionLevel::Delete, AccessPath::LocationManager));
    }

    #[test]
    fn none_is_never_accepted() {
        let policy = ActionPolicy::empty().accept(ActionLevel::Read, AccessPath::None);
        assert!(policy.read.is_empty());
        assert!(!ActionPolicy::permissive().accepts(ActionLevel::Read, AccessPath::None));
    }

    #[test]
    fn builder_composes_per_level() {
        let policy = ActionPolicy::empty()
            .accept(ActionLevel::Read, AccessPath::LocationManager)
            .accept(ActionLevel::Delete, AccessPath::DirectOwner);

        assert!(policy.accepts(ActionLevel::Read, AccessPath::LocationManager));
        assert!(!policy.accepts(ActionLevel::Write, AccessPath::LocationManager));
        assert!(policy.accepts(ActionLevel::Delete, AccessPath::DirectOwner));
        assert!(!policy.accepts(ActionLevel::Delete, AccessPath::OrgManager));
    }

    #[test]
    fn policy_serializes_as_path_names() {
        let json = serde_json::to_value(ActionPolicy::default()).unwrap();
        let delete = json["delete"].as_array().unwrap();
        assert_eq!(delete.len(), 3);
        assert!(!delete.contains(&serde_json::json!("location_manager")));
    }
}

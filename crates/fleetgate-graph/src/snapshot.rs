//! JSON snapshots of the organizational graph.
//!
//! A snapshot is the portable form of an [`InMemoryGraph`]: the CLI evaluates
//! decisions against one, and fixtures use them to describe scenarios.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use fleetgate_types::{Location, Organization, Party, PartyId, Role, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::InMemoryGraph;

/// Error type for snapshot loading.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(String),
}

/// Serializable picture of the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphSnapshot {
    pub parties: Vec<Party>,
    pub organizations: Vec<Organization>,
    pub locations: Vec<Location>,
    pub roles: Vec<Role>,
    pub user_parties: BTreeMap<UserId, PartyId>,
}

impl GraphSnapshot {
    /// Parses and validates a snapshot from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reads, parses and validates a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks referential integrity.
    ///
    /// - party, organization, location and role ids are unique
    /// - organizations are backed by known parties
    /// - locations belong to known organizations
    /// - roles are held by known parties and scoped to known organizations/locations
    /// - user links point at known parties
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let parties = unique(self.parties.iter().map(|p| p.id.as_str()), "party")?;
        let organizations = unique(
            self.organizations.iter().map(|o| o.id.as_str()),
            "organization",
        )?;
        let locations = unique(self.locations.iter().map(|l| l.id.as_str()), "location")?;
        unique(self.roles.iter().map(|r| r.id.as_str()), "role")?;

        for organization in &self.organizations {
            if !parties.contains(organization.party_id.as_str()) {
                return Err(SnapshotError::Invalid(format!(
                    "organization {} is backed by unknown party {}",
                    organization.id, organization.party_id
                )));
            }
        }

        for location in &self.locations {
            if !organizations.contains(location.organization_id.as_str()) {
                return Err(SnapshotError::Invalid(format!(
                    "location {} belongs to unknown organization {}",
                    location.id, location.organization_id
                )));
            }
        }

        for role in &self.roles {
            if !parties.contains(role.holder.as_str()) {
                return Err(SnapshotError::Invalid(format!(
                    "role {} is held by unknown party {}",
                    role.id, role.holder
                )));
            }
            if let Some(org) = &role.organization_id {
                if !organizations.contains(org.as_str()) {
                    return Err(SnapshotError::Invalid(format!(
                        "role {} is scoped to unknown organization {org}",
                        role.id
                    )));
                }
            }
            if let Some(loc) = &role.location_id {
                if !locations.contains(loc.as_str()) {
                    return Err(SnapshotError::Invalid(format!(
                        "role {} is scoped to unknown location {loc}",
                        role.id
                    )));
                }
            }
        }

        for (user, party) in &self.user_parties {
            if !parties.contains(party.as_str()) {
                return Err(SnapshotError::Invalid(format!(
                    "user {user} is linked to unknown party {party}"
                )));
            }
        }

        Ok(())
    }

    /// Builds an [`InMemoryGraph`] holding this snapshot.
    pub fn into_graph(self) -> InMemoryGraph {
        let graph = InMemoryGraph::new();
        for party in self.parties {
            graph.insert_party(party);
        }
        for organization in self.organizations {
            graph.insert_organization(organization);
        }
        for location in self.locations {
            graph.insert_location(location);
        }
        for role in self.roles {
            graph.insert_role(role);
        }
        for (user, party) in self.user_parties {
            graph.link_user_party(user, party);
        }
        graph
    }
}

fn unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    kind: &str,
) -> Result<BTreeSet<&'a str>, SnapshotError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SnapshotError::Invalid(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphAdapter;
    use chrono::Utc;

    const FLEET: &str = r#"{
        "parties": [
            {"id": "p-master", "kind": "organization", "ownerUserId": "bob"},
            {"id": "p-orgx", "kind": "organization"},
            {"id": "d-1", "kind": "person", "ownerUserId": "alice"}
        ],
        "organizations": [
            {"id": "org-m", "partyId": "p-master", "name": "Master Co"},
            {"id": "org-x", "partyId": "p-orgx", "name": "X Freight", "regulatoryId": "DOT-1"}
        ],
        "locations": [
            {"id": "loc-1", "organizationId": "org-x", "name": "Depot"}
        ],
        "roles": [
            {"id": "r-m", "holder": "p-master", "roleType": "master", "organizationId": "org-x", "isActive": true},
            {"id": "r-d", "holder": "d-1", "roleType": "driver", "organizationId": "org-x", "locationId": "loc-1", "isActive": true}
        ],
        "userParties": {"carol": "d-1"}
    }"#;

    #[tokio::test]
    async fn loads_into_graph() {
        let snapshot = GraphSnapshot::from_json_str(FLEET).unwrap();
        let graph = snapshot.into_graph();

        assert_eq!(graph.party_count(), 3);
        assert_eq!(graph.organization_count(), 2);
        assert_eq!(graph.location_count(), 1);
        assert_eq!(graph.role_count(), 2);

        let driver = PartyId::new("d-1").unwrap();
        let roles = graph.active_roles(&driver, Utc::now()).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(
            graph.user_party(&UserId::new("carol").unwrap()).await.unwrap(),
            Some(driver)
        );
    }

    #[test]
    fn rejects_dangling_role_holder() {
        let json = r#"{
            "parties": [],
            "roles": [{"id": "r", "holder": "ghost", "roleType": "driver", "isActive": true}]
        }"#;
        let err = GraphSnapshot::from_json_str(json).unwrap_err();
        assert!(matches!(err, SnapshotError::Invalid(msg) if msg.contains("ghost")));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let json = r#"{
            "parties": [
                {"id": "p", "kind": "person"},
                {"id": "p", "kind": "equipment"}
            ]
        }"#;
        let err = GraphSnapshot::from_json_str(json).unwrap_err();
        assert!(matches!(err, SnapshotError::Invalid(msg) if msg.contains("duplicate party")));
    }

    #[test]
    fn rejects_blank_ids_at_parse_time() {
        let json = r#"{"parties": [{"id": "", "kind": "person"}]}"#;
        assert!(matches!(
            GraphSnapshot::from_json_str(json),
            Err(SnapshotError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.json");
        std::fs::write(&path, FLEET).unwrap();

        let snapshot = GraphSnapshot::load(&path).unwrap();
        assert_eq!(snapshot.roles.len(), 2);

        let missing = GraphSnapshot::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(SnapshotError::Read { .. })));
    }
}

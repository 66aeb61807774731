//! # fleetgate-types: Core types for `Fleetgate`
//!
//! This crate contains the shared vocabulary of the authorization engine:
//! - Entity IDs ([`UserId`], [`PartyId`], [`OrganizationId`], [`LocationId`], [`RoleId`])
//! - The organizational graph ([`Party`], [`Organization`], [`Location`])
//! - Role grants ([`Role`], [`RoleType`], [`Scope`])
//! - Decision vocabulary ([`AccessPath`], [`ActionLevel`])
//!
//! Identifiers are opaque strings. An identifier can never be empty, so a
//! missing actor is rejected when the [`UserId`] is built rather than deep
//! inside an authorization decision.

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod access;
mod roles;

pub use access::{AccessPath, ActionLevel};
pub use roles::{Role, RoleType, Scope};

// ============================================================================
// Entity IDs
// ============================================================================

/// Error raised when an identifier is built from invalid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier was empty or whitespace-only.
    #[error("{kind} identifier must not be empty")]
    Empty { kind: &'static str },
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier, rejecting empty or whitespace-only input.
            pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(IdError::Empty { kind: $kind });
                }
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Authenticated account identifier (the acting user).
    UserId,
    "user"
);

string_id!(
    /// Identifier of an addressable subject: person, organization, or equipment.
    PartyId,
    "party"
);

string_id!(
    /// Identifier of a tenant organization.
    OrganizationId,
    "organization"
);

string_id!(
    /// Identifier of a location inside exactly one organization.
    LocationId,
    "location"
);

string_id!(
    /// Identifier of a role grant.
    RoleId,
    "role"
);

// ============================================================================
// Organizational graph
// ============================================================================

/// What kind of subject a party is. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Person,
    Organization,
    Equipment,
}

/// An addressable subject that roles and ownership attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: PartyId,
    pub kind: PartyKind,
    /// The account that directly created the party, if any.
    #[serde(default)]
    pub owner_user_id: Option<UserId>,
}

impl Party {
    pub fn new(id: PartyId, kind: PartyKind) -> Self {
        Self {
            id,
            kind,
            owner_user_id: None,
        }
    }

    /// Sets the owning account.
    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.owner_user_id = Some(user_id);
        self
    }

    /// Returns whether the given account directly owns this party.
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.owner_user_id.as_ref() == Some(user_id)
    }
}

/// A tenant. An organization with no managing master is standalone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrganizationId,
    /// Party backing this organization; master delegation roles are held by it.
    pub party_id: PartyId,
    pub name: String,
    /// Regulatory identifier (e.g. a DOT number).
    #[serde(default)]
    pub regulatory_id: Option<String>,
}

impl Organization {
    pub fn new(id: OrganizationId, party_id: PartyId, name: impl Into<String>) -> Self {
        Self {
            id,
            party_id,
            name: name.into(),
            regulatory_id: None,
        }
    }

    pub fn with_regulatory_id(mut self, regulatory_id: impl Into<String>) -> Self {
        self.regulatory_id = Some(regulatory_id.into());
        self
    }
}

/// A sub-unit of exactly one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    pub organization_id: OrganizationId,
    pub name: String,
}

impl Location {
    pub fn new(id: LocationId, organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id,
            organization_id,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("" ; "empty")]
    #[test_case("   " ; "spaces")]
    #[test_case("\t\n" ; "control whitespace")]
    fn blank_ids_are_rejected(raw: &str) {
        assert_eq!(UserId::new(raw), Err(IdError::Empty { kind: "user" }));
        assert!(PartyId::new(raw).is_err());
        assert!(OrganizationId::new(raw).is_err());
    }

    #[test]
    fn id_display_is_raw_value() {
        let id = PartyId::new("driver-17").unwrap();
        assert_eq!(id.to_string(), "driver-17");
        assert_eq!(format!("{id:?}"), "PartyId(\"driver-17\")");
    }

    #[test]
    fn ids_deserialize_through_validation() {
        let ok: UserId = serde_json::from_str("\"u-1\"").unwrap();
        assert_eq!(ok.as_str(), "u-1");

        let blank: Result<UserId, _> = serde_json::from_str("\"\"");
        assert!(blank.is_err());
    }

    #[test]
    fn party_ownership() {
        let owner = UserId::new("alice").unwrap();
        let other = UserId::new("bob").unwrap();
        let party = Party::new(PartyId::new("p1").unwrap(), PartyKind::Person).owned_by(owner.clone());

        assert!(party.is_owned_by(&owner));
        assert!(!party.is_owned_by(&other));

        let orphan = Party::new(PartyId::new("p2").unwrap(), PartyKind::Equipment);
        assert!(!orphan.is_owned_by(&owner));
    }

    #[test]
    fn party_json_shape() {
        let party = Party::new(PartyId::new("p1").unwrap(), PartyKind::Equipment)
            .owned_by(UserId::new("alice").unwrap());
        let json = serde_json::to_value(&party).unwrap();

        assert_eq!(json["kind"], "equipment");
        assert_eq!(json["ownerUserId"], "alice");
    }
}

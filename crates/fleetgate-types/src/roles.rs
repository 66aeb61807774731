//! Role grants.
//!
//! A role links a *holder* party to a *scope* (an organization and/or a
//! location) for a bounded period. Roles are soft-revoked by clearing
//! `is_active` or setting `end_date`; they are never deleted while records
//! reference them.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LocationId, OrganizationId, PartyId, RoleId};

/// Kind of grant a role confers.
///
/// Delegation between organizations is expressed with [`RoleType::Master`]:
/// a master organization's party holds a `master` role scoped to each
/// organization it administers. There is no separate hierarchy table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoleType {
    Owner,
    Master,
    Consultant,
    OrganizationManager,
    LocationManager,
    Driver,
    Equipment,
    /// Any role type this crate does not interpret. Preserved verbatim.
    Other(String),
}

impl RoleType {
    /// Role types that confer management of an organization.
    pub const ORGANIZATION_MANAGEMENT: [RoleType; 3] = [
        RoleType::OrganizationManager,
        RoleType::Owner,
        RoleType::Consultant,
    ];

    /// Role types that confer management of a location.
    pub const LOCATION_MANAGEMENT: [RoleType; 1] = [RoleType::LocationManager];

    /// Role types that delegate a managed organization to a master.
    pub const MASTER_DELEGATION: [RoleType; 1] = [RoleType::Master];

    pub fn as_str(&self) -> &str {
        match self {
            RoleType::Owner => "owner",
            RoleType::Master => "master",
            RoleType::Consultant => "consultant",
            RoleType::OrganizationManager => "organization_manager",
            RoleType::LocationManager => "location_manager",
            RoleType::Driver => "driver",
            RoleType::Equipment => "equipment",
            RoleType::Other(other) => other,
        }
    }
}

impl From<String> for RoleType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "owner" => RoleType::Owner,
            "master" => RoleType::Master,
            "consultant" => RoleType::Consultant,
            "organization_manager" => RoleType::OrganizationManager,
            "location_manager" => RoleType::LocationManager,
            "driver" => RoleType::Driver,
            "equipment" => RoleType::Equipment,
            _ => RoleType::Other(value),
        }
    }
}

impl From<RoleType> for String {
    fn from(role_type: RoleType) -> Self {
        role_type.as_str().to_string()
    }
}

impl Display for RoleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The organization or location a role lookup is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Organization(OrganizationId),
    Location(LocationId),
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Organization(id) => write!(f, "organization:{id}"),
            Scope::Location(id) => write!(f, "location:{id}"),
        }
    }
}

/// A time-bounded grant linking a holder party to a scope.
///
/// Holder and scope are independent identifiers: a role never implies a
/// reciprocal role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub holder: PartyId,
    pub role_type: RoleType,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    pub is_active: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Exclusive upper bound. `None` means open-ended.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Role {
    /// Creates an active, open-ended role with no scope.
    pub fn new(id: RoleId, holder: PartyId, role_type: RoleType) -> Self {
        Self {
            id,
            holder,
            role_type,
            organization_id: None,
            location_id: None,
            is_active: true,
            start_date: None,
            end_date: None,
        }
    }

    pub fn in_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn at_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn starting(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn ending(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns whether the role is in force at `at`.
    ///
    /// A role is active only if `is_active` is set and `at` lies within
    /// `[start_date, end_date)`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if self.start_date.is_some_and(|start| at < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| at >= end) {
            return false;
        }
        true
    }

    /// Returns whether the role's scope covers `scope`.
    pub fn covers(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Organization(id) => self.organization_id.as_ref() == Some(id),
            Scope::Location(id) => self.location_id.as_ref() == Some(id),
        }
    }
}

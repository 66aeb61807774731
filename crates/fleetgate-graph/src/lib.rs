//! # fleetgate-graph: Read-only graph adapter
//!
//! The authorization engine never talks to a database directly. Everything it
//! knows about parties, roles, organizations and locations comes through the
//! [`GraphAdapter`] trait defined here.
//!
//! ## Contract
//!
//! - Every method is side-effect-free and safe to call concurrently.
//! - Time-dependent lookups take the evaluation instant explicitly; the caller
//!   decides what "now" is for the whole decision.
//! - A store failure surfaces as [`GraphError::StoreUnavailable`]. It is never
//!   folded into "no role found".
//!
//! ## Bindings
//!
//! - [`InMemoryGraph`]: thread-safe in-process graph with fault injection,
//!   used by tests, fixtures and the CLI.
//! - [`GraphSnapshot`]: JSON document that seeds an [`InMemoryGraph`].
//!
//! ```
//! use fleetgate_graph::{GraphAdapter, InMemoryGraph};
//! use fleetgate_types::{Party, PartyId, PartyKind, UserId};
//!
//! # let runtime = tokio::runtime::Builder::new_current_thread().build()?;
//! # runtime.block_on(async {
//! let graph = InMemoryGraph::new();
//! let alice = UserId::new("alice")?;
//! let driver = PartyId::new("driver-1")?;
//! graph.insert_party(Party::new(driver.clone(), PartyKind::Person).owned_by(alice.clone()));
//!
//! assert_eq!(graph.owner_of(&driver).await?, Some(alice));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetgate_types::{Organization, Party, PartyId, Role, RoleType, Scope, UserId};
use thiserror::Error;

mod memory;
mod snapshot;

pub use memory::InMemoryGraph;
pub use snapshot::{GraphSnapshot, SnapshotError};

/// The adapter operation a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphOperation {
    Party,
    OwnerOf,
    ActiveRoles,
    HomeOrganization,
    FindRole,
    UserParty,
}

impl Display for GraphOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GraphOperation::Party => "party",
            GraphOperation::OwnerOf => "owner_of",
            GraphOperation::ActiveRoles => "active_roles",
            GraphOperation::HomeOrganization => "home_organization",
            GraphOperation::FindRole => "find_role",
            GraphOperation::UserParty => "user_party",
        };
        f.write_str(name)
    }
}

/// Error type for graph reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The backing store could not answer (outage, timeout, poisoned state).
    #[error("Store unavailable during {operation}: {reason}")]
    StoreUnavailable {
        operation: GraphOperation,
        reason: String,
    },
}

impl GraphError {
    pub fn unavailable(operation: GraphOperation, reason: impl Into<String>) -> Self {
        GraphError::StoreUnavailable {
            operation,
            reason: reason.into(),
        }
    }

    pub fn operation(&self) -> GraphOperation {
        match self {
            GraphError::StoreUnavailable { operation, .. } => *operation,
        }
    }
}

/// Result type for graph reads.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Read-only accessor over parties, roles, organizations and locations.
#[async_trait]
pub trait GraphAdapter: Send + Sync {
    /// Looks up a party. `None` means the party does not exist.
    async fn party(&self, party_id: &PartyId) -> Result<Option<Party>>;

    /// Returns the account that directly owns the party, if any.
    async fn owner_of(&self, party_id: &PartyId) -> Result<Option<UserId>> {
        Ok(self
            .party(party_id)
            .await?
            .and_then(|party| party.owner_user_id))
    }

    /// Returns every role held by `party_id` that is active at `at`.
    async fn active_roles(&self, party_id: &PartyId, at: DateTime<Utc>) -> Result<Vec<Role>>;

    /// Returns the organization whose backing party is owned by `user_id`.
    async fn home_organization(&self, user_id: &UserId) -> Result<Option<Organization>>;

    /// Finds a role held by `holder` covering `scope` with one of
    /// `role_types`, active at `at`.
    async fn find_role(
        &self,
        holder: &PartyId,
        scope: &Scope,
        role_types: &[RoleType],
        at: DateTime<Utc>,
    ) -> Result<Option<Role>>;

    /// Returns the person party through which `user_id` holds roles.
    async fn user_party(&self, user_id: &UserId) -> Result<Option<PartyId>>;
}

//! Role hierarchy resolution.
//!
//! Answers the individual questions the decision engine asks about the
//! three-tier hierarchy (master organization -> managed organization ->
//! location). Nothing is precomputed: each question costs one bounded read
//! against the graph adapter.
//!
//! Every read carries the configured timeout. A read that times out is
//! reported as [`GraphError::StoreUnavailable`], exactly like an outage.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetgate_graph::{GraphAdapter, GraphError, GraphOperation, Result};
use fleetgate_types::{
    LocationId, Organization, OrganizationId, PartyId, Role, RoleType, Scope, UserId,
};
use tracing::error;

/// Default per-read timeout.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Relationship between an actor and a target party's ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The actor's account created the party.
    Owner,
    /// The party exists and is owned by someone else or nobody.
    NotOwner,
    /// The party does not exist.
    Missing,
}

/// Resolves hierarchy facts for the decision engine.
#[derive(Clone)]
pub struct RoleHierarchyResolver {
    graph: Arc<dyn GraphAdapter>,
    timeout: Duration,
}

impl std::fmt::Debug for RoleHierarchyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleHierarchyResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RoleHierarchyResolver {
    pub fn new(graph: Arc<dyn GraphAdapter>) -> Self {
        Self {
            graph,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Sets the per-read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ------------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------------

    /// Classifies the actor's ownership of `target`, distinguishing a missing
    /// party from one the actor does not own.
    pub async fn ownership(&self, user_id: &UserId, target: &PartyId) -> Result<Ownership> {
        let party = self
            .bounded(GraphOperation::Party, self.graph.party(target))
            .await?;
        Ok(match party {
            None => Ownership::Missing,
            Some(party) if party.is_owned_by(user_id) => Ownership::Owner,
            Some(_) => Ownership::NotOwner,
        })
    }

    /// `ownerOf(target) == user_id`.
    pub async fn is_direct_owner(&self, user_id: &UserId, target: &PartyId) -> Result<bool> {
        let owner = self
            .bounded(GraphOperation::OwnerOf, self.graph.owner_of(target))
            .await?;
        Ok(owner.as_ref() == Some(user_id))
    }

    // ------------------------------------------------------------------------
    // Affiliation
    // ------------------------------------------------------------------------

    /// All roles of the target active at `at`.
    pub async fn target_roles(&self, target: &PartyId, at: DateTime<Utc>) -> Result<Vec<Role>> {
        self.bounded(
            GraphOperation::ActiveRoles,
            self.graph.active_roles(target, at),
        )
        .await
    }

    /// The organization whose backing party the user owns, if any.
    pub async fn home_organization_of(&self, user_id: &UserId) -> Result<Option<Organization>> {
        self.bounded(
            GraphOperation::HomeOrganization,
            self.graph.home_organization(user_id),
        )
        .await
    }

    /// The person party through which the user holds roles, if any.
    pub async fn actor_party(&self, user_id: &UserId) -> Result<Option<PartyId>> {
        self.bounded(GraphOperation::UserParty, self.graph.user_party(user_id))
            .await
    }

    // ------------------------------------------------------------------------
    // Delegation predicates
    // ------------------------------------------------------------------------

    /// True iff the master organization's party holds an active `master` role
    /// scoped to `target_org`.
    pub async fn has_master_delegation(
        &self,
        master_org_party: &PartyId,
        target_org: &OrganizationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.holds(
            master_org_party,
            Scope::Organization(target_org.clone()),
            &RoleType::MASTER_DELEGATION,
            at,
        )
        .await
    }

    /// True iff the user holds an active organization_manager, owner or
    /// consultant role scoped to `target_org`.
    pub async fn has_org_management_role(
        &self,
        user_id: &UserId,
        target_org: &OrganizationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        match self.actor_party(user_id).await? {
            Some(holder) => self.holds_org_management(&holder, target_org, at).await,
            None => Ok(false),
        }
    }

    /// True iff the user holds an active location_manager role scoped to
    /// `target_location`.
    pub async fn has_location_management_role(
        &self,
        user_id: &UserId,
        target_location: &LocationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        match self.actor_party(user_id).await? {
            Some(holder) => {
                self.holds_location_management(&holder, target_location, at)
                    .await
            }
            None => Ok(false),
        }
    }

    /// Organization management check for an already-resolved actor party.
    pub async fn holds_org_management(
        &self,
        holder: &PartyId,
        target_org: &OrganizationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.holds(
            holder,
            Scope::Organization(target_org.clone()),
            &RoleType::ORGANIZATION_MANAGEMENT,
            at,
        )
        .await
    }

    /// Location management check for an already-resolved actor party.
    pub async fn holds_location_management(
        &self,
        holder: &PartyId,
        target_location: &LocationId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.holds(
            holder,
            Scope::Location(target_location.clone()),
            &RoleType::LOCATION_MANAGEMENT,
            at,
        )
        .await
    }

    async fn holds(
        &self,
        holder: &PartyId,
        scope: Scope,
        role_types: &[RoleType],
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let role = self
            .bounded(
                GraphOperation::FindRole,
                self.graph.find_role(holder, &scope, role_types, at),
            )
            .await?;
        // The adapter contract already filters on activity; re-check so a
        // loose adapter cannot turn an expired grant into access.
        Ok(role.is_some_and(|role| role.is_active_at(at)))
    }

    async fn bounded<T>(
        &self,
        operation: GraphOperation,
        read: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let result = match tokio::time::timeout(self.timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(GraphError::unavailable(
                operation,
                format!("timed out after {}ms", self.timeout.as_millis()),
            )),
        };

        if let Err(err) = &result {
            error!(%operation, error = %err, "Graph read failed");
        }
        result
    }
}

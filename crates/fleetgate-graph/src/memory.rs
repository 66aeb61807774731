//! In-memory graph binding.
//!
//! Holds the whole party/role graph behind a single `RwLock`. Reads are
//! answered synchronously after an optional simulated latency. Writes exist
//! so fixtures can model onboarding and soft revocation; the engine itself
//! only ever reads.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetgate_types::{
    Location, LocationId, Organization, OrganizationId, Party, PartyId, Role, RoleId, RoleType,
    Scope, UserId,
};
use tracing::debug;

use crate::{GraphAdapter, GraphError, GraphOperation, Result};

#[derive(Debug, Default)]
struct GraphState {
    parties: BTreeMap<PartyId, Party>,
    organizations: BTreeMap<OrganizationId, Organization>,
    locations: BTreeMap<LocationId, Location>,
    roles: BTreeMap<RoleId, Role>,
    user_parties: BTreeMap<UserId, PartyId>,
}

/// Thread-safe in-process graph.
///
/// Supports fault injection for exercising fail-closed behavior:
/// - [`InMemoryGraph::set_available`] takes the whole store down
/// - [`InMemoryGraph::fail_operation`] breaks a single adapter method
/// - [`InMemoryGraph::set_latency`] delays every read
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
    unavailable: AtomicBool,
    failing: Mutex<HashSet<GraphOperation>>,
    latency_ms: AtomicU64,
    reads: AtomicU64,
}

impl InMemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Fixture writes
    // ------------------------------------------------------------------------

    pub fn insert_party(&self, party: Party) {
        self.write(|state| {
            state.parties.insert(party.id.clone(), party);
        });
    }

    /// Inserts an organization. Its backing party must be inserted separately.
    pub fn insert_organization(&self, organization: Organization) {
        self.write(|state| {
            state
                .organizations
                .insert(organization.id.clone(), organization);
        });
    }

    pub fn insert_location(&self, location: Location) {
        self.write(|state| {
            state.locations.insert(location.id.clone(), location);
        });
    }

    /// Inserts or replaces a role grant.
    pub fn insert_role(&self, role: Role) {
        self.write(|state| {
            state.roles.insert(role.id.clone(), role);
        });
    }

    /// Links an account to the person party that holds its roles.
    pub fn link_user_party(&self, user_id: UserId, party_id: PartyId) {
        self.write(|state| {
            state.user_parties.insert(user_id, party_id);
        });
    }

    /// Soft-revokes a role: clears `is_active` and closes it at `at`.
    ///
    /// Returns `false` if no such role exists.
    pub fn revoke_role(&self, role_id: &RoleId, at: DateTime<Utc>) -> bool {
        let mut found = false;
        self.write(|state| {
            if let Some(role) = state.roles.get_mut(role_id) {
                role.is_active = false;
                role.end_date = Some(role.end_date.map_or(at, |end| end.min(at)));
                found = true;
            }
        });
        found
    }

    /// Applies `f` to a stored role. Returns `false` if no such role exists.
    pub fn update_role(&self, role_id: &RoleId, f: impl FnOnce(&mut Role)) -> bool {
        let mut found = false;
        self.write(|state| {
            if let Some(role) = state.roles.get_mut(role_id) {
                f(role);
                found = true;
            }
        });
        found
    }

    // ------------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------------

    /// Marks the whole store as up or down.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Makes one adapter operation fail until [`InMemoryGraph::heal`] is called.
    pub fn fail_operation(&self, operation: GraphOperation) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(operation);
        }
    }

    /// Clears every injected fault, including latency.
    pub fn heal(&self) {
        self.set_available(true);
        self.latency_ms.store(0, Ordering::SeqCst);
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    /// Delays every read by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of adapter reads served (or attempted) so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Counts
    // ------------------------------------------------------------------------

    pub fn party_count(&self) -> usize {
        self.state.read().map_or(0, |state| state.parties.len())
    }

    pub fn organization_count(&self) -> usize {
        self.state.read().map_or(0, |state| state.organizations.len())
    }

    pub fn location_count(&self) -> usize {
        self.state.read().map_or(0, |state| state.locations.len())
    }

    pub fn role_count(&self) -> usize {
        self.state.read().map_or(0, |state| state.roles.len())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn write(&self, f: impl FnOnce(&mut GraphState)) {
        // A poisoned lock only happens if a fixture write panicked; keep the
        // data so later reads can still report on it.
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state);
    }

    /// Applies injected faults and latency, then hands back a read guard.
    async fn begin_read(
        &self,
        operation: GraphOperation,
    ) -> Result<RwLockReadGuard<'_, GraphState>> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GraphError::unavailable(operation, "store is down"));
        }

        let injected = self
            .failing
            .lock()
            .map_or(true, |failing| failing.contains(&operation));
        if injected {
            return Err(GraphError::unavailable(operation, "injected failure"));
        }

        self.state
            .read()
            .map_err(|_| GraphError::unavailable(operation, "graph state lock poisoned"))
    }
}

#[async_trait]
impl GraphAdapter for InMemoryGraph {
    async fn party(&self, party_id: &PartyId) -> Result<Option<Party>> {
        let state = self.begin_read(GraphOperation::Party).await?;
        Ok(state.parties.get(party_id).cloned())
    }

    async fn owner_of(&self, party_id: &PartyId) -> Result<Option<UserId>> {
        let state = self.begin_read(GraphOperation::OwnerOf).await?;
        Ok(state
            .parties
            .get(party_id)
            .and_then(|party| party.owner_user_id.clone()))
    }

    async fn active_roles(&self, party_id: &PartyId, at: DateTime<Utc>) -> Result<Vec<Role>> {
        let state = self.begin_read(GraphOperation::ActiveRoles).await?;
        Ok(state
            .roles
            .values()
            .filter(|role| &role.holder == party_id && role.is_active_at(at))
            .cloned()
            .collect())
    }

    async fn home_organization(&self, user_id: &UserId) -> Result<Option<Organization>> {
        let state = self.begin_read(GraphOperation::HomeOrganization).await?;
        let mut owned = state.organizations.values().filter(|organization| {
            state
                .parties
                .get(&organization.party_id)
                .is_some_and(|party| party.is_owned_by(user_id))
        });

        let home = owned.next().cloned();
        if let Some(extra) = owned.next() {
            debug!(
                user = %user_id,
                chosen = ?home.as_ref().map(|org| &org.id),
                ignored = %extra.id,
                "User owns more than one organization; using the lowest id"
            );
        }
        Ok(home)
    }

    async fn find_role(
        &self,
        holder: &PartyId,
        scope: &Scope,
        role_types: &[RoleType],
        at: DateTime<Utc>,
    ) -> Result<Option<Role>> {
        let state = self.begin_read(GraphOperation::FindRole).await?;
        Ok(state
            .roles
            .values()
            .find(|role| {
                &role.holder == holder
                    && role.covers(scope)
                    && role_types.contains(&role.role_type)
                    && role.is_active_at(at)
            })
            .cloned())
    }

    async fn user_party(&self, user_id: &UserId) -> Result<Option<PartyId>> {
        let state = self.begin_read(GraphOperation::UserParty).await?;
        Ok(state.user_parties.get(user_id).cloned())
    }
}

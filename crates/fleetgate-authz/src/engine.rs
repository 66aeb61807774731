//! The decision engine.
//!
//! Runs the ordered predicate chain for one (actor, target) pair:
//!
//! 1. Direct ownership of the target party
//! 2. Load every active affiliation (role) of the target
//! 3. Master delegation from the actor's home organization to any of the
//!    target's organizations
//! 4. Organization management of any of the target's organizations
//! 5. Location management of any of the target's locations
//! 6. Otherwise deny
//!
//! The predicates form a logical OR; the order decides which path is
//! reported and lets cheap checks run first. Only the paths the action-level
//! policy accepts for the requested level take part, so a path rejected at
//! that level never hides an accepted one further down the chain. Steps 3-5 quantify over *all*
//! of the target's active roles, never one arbitrarily chosen role. Reads for
//! different organizations/locations inside one step are issued concurrently.
//!
//! A store failure at any step yields [`Indeterminate`], never a grant.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use fleetgate_graph::{GraphAdapter, GraphError};
use fleetgate_types::{AccessPath, ActionLevel, LocationId, OrganizationId, PartyId, UserId};
use tracing::{debug, warn};

use crate::audit::{AuditEmitter, AuditRecord, TracingAuditSink};
use crate::cache::{ActorFacts, RequestScope};
use crate::clock::{Clock, SystemClock};
use crate::decision::{
    AccessDecision, AuthorizationResult, DecisionOutcome, Evaluation, Indeterminate,
};
use crate::policy::ActionPolicy;
use crate::resolver::{Ownership, RoleHierarchyResolver, DEFAULT_STORE_TIMEOUT};

/// Builder for [`DecisionEngine`].
pub struct EngineBuilder {
    graph: Arc<dyn GraphAdapter>,
    store_timeout: Duration,
    policy: ActionPolicy,
    audit: AuditEmitter,
    clock: Arc<dyn Clock>,
    cache_decisions: bool,
}

impl EngineBuilder {
    /// Sets the timeout applied to every graph read.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn policy(mut self, policy: ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the audit emitter. The default logs through `tracing`.
    pub fn audit(mut self, audit: AuditEmitter) -> Self {
        self.audit = audit;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enables or disables the request-scoped decision cache.
    pub fn cache_decisions(mut self, enabled: bool) -> Self {
        self.cache_decisions = enabled;
        self
    }

    pub fn build(self) -> DecisionEngine {
        DecisionEngine {
            resolver: RoleHierarchyResolver::new(self.graph).with_timeout(self.store_timeout),
            policy: self.policy,
            audit: self.audit,
            clock: self.clock,
            cache_decisions: self.cache_decisions,
        }
    }
}

/// Answers "may user U act on the records owned by party P?".
///
/// The engine holds no per-request state and can be shared across tasks
/// behind an `Arc`. Request-scoped memoization lives in [`RequestScope`].
pub struct DecisionEngine {
    resolver: RoleHierarchyResolver,
    policy: ActionPolicy,
    audit: AuditEmitter,
    clock: Arc<dyn Clock>,
    cache_decisions: bool,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("resolver", &self.resolver)
            .field("policy", &self.policy)
            .field("audit", &self.audit)
            .field("cache_decisions", &self.cache_decisions)
            .finish_non_exhaustive()
    }
}

impl DecisionEngine {
    /// Creates an engine with default settings over `graph`.
    pub fn new(graph: Arc<dyn GraphAdapter>) -> Self {
        Self::builder(graph).build()
    }

    pub fn builder(graph: Arc<dyn GraphAdapter>) -> EngineBuilder {
        EngineBuilder {
            graph,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            policy: ActionPolicy::default(),
            audit: AuditEmitter::disabled().with_sink(Arc::new(TracingAuditSink)),
            clock: Arc::new(SystemClock),
            cache_decisions: true,
        }
    }

    pub fn policy(&self) -> &ActionPolicy {
        &self.policy
    }

    pub fn caches_decisions(&self) -> bool {
        self.cache_decisions
    }

    /// Authorizes a read of `target`'s records by `actor`.
    pub async fn authorize(&self, actor: &UserId, target: &PartyId) -> AuthorizationResult {
        self.authorize_for(actor, target, ActionLevel::Read).await
    }

    /// Authorizes `level` access to `target`'s records by `actor`.
    ///
    /// Emits exactly one audit record.
    pub async fn authorize_for(
        &self,
        actor: &UserId,
        target: &PartyId,
        level: ActionLevel,
    ) -> AuthorizationResult {
        let at = self.now();
        let mut facts = ActorFacts::default();
        let evaluation = self.evaluate(actor, target, level, &mut facts, at).await;
        self.conclude(actor, target, level, at, evaluation, false)
    }

    /// Opens a request scope for `actor`.
    ///
    /// The scope memoizes decisions and actor facts until it is dropped. Drop
    /// it at the end of the request; never keep it across requests.
    pub fn begin_request(&self, actor: UserId) -> RequestScope<'_> {
        RequestScope::new(self, actor)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Runs the predicate chain for `level`.
    ///
    /// Steps whose path the policy does not accept at `level` are skipped, so
    /// an actor is granted whenever any accepted path matches. Ownership is
    /// always read because it also establishes that the subject exists.
    pub(crate) async fn evaluate(
        &self,
        actor: &UserId,
        target: &PartyId,
        level: ActionLevel,
        facts: &mut ActorFacts,
        at: DateTime<Utc>,
    ) -> Result<Evaluation, GraphError> {
        let resolver = &self.resolver;
        let accepts = |path| self.policy.accepts(level, path);

        // 1. Direct ownership (also establishes that the subject exists).
        match resolver.ownership(actor, target).await? {
            Ownership::Missing => return Ok(Evaluation::SubjectNotFound),
            Ownership::Owner if accepts(AccessPath::DirectOwner) => {
                return Ok(Evaluation::Granted(AccessPath::DirectOwner));
            }
            Ownership::Owner | Ownership::NotOwner => {}
        }

        let delegation = accepts(AccessPath::MasterDelegation);
        let org_management = accepts(AccessPath::OrgManager);
        let location_management = accepts(AccessPath::LocationManager);
        if !(delegation || org_management || location_management) {
            debug!(%level, "No affiliation path accepted at this level");
            return Ok(Evaluation::NoMatch);
        }

        // 2. Every active affiliation of the target.
        let roles = resolver.target_roles(target, at).await?;
        let organizations: BTreeSet<&OrganizationId> = roles
            .iter()
            .filter_map(|role| role.organization_id.as_ref())
            .collect();
        let locations: BTreeSet<&LocationId> = roles
            .iter()
            .filter_map(|role| role.location_id.as_ref())
            .collect();

        debug!(
            actor = %actor,
            target = %target,
            active_roles = roles.len(),
            organizations = organizations.len(),
            locations = locations.len(),
            "Resolved target affiliations"
        );

        if organizations.is_empty() && locations.is_empty() {
            return Ok(Evaluation::NoMatch);
        }

        // 3. Master delegation.
        if delegation && !organizations.is_empty() {
            if let Some(home) = facts.home_organization(resolver, actor).await? {
                let delegated = any_granted(organizations.iter().map(|org| {
                    resolver.has_master_delegation(&home.party_id, org, at)
                }))
                .await?;
                if delegated {
                    return Ok(Evaluation::Granted(AccessPath::MasterDelegation));
                }
            }
        }

        let check_orgs = org_management && !organizations.is_empty();
        let check_locations = location_management && !locations.is_empty();
        if !(check_orgs || check_locations) {
            return Ok(Evaluation::NoMatch);
        }

        let Some(holder) = facts.actor_party(resolver, actor).await? else {
            debug!(actor = %actor, "Actor has no person party; no management roles possible");
            return Ok(Evaluation::NoMatch);
        };

        // 4. Organization management.
        if check_orgs {
            let manages_org = any_granted(
                organizations
                    .iter()
                    .map(|org| resolver.holds_org_management(&holder, org, at)),
            )
            .await?;
            if manages_org {
                return Ok(Evaluation::Granted(AccessPath::OrgManager));
            }
        }

        // 5. Location management.
        if check_locations {
            let manages_location = any_granted(
                locations
                    .iter()
                    .map(|location| resolver.holds_location_management(&holder, location, at)),
            )
            .await?;
            if manages_location {
                return Ok(Evaluation::Granted(AccessPath::LocationManager));
            }
        }

        Ok(Evaluation::NoMatch)
    }

    /// Emits the audit record and produces the caller-facing result.
    pub(crate) fn conclude(
        &self,
        actor: &UserId,
        target: &PartyId,
        level: ActionLevel,
        at: DateTime<Utc>,
        evaluation: Result<Evaluation, GraphError>,
        cached: bool,
    ) -> AuthorizationResult {
        match evaluation {
            Ok(evaluation) => {
                let decision = Self::decide(actor, target, level, at, evaluation);
                self.audit
                    .emit(&AuditRecord::from_decision(&decision, cached));
                Ok(decision)
            }
            Err(cause) => {
                let indeterminate = Indeterminate {
                    acting_user_id: actor.clone(),
                    target_party_id: target.clone(),
                    level,
                    evaluated_at: at,
                    cause,
                };
                warn!(
                    actor = %actor,
                    target = %target,
                    error = %indeterminate.cause,
                    "Authorization indeterminate; failing closed"
                );
                self.audit
                    .emit(&AuditRecord::from_indeterminate(&indeterminate));
                Err(indeterminate)
            }
        }
    }

    fn decide(
        actor: &UserId,
        target: &PartyId,
        level: ActionLevel,
        at: DateTime<Utc>,
        evaluation: Evaluation,
    ) -> AccessDecision {
        let (outcome, path) = match evaluation {
            Evaluation::Granted(path) => (DecisionOutcome::Allowed, path),
            Evaluation::NoMatch => (DecisionOutcome::Forbidden, AccessPath::None),
            Evaluation::SubjectNotFound => (DecisionOutcome::SubjectNotFound, AccessPath::None),
        };

        AccessDecision {
            acting_user_id: actor.clone(),
            target_party_id: target.clone(),
            outcome,
            path,
            level,
            evaluated_at: at,
        }
    }
}

/// Fan-out/fan-in over independent checks. Any failure fails the whole step.
async fn any_granted<F>(checks: impl IntoIterator<Item = F>) -> Result<bool, GraphError>
where
    F: Future<Output = Result<bool, GraphError>>,
{
    let results = try_join_all(checks).await?;
    Ok(results.into_iter().any(|granted| granted))
}

//! Request-scoped decision cache.
//!
//! A handler that touches several records of the same driver, or that filters
//! a list of parties, asks the same question many times within one request.
//! [`RequestScope`] memoizes two things for the lifetime of one request:
//!
//! - the predicate-chain evaluation per (actor, target, level)
//! - facts about the actor (home organization, person party)
//!
//! Nothing outlives the scope, so a role revoked between two requests is
//! always observed by the second one. Indeterminate evaluations are never
//! memoized.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fleetgate_graph::GraphError;
use fleetgate_types::{ActionLevel, Organization, PartyId, UserId};
use tracing::debug;

use crate::decision::{AuthorizationResult, Evaluation, Indeterminate};
use crate::engine::DecisionEngine;
use crate::resolver::RoleHierarchyResolver;

// ============================================================================
// Actor facts
// ============================================================================

/// Lazily resolved, memoized facts about the acting user.
#[derive(Debug, Default)]
pub(crate) struct ActorFacts {
    home_organization: Option<Option<Organization>>,
    actor_party: Option<Option<PartyId>>,
}

impl ActorFacts {
    pub(crate) async fn home_organization(
        &mut self,
        resolver: &RoleHierarchyResolver,
        actor: &UserId,
    ) -> Result<Option<Organization>, GraphError> {
        if let Some(known) = &self.home_organization {
            return Ok(known.clone());
        }
        let resolved = resolver.home_organization_of(actor).await?;
        self.home_organization = Some(resolved.clone());
        Ok(resolved)
    }

    pub(crate) async fn actor_party(
        &mut self,
        resolver: &RoleHierarchyResolver,
        actor: &UserId,
    ) -> Result<Option<PartyId>, GraphError> {
        if let Some(known) = &self.actor_party {
            return Ok(known.clone());
        }
        let resolved = resolver.actor_party(actor).await?;
        self.actor_party = Some(resolved.clone());
        Ok(resolved)
    }
}

// ============================================================================
// Decision cache
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct CachedEvaluation {
    evaluation: Evaluation,
    evaluated_at: DateTime<Utc>,
}

type CacheKey = (UserId, PartyId, ActionLevel);

/// Memoized evaluations keyed by (actor, target, level).
///
/// The level is part of the key because the chain only walks the paths the
/// policy accepts at that level.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: HashMap<CacheKey, CachedEvaluation>,
}

impl DecisionCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every memoized evaluation for `target`.
    pub fn invalidate(&mut self, target: &PartyId) {
        self.entries
            .retain(|(_, cached_target, _), _| cached_target != target);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn get(
        &self,
        actor: &UserId,
        target: &PartyId,
        level: ActionLevel,
    ) -> Option<CachedEvaluation> {
        self.entries
            .get(&(actor.clone(), target.clone(), level))
            .copied()
    }

    fn insert(&mut self, key: CacheKey, entry: CachedEvaluation) {
        self.entries.insert(key, entry);
    }
}

// ============================================================================
// Request scope
// ============================================================================

/// All authorization work for one authenticated request.
///
/// Bound to a single acting user. Every call still emits its own audit
/// record, flagged `cached` when answered from memory.
#[derive(Debug)]
pub struct RequestScope<'e> {
    engine: &'e DecisionEngine,
    actor: UserId,
    facts: ActorFacts,
    cache: DecisionCache,
}

impl<'e> RequestScope<'e> {
    pub(crate) fn new(engine: &'e DecisionEngine, actor: UserId) -> Self {
        Self {
            engine,
            actor,
            facts: ActorFacts::default(),
            cache: DecisionCache::default(),
        }
    }

    pub fn actor(&self) -> &UserId {
        &self.actor
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Forgets memoized evaluations for `target`, e.g. after the handler
    /// itself changed the target's roles.
    pub fn invalidate(&mut self, target: &PartyId) {
        self.cache.invalidate(target);
    }

    /// Authorizes a read of `target`'s records.
    pub async fn authorize(&mut self, target: &PartyId) -> AuthorizationResult {
        self.authorize_for(target, ActionLevel::Read).await
    }

    /// Authorizes `level` access to `target`'s records.
    pub async fn authorize_for(&mut self, target: &PartyId, level: ActionLevel) -> AuthorizationResult {
        let caching = self.engine.caches_decisions();

        if caching {
            if let Some(hit) = self.cache.get(&self.actor, target, level) {
                debug!(actor = %self.actor, target = %target, %level, "Decision cache hit");
                return self.engine.conclude(
                    &self.actor,
                    target,
                    level,
                    hit.evaluated_at,
                    Ok(hit.evaluation),
                    true,
                );
            }
        }

        let at = self.engine.now();
        let evaluation = self
            .engine
            .evaluate(&self.actor, target, level, &mut self.facts, at)
            .await;

        if caching {
            if let Ok(evaluation) = &evaluation {
                self.cache.insert(
                    (self.actor.clone(), target.clone(), level),
                    CachedEvaluation {
                        evaluation: *evaluation,
                        evaluated_at: at,
                    },
                );
            }
        }

        self.engine
            .conclude(&self.actor, target, level, at, evaluation, false)
    }

    /// Returns the subset of `targets` the actor may access at `level`,
    /// in input order.
    ///
    /// Fails as a whole if any single evaluation is indeterminate.
    pub async fn filter_authorized(
        &mut self,
        targets: &[PartyId],
        level: ActionLevel,
    ) -> Result<Vec<PartyId>, Indeterminate> {
        let mut allowed = Vec::with_capacity(targets.len());
        for target in targets {
            if self.authorize_for(target, level).await?.allowed() {
                allowed.push(target.clone());
            }
        }
        Ok(allowed)
    }
}

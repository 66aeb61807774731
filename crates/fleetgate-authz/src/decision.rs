//! Decision results.

use chrono::{DateTime, Utc};
use fleetgate_graph::GraphError;
use fleetgate_types::{AccessPath, ActionLevel, PartyId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Final outcome of a completed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Allowed,
    /// Authenticated, subject exists, and no accepted path matched.
    Forbidden,
    /// The target party does not exist. Externally identical to a denial.
    SubjectNotFound,
}

/// The answer to "may this user perform this action on this party's records?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub acting_user_id: UserId,
    pub target_party_id: PartyId,
    pub outcome: DecisionOutcome,
    /// Accepted path that granted access, or [`AccessPath::None`].
    pub path: AccessPath,
    pub level: ActionLevel,
    pub evaluated_at: DateTime<Utc>,
}

impl AccessDecision {
    pub fn allowed(&self) -> bool {
        self.outcome == DecisionOutcome::Allowed
    }
}

/// Authorization could not be computed.
///
/// Never a denial and never an allow: callers must fail closed and report a
/// server-side error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Authorization indeterminate for {acting_user_id} on {target_party_id}: {cause}")]
pub struct Indeterminate {
    pub acting_user_id: UserId,
    pub target_party_id: PartyId,
    pub level: ActionLevel,
    pub evaluated_at: DateTime<Utc>,
    #[source]
    pub cause: GraphError,
}

/// Result of [`crate::DecisionEngine::authorize`].
pub type AuthorizationResult = std::result::Result<AccessDecision, Indeterminate>;

/// What the predicate chain found for one action level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Evaluation {
    Granted(AccessPath),
    NoMatch,
    SubjectNotFound,
}

//! Policy enforcement helpers.
//!
//! Turns authorization results into the responses an HTTP handler or a
//! sidecar returns. Every enforcement point fails closed: anything other than
//! an explicit allow becomes an error.

use fleetgate_types::{AccessPath, ActionLevel, PartyId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::decision::{AccessDecision, AuthorizationResult, DecisionOutcome};
use crate::engine::DecisionEngine;

/// Error type for policy enforcement.
///
/// Messages are deliberately generic so they can be returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnforcementError {
    /// No authenticated actor.
    #[error("authentication required")]
    Unauthenticated,

    /// The target does not exist. Only produced when the enforcer is
    /// configured to reveal missing subjects.
    #[error("not found")]
    NotFound,

    /// Authenticated, and no accepted path matched.
    #[error("access denied")]
    Forbidden,

    /// The decision could not be computed.
    #[error("service temporarily unavailable")]
    Unavailable,
}

impl EnforcementError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::NotFound => 404,
            Self::Forbidden => 403,
            Self::Unavailable => 503,
        }
    }
}

/// Result type for enforcement operations.
pub type Result<T> = std::result::Result<T, EnforcementError>;

/// Maps an authorization result with the default enforcer.
pub fn enforce(result: AuthorizationResult) -> Result<AccessDecision> {
    PolicyEnforcer::new().enforce(result)
}

/// Enforcement point configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEnforcer {
    reveal_missing: bool,
}

impl PolicyEnforcer {
    /// Creates an enforcer that reports missing subjects as forbidden.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports missing subjects as not found instead of forbidden.
    pub fn reveal_missing(mut self) -> Self {
        self.reveal_missing = true;
        self
    }

    /// Maps an authorization result to the handler's outcome.
    pub fn enforce(&self, result: AuthorizationResult) -> Result<AccessDecision> {
        match result {
            Ok(decision) => match decision.outcome {
                DecisionOutcome::Allowed => Ok(decision),
                DecisionOutcome::SubjectNotFound if self.reveal_missing => {
                    Err(EnforcementError::NotFound)
                }
                DecisionOutcome::SubjectNotFound | DecisionOutcome::Forbidden => {
                    Err(EnforcementError::Forbidden)
                }
            },
            Err(_) => Err(EnforcementError::Unavailable),
        }
    }

    /// Authorizes and enforces in one step.
    ///
    /// `actor` is `None` when the request carried no valid credentials; the
    /// engine is not consulted in that case.
    pub async fn require(
        &self,
        engine: &DecisionEngine,
        actor: Option<&UserId>,
        target: &PartyId,
        level: ActionLevel,
    ) -> Result<AccessDecision> {
        let Some(actor) = actor else {
            warn!(target = %target, "Rejected unauthenticated request");
            return Err(EnforcementError::Unauthenticated);
        };
        self.enforce(engine.authorize_for(actor, target, level).await)
    }
}

// ============================================================================
// Sidecar contract
// ============================================================================

/// Request body accepted by an authorization sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub acting_user_id: Option<String>,
    pub target_party_id: String,
    #[serde(default)]
    pub level: ActionLevel,
}

impl AuthorizeRequest {
    pub fn new(actor: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            acting_user_id: Some(actor.into()),
            target_party_id: target.into(),
            level: ActionLevel::Read,
        }
    }

    pub fn with_level(mut self, level: ActionLevel) -> Self {
        self.level = level;
        self
    }
}

/// Response body returned by an authorization sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub allowed: bool,
    pub path: AccessPath,
}

/// Status code and optional body of a sidecar reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarResponse {
    pub status: u16,
    pub body: Option<AuthorizeResponse>,
}

impl SidecarResponse {
    fn status(status: u16) -> Self {
        Self { status, body: None }
    }
}

/// Answers one sidecar request.
///
/// - 200 with a body for allow and deny (a missing subject is a deny)
/// - 400 when the target id is blank
/// - 401 when the actor is missing or blank
/// - 503 without a body when the decision is indeterminate
pub async fn respond(engine: &DecisionEngine, request: &AuthorizeRequest) -> SidecarResponse {
    let Some(actor) = request
        .acting_user_id
        .as_deref()
        .and_then(|raw| UserId::new(raw).ok())
    else {
        warn!("Sidecar request without an acting user");
        return SidecarResponse::status(401);
    };

    let Ok(target) = PartyId::new(request.target_party_id.as_str()) else {
        warn!(actor = %actor, "Sidecar request without a target party");
        return SidecarResponse::status(400);
    };

    match engine.authorize_for(&actor, &target, request.level).await {
        Ok(decision) => {
            let allowed = decision.allowed();
            info!(actor = %actor, target = %target, allowed, "Sidecar decision");
            SidecarResponse {
                status: 200,
                body: Some(AuthorizeResponse {
                    allowed,
                    path: if allowed { decision.path } else { AccessPath::None },
                }),
            }
        }
        Err(_) => SidecarResponse::status(503),
    }
}

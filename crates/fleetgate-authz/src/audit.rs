//! Decision audit trail.
//!
//! Every call to the engine produces exactly one [`AuditRecord`], whether it
//! allowed, denied, or could not decide. Records are handed to one or more
//! [`AuditSink`]s by the [`AuditEmitter`].
//!
//! # Failure policy
//!
//! Auditing is best-effort. A sink that is full, closed, or otherwise broken
//! is logged with `warn!` and skipped; the authorization call itself never
//! blocks on or fails because of the audit trail.
//!
//! ```text
//! AccessDecision / Indeterminate
//!          │
//!          ▼
//!    AuditEmitter ──► TracingAuditSink  (structured log line)
//!                 ──► MemoryAuditSink   (append-only, queryable)
//!                 ──► ChannelAuditSink  (bounded mpsc, try_send)
//! ```

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fleetgate_types::{AccessPath, ActionLevel, PartyId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::decision::{AccessDecision, DecisionOutcome, Indeterminate};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit sink is full")]
    Backpressure,

    #[error("Audit sink is closed")]
    Closed,

    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;

/// Audited outcome. Unlike [`DecisionOutcome`] this includes decisions that
/// could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Allowed,
    Forbidden,
    SubjectNotFound,
    Indeterminate,
}

impl From<DecisionOutcome> for AuditOutcome {
    fn from(outcome: DecisionOutcome) -> Self {
        match outcome {
            DecisionOutcome::Allowed => AuditOutcome::Allowed,
            DecisionOutcome::Forbidden => AuditOutcome::Forbidden,
            DecisionOutcome::SubjectNotFound => AuditOutcome::SubjectNotFound,
        }
    }
}

/// One audited authorization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub event_id: Uuid,
    pub acting_user_id: UserId,
    pub target_party_id: PartyId,
    pub allowed: bool,
    pub path: AccessPath,
    pub outcome: AuditOutcome,
    pub level: ActionLevel,
    pub evaluated_at: DateTime<Utc>,
    /// The decision was served from the request-scoped cache.
    pub cached: bool,
    /// Store failure behind an indeterminate outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl AuditRecord {
    pub fn from_decision(decision: &AccessDecision, cached: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            acting_user_id: decision.acting_user_id.clone(),
            target_party_id: decision.target_party_id.clone(),
            allowed: decision.allowed(),
            path: decision.path,
            outcome: decision.outcome.into(),
            level: decision.level,
            evaluated_at: decision.evaluated_at,
            cached,
            cause: None,
        }
    }

    pub fn from_indeterminate(indeterminate: &Indeterminate) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            acting_user_id: indeterminate.acting_user_id.clone(),
            target_party_id: indeterminate.target_party_id.clone(),
            allowed: false,
            path: AccessPath::None,
            outcome: AuditOutcome::Indeterminate,
            level: indeterminate.level,
            evaluated_at: indeterminate.evaluated_at,
            cached: false,
            cause: Some(indeterminate.cause.to_string()),
        }
    }
}

/// Destination for audit records.
///
/// Implementations must return promptly; anything slow belongs behind a
/// queue such as [`ChannelAuditSink`].
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> Result<()>;

    /// Short name used in failure logs.
    fn name(&self) -> &'static str;
}

/// Fans records out to every configured sink, logging and dropping failures.
#[derive(Clone, Default)]
pub struct AuditEmitter {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditEmitter")
            .field(
                "sinks",
                &self.sinks.iter().map(|sink| sink.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AuditEmitter {
    /// Creates an emitter with no sinks. Records are discarded.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.sinks.is_empty()
    }

    /// Hands the record to every sink. Never fails.
    pub fn emit(&self, record: &AuditRecord) {
        for sink in &self.sinks {
            if let Err(err) = sink.record(record) {
                warn!(
                    sink = sink.name(),
                    event_id = %record.event_id,
                    error = %err,
                    "Audit sink rejected record; continuing"
                );
            }
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Writes each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        if record.allowed {
            info!(
                target: "fleetgate::audit",
                event_id = %record.event_id,
                actor = %record.acting_user_id,
                target_party = %record.target_party_id,
                path = %record.path,
                level = %record.level,
                cached = record.cached,
                "Access granted"
            );
        } else {
            warn!(
                target: "fleetgate::audit",
                event_id = %record.event_id,
                actor = %record.acting_user_id,
                target_party = %record.target_party_id,
                outcome = ?record.outcome,
                path = %record.path,
                level = %record.level,
                cached = record.cached,
                cause = record.cause.as_deref().unwrap_or(""),
                "Access not granted"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Query filter for [`MemoryAuditSink`]. Fields combine with AND.
#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub actor: Option<UserId>,
    pub target: Option<PartyId>,
    pub outcome: Option<AuditOutcome>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn with_actor(mut self, actor: &UserId) -> Self {
        self.actor = Some(actor.clone());
        self
    }

    pub fn with_target(mut self, target: &PartyId) -> Self {
        self.target = Some(target.clone());
        self
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &AuditRecord) -> bool {
        self.actor
            .as_ref()
            .is_none_or(|actor| &record.acting_user_id == actor)
            && self
                .target
                .as_ref()
                .is_none_or(|target| &record.target_party_id == target)
            && self.outcome.is_none_or(|outcome| record.outcome == outcome)
    }
}

/// Append-only in-process audit log.
///
/// The API offers no way to modify or remove a record once appended.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.records.lock().map_or(0, |records| records.len())
    }

    /// Records matching `query`, in insertion order.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        let Ok(records) = self.records.lock() else {
            return Vec::new();
        };
        let matching = records.iter().filter(|record| query.matches(record)).cloned();
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.query(&AuditQuery::default())
    }

    /// Matching records as a pretty-printed JSON array.
    pub fn export_json(&self, query: &AuditQuery) -> Result<String> {
        let records = self.query(query);
        serde_json::to_string_pretty(&records).map_err(AuditError::from)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AuditError::Unavailable("audit log lock poisoned".to_string()))?;
        records.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Forwards records to a bounded channel for an out-of-band writer.
///
/// Uses `try_send` only: a full or closed channel is reported as an audit
/// failure rather than waited on.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: mpsc::Sender<AuditRecord>,
}

impl ChannelAuditSink {
    /// Creates a sink and the receiver the writer task drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        self.sender
            .try_send(record.clone())
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => AuditError::Backpressure,
                mpsc::error::TrySendError::Closed(_) => AuditError::Closed,
            })
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

//! Check command - evaluates one decision and prints it as JSON.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fleetgate_authz::{AccessPath, AuditOutcome, AuditRecord};
use fleetgate_config::FleetgateConfig;
use fleetgate_types::{ActionLevel, PartyId, UserId};
use serde::Serialize;

/// Exit code for a denial (forbidden or missing subject).
pub const EXIT_DENIED: u8 = 3;

/// Exit code when the decision could not be computed.
pub const EXIT_INDETERMINATE: u8 = 4;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    acting_user_id: UserId,
    target_party_id: PartyId,
    level: ActionLevel,
    outcome: AuditOutcome,
    allowed: bool,
    path: AccessPath,
    evaluated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    audit: Vec<AuditRecord>,
}

pub async fn run(
    config: &FleetgateConfig,
    snapshot: &Path,
    actor: &str,
    target: &str,
    level: ActionLevel,
    at: Option<&str>,
) -> Result<ExitCode> {
    let actor = UserId::new(actor).context("Invalid --actor")?;
    let target = PartyId::new(target).context("Invalid --target")?;
    let mut wiring = super::wire(config, snapshot, at)?;

    let mut report = match wiring.engine.authorize_for(&actor, &target, level).await {
        Ok(decision) => CheckReport {
            outcome: decision.outcome.into(),
            allowed: decision.allowed(),
            path: decision.path,
            evaluated_at: decision.evaluated_at,
            cause: None,
            acting_user_id: decision.acting_user_id,
            target_party_id: decision.target_party_id,
            level: decision.level,
            audit: Vec::new(),
        },
        Err(indeterminate) => CheckReport {
            outcome: AuditOutcome::Indeterminate,
            allowed: false,
            path: AccessPath::None,
            evaluated_at: indeterminate.evaluated_at,
            cause: Some(indeterminate.cause.to_string()),
            acting_user_id: indeterminate.acting_user_id,
            target_party_id: indeterminate.target_party_id,
            level: indeterminate.level,
            audit: Vec::new(),
        },
    };

    if let Some(memory) = &wiring.memory {
        report.audit = memory.records();
    }
    if let Some(channel) = wiring.channel.as_mut() {
        while let Ok(record) = channel.try_recv() {
            report.audit.push(record);
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(match report.outcome {
        AuditOutcome::Allowed => ExitCode::SUCCESS,
        AuditOutcome::Forbidden | AuditOutcome::SubjectNotFound => ExitCode::from(EXIT_DENIED),
        AuditOutcome::Indeterminate => ExitCode::from(EXIT_INDETERMINATE),
    })
}

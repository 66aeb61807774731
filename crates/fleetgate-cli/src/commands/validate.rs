//! Validate command - checks a snapshot for referential integrity.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use fleetgate_graph::GraphSnapshot;
use tracing::info;

pub fn run(snapshot: &Path) -> Result<ExitCode> {
    let loaded = GraphSnapshot::load(snapshot)
        .with_context(|| format!("Snapshot {} is invalid", snapshot.display()))?;

    info!(path = %snapshot.display(), "Snapshot validated");
    println!(
        "{}: {} parties, {} organizations, {} locations, {} roles, {} user links",
        snapshot.display(),
        loaded.parties.len(),
        loaded.organizations.len(),
        loaded.locations.len(),
        loaded.roles.len(),
        loaded.user_parties.len(),
    );
    Ok(ExitCode::SUCCESS)
}

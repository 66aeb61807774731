//! Configuration commands.

use std::process::ExitCode;

use anyhow::Result;
use fleetgate_config::FleetgateConfig;
use fleetgate_types::AccessPath;

/// Show the effective configuration.
pub fn show(config: &FleetgateConfig, format: &str) -> Result<ExitCode> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        "toml" => {
            println!("{}", toml::to_string_pretty(config)?);
        }
        _ => {
            println!("Fleetgate Configuration");
            println!("=======================\n");

            println!("Engine:");
            println!("  Store timeout: {}ms", config.engine.store_timeout_ms);
            println!("  Cache decisions: {}", config.engine.cache_decisions);
            println!();

            println!("Policy:");
            println!("  Read: {}", join(&config.policy.read));
            println!("  Write: {}", join(&config.policy.write));
            println!("  Delete: {}", join(&config.policy.delete));
            println!();

            println!("Audit:");
            println!("  Enabled: {}", config.audit.enabled);
            println!("  Sinks: {:?}", config.audit.sinks);
            println!("  Channel capacity: {}", config.audit.channel_capacity);
            println!();

            println!("Logging:");
            println!("  Level: {}", config.logging.level);
            println!("  Format: {:?}", config.logging.format);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn join(paths: &[AccessPath]) -> String {
    if paths.is_empty() {
        return "(nothing)".to_string();
    }
    paths
        .iter()
        .map(AccessPath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

//! Configuration management for Fleetgate
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (FLEETGATE_* prefix, highest precedence)
//! 2. fleetgate.local.toml (gitignored, local overrides)
//! 3. fleetgate.toml (git-tracked, deployment config)
//! 4. ~/.config/fleetgate/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use std::time::Duration;

use anyhow::Result;
use fleetgate_authz::ActionPolicy;
use fleetgate_types::{AccessPath, ActionLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Fleetgate configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetgateConfig {
    pub engine: EngineConfig,
    pub policy: PolicyConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied to every graph read, in milliseconds.
    pub store_timeout_ms: u64,
    /// Memoize decisions within a request.
    pub cache_decisions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 2000,
            cache_decisions: true,
        }
    }
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Accepted access paths per action level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub read: Vec<AccessPath>,
    pub write: Vec<AccessPath>,
    pub delete: Vec<AccessPath>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let policy = ActionPolicy::default();
        Self {
            read: policy.read.into_iter().collect(),
            write: policy.write.into_iter().collect(),
            delete: policy.delete.into_iter().collect(),
        }
    }
}

impl PolicyConfig {
    pub fn to_policy(&self) -> ActionPolicy {
        let levels = [
            (ActionLevel::Read, &self.read),
            (ActionLevel::Write, &self.write),
            (ActionLevel::Delete, &self.delete),
        ];
        levels
            .into_iter()
            .fold(ActionPolicy::empty(), |policy, (level, paths)| {
                paths
                    .iter()
                    .fold(policy, |policy, &path| policy.accept(level, path))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub sinks: Vec<AuditSinkKind>,
    /// Capacity of the bounded queue behind the `channel` sink.
    pub channel_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sinks: vec![AuditSinkKind::Tracing],
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuditSinkKind {
    Tracing,
    Memory,
    Channel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; overridden by `RUST_LOG`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FleetgateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.engine.store_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "engine.store_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.audit.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "audit.channel_capacity must be greater than zero".to_string(),
            ));
        }

        for (level, paths) in [
            ("read", &self.policy.read),
            ("write", &self.policy.write),
            ("delete", &self.policy.delete),
        ] {
            if paths.contains(&AccessPath::None) {
                return Err(ConfigError::ValidationError(format!(
                    "policy.{level} must not list \"none\""
                )));
            }
        }

        Ok(())
    }
}

//! Configuration loader with multi-source merging

use crate::{FleetgateConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    env_source: Option<config::Map<String, String>>,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "FLEETGATE".to_string(),
            env_source: None,
            include_user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "FLEETGATE")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read environment overrides from `vars` instead of the process
    /// environment.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_source = Some(
            vars.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    /// Skip ~/.config/fleetgate/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    ///
    /// Environment keys use `__` between section and field, e.g.
    /// `FLEETGATE_ENGINE__STORE_TIMEOUT_MS=500`. `FLEETGATE_AUDIT__SINKS`
    /// takes a comma-separated list.
    pub fn load(self) -> Result<FleetgateConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = FleetgateConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/fleetgate/config.toml)
        if self.include_user_config {
            if let Ok(user_config_file) = Paths::new().user_config_file() {
                if user_config_file.exists() {
                    builder = builder.add_source(
                        config::File::from(user_config_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Project config (fleetgate.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (fleetgate.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (FLEETGATE_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("audit.sinks")
                .try_parsing(true)
                .source(self.env_source),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let fleetgate_config: FleetgateConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        fleetgate_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(fleetgate_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditSinkKind, LogFormat};
    use fleetgate_types::{AccessPath, ActionLevel};
    use std::fs;
    use tempfile::tempdir;

    fn loader(project_dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(project_dir)
            .without_user_config()
            .with_env_vars(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config, FleetgateConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[engine]
store_timeout_ms = 750
cache_decisions = false

[policy]
delete = ["direct_owner", "org_manager"]

[audit]
sinks = ["tracing", "memory"]

[logging]
format = "json"
"#;
        fs::write(project_dir.join("fleetgate.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.engine.store_timeout_ms, 750);
        assert!(!config.engine.cache_decisions);
        assert_eq!(
            config.audit.sinks,
            vec![AuditSinkKind::Tracing, AuditSinkKind::Memory]
        );
        assert_eq!(config.logging.format, LogFormat::Json);

        let policy = config.policy.to_policy();
        assert!(!policy.accepts(ActionLevel::Delete, AccessPath::MasterDelegation));
        assert!(policy.accepts(ActionLevel::Delete, AccessPath::OrgManager));
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("fleetgate.toml"),
            r#"
[engine]
store_timeout_ms = 750
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("fleetgate.local.toml"),
            r#"
[engine]
store_timeout_ms = 100
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.engine.store_timeout_ms, 100);
    }

    #[test]
    fn test_env_overrides_files() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("fleetgate.local.toml"),
            r#"
[engine]
store_timeout_ms = 100
"#,
        )
        .expect("Failed to write local config");

        let config = loader(project_dir)
            .with_env_vars([
                ("FLEETGATE_ENGINE__STORE_TIMEOUT_MS", "250"),
                ("FLEETGATE_AUDIT__SINKS", "tracing,channel"),
                ("FLEETGATE_LOGGING__LEVEL", "debug"),
            ])
            .load()
            .expect("Failed to load config");

        assert_eq!(config.engine.store_timeout_ms, 250);
        assert_eq!(
            config.audit.sinks,
            vec![AuditSinkKind::Tracing, AuditSinkKind::Channel]
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_custom_env_prefix() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let config = loader(temp_dir.path())
            .with_env_prefix("GATE")
            .with_env_vars([
                ("GATE_ENGINE__STORE_TIMEOUT_MS", "300"),
                ("FLEETGATE_ENGINE__CACHE_DECISIONS", "false"),
            ])
            .load()
            .expect("Failed to load config");

        assert_eq!(config.engine.store_timeout_ms, 300);
        // Variables under the default prefix are ignored once it changes
        assert!(config.engine.cache_decisions);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("fleetgate.toml"),
            r#"
[policy]
read = ["none"]
"#,
        )
        .expect("Failed to write config");

        let err = loader(project_dir).load().unwrap_err();
        assert!(format!("{err:#}").contains("policy.read"));
    }
}

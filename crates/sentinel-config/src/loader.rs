//! Configuration loader with multi-source merging

use crate::{Paths, SentinelConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader rooted at the current directory
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "SENTINEL".to_string(),
            user_config: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "SENTINEL")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip `~/.config/sentinel/config.toml`.
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence, then validate.
    pub fn load(self) -> Result<SentinelConfig> {
        let toml_file = |path: PathBuf| {
            config::File::from(path)
                .required(false)
                .format(config::FileFormat::Toml)
        };
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = SentinelConfig::default();
        builder = builder.add_source(
            config::Config::try_from(&defaults).context("Failed to encode default configuration")?,
        );

        // 2. User config (~/.config/sentinel/config.toml)
        if self.user_config
            && let Ok(user_config_file) = Paths::new().user_config_file()
        {
            builder = builder.add_source(toml_file(user_config_file));
        }

        // 3. Project config (sentinel.toml)
        builder = builder.add_source(toml_file(Paths::project_config_file(&self.project_dir)));

        // 4. Local overrides (sentinel.local.toml)
        builder = builder.add_source(toml_file(Paths::local_config_file(&self.project_dir)));

        // 5. Environment variables: SENTINEL_APPROVAL__LOOKUP_LIMIT=50
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut sentinel_config: SentinelConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        sentinel_config.resolve_paths(&self.project_dir);
        sentinel_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(sentinel_config)
    }

    /// Load configuration or return defaults on any failure
    pub fn load_or_default(self) -> SentinelConfig {
        self.load().unwrap_or_default()
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
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("SENTINEL_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.approval.lookup_limit, 100);
        assert_eq!(config.break_glass.max_duration_secs, 14_400);
        assert_eq!(config.policy.path, temp_dir.path().join("policy.yaml"));
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[policy]
path = "/etc/sentinel/policy.yaml"

[approval]
max_duration_secs = 14400
lookup_limit = 25

[logging]
level = "sentinel=debug"
decision_log = "audit/decisions.jsonl"
stream = false
"#;
        fs::write(project_dir.join("sentinel.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.policy.path, PathBuf::from("/etc/sentinel/policy.yaml"));
        assert_eq!(config.approval.max_duration_secs, 14_400);
        assert_eq!(config.approval.lookup_limit, 25);
        assert_eq!(config.approval.default_duration_secs, 3_600);
        assert_eq!(config.logging.level, "sentinel=debug");
        assert_eq!(
            config.logging.decision_log,
            Some(project_dir.join("audit/decisions.jsonl"))
        );
        assert!(!config.logging.stream);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("sentinel.toml"),
            "[break_glass]\nlookup_limit = 10\ncooldown_secs = 60\n",
        )
        .expect("Failed to write project config");
        fs::write(
            project_dir.join("sentinel.local.toml"),
            "[break_glass]\nlookup_limit = 20\n",
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.break_glass.lookup_limit, 20);
        assert_eq!(config.break_glass.cooldown_secs, 60);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("sentinel.toml"),
            "[approval]\ndefault_duration_secs = 90000\n",
        )
        .expect("Failed to write config");

        let err = loader(temp_dir.path()).load().unwrap_err();
        assert!(err.downcast_ref::<crate::ConfigError>().is_some());
    }

    #[test]
    fn test_load_or_default_on_malformed_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("sentinel.toml"), "[approval\n")
            .expect("Failed to write config");

        let config = loader(temp_dir.path()).load_or_default();
        assert_eq!(config, SentinelConfig::default());
    }

    // Environment overrides use the same mechanism as the file layers:
    //
    // SENTINEL_APPROVAL__LOOKUP_LIMIT=50
    // SENTINEL_LOGGING__DECISION_LOG=/var/log/sentinel/decisions.jsonl
    //
    // Tests avoid mutating the process environment, which is shared across threads.
}

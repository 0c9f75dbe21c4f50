//! Configuration management for Sentinel
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`SENTINEL_*` prefix, `__` between section and key)
//! 2. sentinel.local.toml (not committed, local overrides)
//! 3. sentinel.toml (project config)
//! 4. ~/.config/sentinel/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

const HOUR: u64 = 60 * 60;

/// Main Sentinel configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub policy: PolicyConfig,
    pub approval: ApprovalConfig,
    pub break_glass: BreakGlassConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Access policy YAML. Recorded as `policy_path` in decision logs.
    pub path: PathBuf,
    pub approval_path: Option<PathBuf>,
    pub break_glass_path: Option<PathBuf>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("policy.yaml"),
            approval_path: None,
            break_glass_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub max_duration_secs: u64,
    pub default_duration_secs: u64,
    /// How long a pending request waits for an approver.
    pub request_ttl_secs: u64,
    pub lookup_limit: usize,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 8 * HOUR,
            default_duration_secs: HOUR,
            request_ttl_secs: 24 * HOUR,
            lookup_limit: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakGlassConfig {
    pub max_duration_secs: u64,
    pub lookup_limit: usize,
    pub cooldown_secs: u64,
    /// Invocations allowed per user inside `quota_window_secs`. Zero disables the quota.
    pub max_per_user: u32,
    pub quota_window_secs: u64,
}

impl Default for BreakGlassConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 4 * HOUR,
            lookup_limit: 100,
            cooldown_secs: 5 * 60,
            max_per_user: 3,
            quota_window_secs: 24 * HOUR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_duration_secs: u64,
    /// Longest session `authorize` will issue; longer requests are clamped.
    pub max_duration_secs: u64,
    /// Identifies this credential server in issued sessions.
    pub server_instance_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: HOUR,
            max_duration_secs: 12 * HOUR,
            server_instance_id: "sentinel".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append JSON-lines audit entries to this file.
    pub decision_log: Option<PathBuf>,
    /// Re-emit audit entries as `tracing` events.
    pub stream: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            decision_log: None,
            stream: true,
        }
    }
}

impl SentinelConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from a specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Reads a single TOML file, without layering or validation.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(value: u64, name: &str) -> Result<(), ConfigError> {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be positive")));
            }
            Ok(())
        }

        positive(self.approval.max_duration_secs, "approval.max_duration_secs")?;
        positive(self.approval.default_duration_secs, "approval.default_duration_secs")?;
        positive(self.approval.request_ttl_secs, "approval.request_ttl_secs")?;
        positive(self.approval.lookup_limit as u64, "approval.lookup_limit")?;
        positive(self.break_glass.max_duration_secs, "break_glass.max_duration_secs")?;
        positive(self.break_glass.lookup_limit as u64, "break_glass.lookup_limit")?;
        positive(self.break_glass.quota_window_secs, "break_glass.quota_window_secs")?;
        positive(self.session.default_duration_secs, "session.default_duration_secs")?;
        positive(self.session.max_duration_secs, "session.max_duration_secs")?;

        if self.approval.default_duration_secs > self.approval.max_duration_secs {
            return Err(ConfigError::Validation(
                "approval.default_duration_secs exceeds approval.max_duration_secs".to_string(),
            ));
        }
        if self.session.default_duration_secs > self.session.max_duration_secs {
            return Err(ConfigError::Validation(
                "session.default_duration_secs exceeds session.max_duration_secs".to_string(),
            ));
        }
        if self.session.server_instance_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "session.server_instance_id is required".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level is required".to_string()));
        }
        Ok(())
    }

    /// Resolve relative paths against `base_dir`
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.policy.path);
        for path in [
            &mut self.policy.approval_path,
            &mut self.policy.break_glass_path,
            &mut self.logging.decision_log,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }
}

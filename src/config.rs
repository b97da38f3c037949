use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Workspace name used when `-name` is not given.
pub const DEFAULT_WORKSPACE_NAME: &str = "main";

/// Port an infrastructure node listens on when `-port` is not given.
pub const DEFAULT_PORT: u16 = 20100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapPolicy {
    /// Workspace setup failures abort initialization.
    Strict,
    /// Setup failures are logged and initialization completes without a
    /// usable workspace.
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub join_timeout_secs: u64,
    pub bind_host: String,
    pub bootstrap_policy: BootstrapPolicy,
    pub inspector_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            join_timeout_secs: 30,
            bind_host: "0.0.0.0".to_string(),
            bootstrap_policy: BootstrapPolicy::Strict,
            inspector_history: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Reads a TOML file, then applies environment overrides on top.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(secs) = std::env::var("AGENTSPACE_JOIN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.join_timeout_secs = secs;
        }
        if let Ok(host) = std::env::var("AGENTSPACE_BIND_HOST") {
            self.bind_host = host;
        }
        if let Ok(flag) = std::env::var("AGENTSPACE_LENIENT_BOOTSTRAP") {
            self.bootstrap_policy = if flag == "true" || flag == "1" {
                BootstrapPolicy::Lenient
            } else {
                BootstrapPolicy::Strict
            };
        }
        if let Some(history) = std::env::var("AGENTSPACE_INSPECTOR_HISTORY")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.inspector_history = history;
        }
        self
    }
}

//! Configuration management for Genflow
//!
//! Runtime knobs for retries, timeouts, circuit breaking, providers,
//! and output location. Loaded from `genflow.toml` when present,
//! otherwise defaults apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{GenflowError, Result};

/// Application-level Genflow configuration
///
/// Loaded from `genflow.toml` in the working directory (or an explicit
/// path) via [`GenflowConfig::load_or_default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenflowConfig {
    /// Retry budget per task against the same provider
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Timeout for a single provider call, in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Directory for per-session output and state snapshots
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Circuit breaker tuning
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// Providers to register at startup
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Circuit breaker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Failures only count as consecutive within this window, in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Cooldown before an open circuit allows a half-open trial, in seconds
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

/// One provider endpoint registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier used by the routing table
    pub name: String,

    /// HTTP endpoint accepting generation requests
    pub endpoint: String,

    /// Environment variable holding the bearer token, if any
    #[serde(default)]
    pub api_key_env: Option<String>,
}

// Default value providers
fn default_max_retries() -> u32 {
    2
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cooldown_seconds() -> u64 {
    60
}

impl GenflowConfig {
    /// Load configuration from the given path or use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| GenflowError::Config(format!("Failed to parse {}: {}", path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default configuration to the given path
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| GenflowError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for GenflowConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout_seconds(),
            output_dir: default_output_dir(),
            circuit: CircuitConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            window_seconds: default_window_seconds(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GenflowConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout_seconds, 120);
        assert_eq!(config.circuit.failure_threshold, 3);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenflowConfig::load_or_default(&dir.path().join("genflow.toml")).unwrap();
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_load_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genflow.toml");
        std::fs::write(
            &path,
            r#"
max_retries = 1

[circuit]
failure_threshold = 5

[[providers]]
name = "chatgpt"
endpoint = "http://localhost:9000/generate"
"#,
        )
        .unwrap();

        let config = GenflowConfig::load_or_default(&path).unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.circuit.failure_threshold, 5);
        // Unspecified fields keep their defaults
        assert_eq!(config.circuit.cooldown_seconds, 60);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, "chatgpt");
        assert!(config.providers[0].api_key_env.is_none());
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genflow.toml");
        GenflowConfig::write_default(&path).unwrap();

        let config = GenflowConfig::load_or_default(&path).unwrap();
        assert_eq!(config.timeout_seconds, 120);
    }
}

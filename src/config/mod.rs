//! Configuration management for the X-Touch OBS mixer
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every section is optional; the binary falls back to the defaults when
//! the file is missing or broken.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::midi::STRIPS_PER_BANK;
use crate::state::DEFAULT_DEBOUNCE_MS;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub obs: ObsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control surface selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurfaceConfig {
    /// Substring matched (case-insensitive) against MIDI port names
    #[serde(default = "default_device_signature")]
    pub device_signature: String,
    /// Which of the matching ports to open
    #[serde(default)]
    pub device_index: usize,
    #[serde(default = "default_strip_count")]
    pub strip_count: u8,
}

/// OBS WebSocket configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,
    #[serde(default = "default_obs_port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Layout persistence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    /// sled directory; defaults to the application state directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Also write a daily rolling log file
    #[serde(default)]
    pub file: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            device_signature: default_device_signature(),
            device_index: 0,
            strip_count: default_strip_count(),
        }
    }
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Apply environment overrides (`OBS_PASSWORD`)
    pub fn apply_env(&mut self) {
        if let Ok(password) = std::env::var("OBS_PASSWORD") {
            if !password.is_empty() {
                self.obs.password = Some(password);
            }
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.surface.device_signature.trim().is_empty() {
            anyhow::bail!("surface.device_signature cannot be empty");
        }
        if !(1..=STRIPS_PER_BANK).contains(&self.surface.strip_count) {
            anyhow::bail!(
                "surface.strip_count must be between 1 and {} (got {})",
                STRIPS_PER_BANK,
                self.surface.strip_count
            );
        }
        if self.obs.host.is_empty() {
            anyhow::bail!("obs.host cannot be empty");
        }
        if self.obs.port == 0 {
            anyhow::bail!("obs.port cannot be 0");
        }
        Ok(())
    }
}

fn default_device_signature() -> String { "X-Touch-Ext".to_string() }
fn default_strip_count() -> u8 { STRIPS_PER_BANK }
fn default_obs_host() -> String { "localhost".to_string() }
fn default_obs_port() -> u16 { 4455 }
fn default_request_timeout() -> u64 { 5000 }
fn default_debounce_ms() -> u64 { DEFAULT_DEBOUNCE_MS }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            r#"
surface:
  device_index: 1
obs:
  port: 4460
  password: secret
"#,
        )
        .unwrap();

        assert_eq!(config.surface.device_signature, "X-Touch-Ext");
        assert_eq!(config.surface.device_index, 1);
        assert_eq!(config.surface.strip_count, 8);
        assert_eq!(config.obs.host, "localhost");
        assert_eq!(config.obs.port, 4460);
        assert_eq!(config.obs.password.as_deref(), Some("secret"));
        assert_eq!(config.state.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert!(!config.logging.file);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.surface.strip_count = 9;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.surface.strip_count = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.surface.device_signature = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.obs.port = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "surface:\n  strip_count: 4\nlogging:\n  file: true").unwrap();

        let config = AppConfig::load(file.path()).await.unwrap();
        assert_eq!(config.surface.strip_count, 4);
        assert!(config.logging.file);
    }

    #[tokio::test]
    async fn test_broken_or_missing_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "surface: [not, a, map").unwrap();

        let err = AppConfig::load(file.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse YAML"));

        assert!(AppConfig::load("/nonexistent/config.yaml").await.is_err());
    }
}

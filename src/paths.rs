//! Application path resolution
//!
//! A `config.yaml` in the working directory wins: config, layout database
//! and logs then all live next to it. Otherwise the platform directories
//! are used (`~/.config/xtouch-obs-mixer` and `~/.local/share/xtouch-obs-mixer`
//! on Linux, `%APPDATA%` on Windows).

use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used below the platform directories
const APP_DIR: &str = "xtouch-obs-mixer";

/// Application paths for config, state, and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Directory holding the sled layout database
    pub state_dir: PathBuf,
    /// Directory for rolling log files
    pub logs_dir: PathBuf,
}

impl AppPaths {
    /// Everything below one directory
    pub fn local(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            config: base.join("config.yaml"),
            state_dir: base.join(".state"),
            logs_dir: base.join("logs"),
        }
    }

    /// Resolve the paths for this run
    ///
    /// Called before logging is initialized.
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if cwd.join("config.yaml").exists() {
            return Self::local(cwd);
        }

        let (Some(config_dir), Some(data_dir)) = (dirs::config_dir(), dirs::data_dir()) else {
            eprintln!("[paths] no platform directories, using the working directory");
            return Self::local(cwd);
        };

        let data = data_dir.join(APP_DIR);
        Self {
            config: config_dir.join(APP_DIR).join("config.yaml"),
            state_dir: data.join("state"),
            logs_dir: data.join("logs"),
        }
    }

    /// sled database location inside the state directory
    pub fn layout_db(&self) -> PathBuf {
        self.state_dir.join("sled")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.state_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_local_layout() {
        let paths = AppPaths::local("/srv/mixer");
        assert_eq!(paths.config, PathBuf::from("/srv/mixer/config.yaml"));
        assert_eq!(paths.layout_db(), PathBuf::from("/srv/mixer/.state/sled"));
        assert_eq!(paths.logs_dir, PathBuf::from("/srv/mixer/logs"));
    }

    #[test]
    fn test_ensure_directories_creates_state_and_logs() {
        let temp = tempdir().unwrap();
        let paths = AppPaths::local(temp.path());

        paths.ensure_directories().unwrap();
        assert!(paths.state_dir.is_dir());
        assert!(paths.logs_dir.is_dir());

        // Idempotent
        paths.ensure_directories().unwrap();
    }
}

//! Storage configuration and path management.
//!
//! `StorageConfig` is the single place that decides where workday data lives.
//! Production code uses `StorageConfig::default()` (`$WORKDAY_HOME` or `~/.workday`);
//! tests use `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

/// Overrides the default data root when set.
pub const ROOT_ENV_VAR: &str = "WORKDAY_HOME";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
            return Self {
                root: PathBuf::from(root),
            };
        }
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            root: home.join(".workday"),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to settings.json (workday + lunch configuration).
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Path to sessions.json (current session + history).
    pub fn sessions_file(&self) -> PathBuf {
        self.root.join("sessions.json")
    }

    /// Path to daemon.toml (host poll loop configuration).
    pub fn daemon_config_file(&self) -> PathBuf {
        self.root.join("daemon.toml")
    }

    /// Path to daemon.pid, present while a `run` loop owns the store.
    pub fn daemon_pid_file(&self) -> PathBuf {
        self.root.join("daemon.pid")
    }

    /// Directory of pending CLI requests for a running daemon.
    pub fn intents_dir(&self) -> PathBuf {
        self.root.join("intents")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_root() {
        let storage = StorageConfig::with_root(PathBuf::from("/tmp/workday-test"));
        assert_eq!(
            storage.settings_file(),
            PathBuf::from("/tmp/workday-test/settings.json")
        );
        assert_eq!(
            storage.sessions_file(),
            PathBuf::from("/tmp/workday-test/sessions.json")
        );
        assert_eq!(
            storage.daemon_config_file(),
            PathBuf::from("/tmp/workday-test/daemon.toml")
        );
        assert_eq!(
            storage.daemon_pid_file(),
            PathBuf::from("/tmp/workday-test/daemon.pid")
        );
        assert_eq!(
            storage.intents_dir(),
            PathBuf::from("/tmp/workday-test/intents")
        );
        assert_eq!(storage.logs_dir(), PathBuf::from("/tmp/workday-test/logs"));
    }
}

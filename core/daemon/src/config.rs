//! Daemon runtime configuration (`daemon.toml`).
//!
//! Every key is optional. A missing file means defaults.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_LOCK_POLL_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds between engine ticks (rollover, overtime, save).
    pub poll_interval_secs: u64,
    /// Detect lunch from screen lock signals.
    pub lock_detection: bool,
    /// Seconds between lock state reads.
    pub lock_poll_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            lock_detection: true,
            lock_poll_interval_secs: DEFAULT_LOCK_POLL_INTERVAL_SECS,
        }
    }
}

impl DaemonConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_secs(self.lock_poll_interval_secs.max(1))
    }
}

pub fn load(path: &Path) -> Result<DaemonConfig, String> {
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = fs_err::read_to_string(path)
        .map_err(|err| format!("Failed to read daemon config {}: {}", path.display(), err))?;
    toml::from_str::<DaemonConfig>(&content)
        .map_err(|err| format!("Failed to parse daemon config {}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = load(&temp_dir.path().join("daemon.toml")).expect("load config");
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.toml");
        fs_err::write(&path, "poll_interval_secs = 30\nlock_detection = false\n").expect("write");

        let config = load(&path).expect("load config");
        assert_eq!(config.poll_interval_secs, 30);
        assert!(!config.lock_detection);
        assert_eq!(config.lock_poll_interval_secs, DEFAULT_LOCK_POLL_INTERVAL_SECS);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.toml");
        fs_err::write(&path, "poll_interval_secs = \"often\"").expect("write");

        let err = load(&path).expect_err("should fail");
        assert!(err.contains("Failed to parse daemon config"));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let config = DaemonConfig {
            poll_interval_secs: 0,
            lock_poll_interval_secs: 0,
            ..DaemonConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.lock_poll_interval(), Duration::from_secs(1));
    }
}

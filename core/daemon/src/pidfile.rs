//! `daemon.pid`: marks the store as owned by a running `run` loop.
//!
//! While the file names a live process, one-shot commands queue their
//! changes for the daemon instead of writing the store themselves.

use fs_err as fs;
use std::path::{Path, PathBuf};

/// Removes the pid file when dropped, if it still names this process.
#[derive(Debug)]
pub struct PidFileGuard {
    path: PathBuf,
    pid: u32,
}

impl PidFileGuard {
    /// Claims the store for this process. Fails if another live daemon holds it.
    pub fn acquire(path: &Path) -> Result<Self, String> {
        let pid = std::process::id();
        if let Some(other) = running_daemon(path) {
            if other != pid {
                return Err(format!(
                    "Another workday daemon is already running (pid {})",
                    other
                ));
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
        fs::write(path, format!("{}\n", pid)).map_err(|err| err.to_string())?;
        tracing::debug!(pid, path = %path.display(), "Wrote daemon pid file");
        Ok(Self {
            path: path.to_path_buf(),
            pid,
        })
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if read_pid(&self.path) == Some(self.pid) {
            if let Err(err) = fs::remove_file(&self.path) {
                tracing::warn!(error = %err, "Failed to remove daemon pid file");
            }
        }
    }
}

/// Pid of the daemon that owns the store, if one is alive. A pid file left
/// behind by a dead process is removed.
pub fn running_daemon(path: &Path) -> Option<u32> {
    let pid = read_pid(path)?;
    if is_pid_alive(pid) {
        return Some(pid);
    }
    tracing::info!(pid, "Removing stale daemon pid file");
    let _ = fs::remove_file(path);
    None
}

fn read_pid(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    content.trim().parse().ok().filter(|pid| *pid > 0)
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn is_pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs the existence and permission check only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn is_pid_alive(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_pid_marks_daemon_running() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.pid");
        assert_eq!(running_daemon(&path), None);

        {
            let _guard = PidFileGuard::acquire(&path).expect("acquire");
            assert_eq!(running_daemon(&path), Some(std::process::id()));
        }
        assert!(!path.exists());
        assert_eq!(running_daemon(&path), None);
    }

    #[cfg(unix)]
    #[test]
    fn stale_pid_file_is_cleared() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.pid");
        // Above the default Linux pid_max, so never a live process.
        std::fs::write(&path, "2147483647\n").unwrap();

        assert_eq!(running_daemon(&path), None);
        assert!(!path.exists());
    }

    #[test]
    fn unreadable_pid_file_is_ignored() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.pid");
        std::fs::write(&path, "not a pid").unwrap();
        assert_eq!(running_daemon(&path), None);

        let _guard = PidFileGuard::acquire(&path).expect("acquire over garbage");
        assert_eq!(running_daemon(&path), Some(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn second_daemon_is_refused() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("daemon.pid");
        // pid 1 is always alive.
        std::fs::write(&path, "1\n").unwrap();

        let err = PidFileGuard::acquire(&path).unwrap_err();
        assert!(err.contains("pid 1"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n");
    }
}

//! Requests from one-shot commands to a running daemon.
//!
//! Each request is one JSON file in `<root>/intents/`, written atomically
//! (temp file + rename) so the daemon never reads a partial file. The daemon
//! applies them in name order on its next tick and deletes them.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use workday_core::{StorageConfig, WorkdayEngine};

use crate::commands::PauseAction;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "lowercase")]
pub enum Intent {
    Pause,
    Resume,
    Toggle,
    Reset,
}

impl From<PauseAction> for Intent {
    fn from(action: PauseAction) -> Self {
        match action {
            PauseAction::Pause => Intent::Pause,
            PauseAction::Resume => Intent::Resume,
            PauseAction::Toggle => Intent::Toggle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntentQueue {
    dir: PathBuf,
}

impl IntentQueue {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            dir: storage.intents_dir(),
        }
    }

    /// Queues one request. Returns the file it was written to.
    pub fn push(&self, intent: Intent) -> Result<PathBuf, String> {
        fs::create_dir_all(&self.dir).map_err(|err| err.to_string())?;
        let content = serde_json::to_vec(&intent)
            .map_err(|err| format!("Failed to serialize request: {}", err))?;

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|err| format!("Failed to create temp file: {}", err))?;
        tmp.write_all(&content)
            .map_err(|err| format!("Failed to write request: {}", err))?;

        let path = self.dir.join(next_file_name());
        tmp.persist_noclobber(&path)
            .map_err(|err| format!("Failed to queue request: {}", err.error))?;
        tracing::debug!(?intent, path = %path.display(), "Queued request for daemon");
        Ok(path)
    }

    /// Takes every queued request, oldest first. Unreadable files are dropped.
    pub fn drain(&self) -> Vec<Intent> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, dir = %self.dir.display(), "Failed to read request queue");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_request_file(path))
            .collect();
        paths.sort();

        let mut intents = Vec::with_capacity(paths.len());
        for path in paths {
            match read_intent(&path) {
                Ok(intent) => intents.push(intent),
                Err(err) => tracing::warn!(error = %err, "Dropping unreadable request"),
            }
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!(error = %err, "Failed to remove request file");
            }
        }
        intents
    }
}

/// Applies one request to the engine the daemon owns.
pub fn apply(engine: &mut WorkdayEngine, intent: Intent) -> Result<(), String> {
    match intent {
        Intent::Pause => engine.pause(),
        Intent::Resume => engine.resume(),
        Intent::Toggle => {
            engine.toggle_pause();
        }
        Intent::Reset => engine.reset_day()?,
    }
    tracing::info!(?intent, "Applied request from command line");
    Ok(())
}

fn next_file_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or(0);
    let seq = SEQUENCE.fetch_add(1, Ordering::SeqCst);
    format!("{:024}-{}-{:06}.json", nanos, std::process::id(), seq)
}

fn is_request_file(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| !name.starts_with('.'));
    visible && path.extension().is_some_and(|ext| ext == "json")
}

fn read_intent(path: &Path) -> Result<Intent, String> {
    let content = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&content)
        .map_err(|err| format!("{}: {}", path.display(), err))
}

//! Persistence collaborator: whole-document load and save of settings and sessions.
//!
//! # Failure Handling
//!
//! Loads never fail. A missing file, an empty file, or corrupt JSON yields the
//! default document (with a warning for the corrupt case). Save errors are
//! returned to the caller.
//!
//! # Atomic Writes
//!
//! File-backed saves write a temp file in the target directory, then rename it
//! over the destination, so a crash mid-write never leaves a truncated document.

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use crate::error::{Result, WorkdayError};
use crate::session::SessionStore;
use crate::settings::Settings;
use crate::storage::StorageConfig;

pub trait Persistence: Send {
    /// Settings, or defaults when missing or unreadable.
    fn load_settings(&self) -> Settings;
    fn save_settings(&self, settings: &Settings) -> Result<()>;
    /// Session store, or an empty store when missing or unreadable.
    fn load_sessions(&self) -> SessionStore;
    fn save_sessions(&self, store: &SessionStore) -> Result<()>;
}

/// Parses a whole document, falling back to `T::default()` on empty or corrupt input.
fn parse_document<T: DeserializeOwned + Default>(content: &str, what: &str) -> T {
    if content.trim().is_empty() {
        tracing::warn!(document = what, "Empty document, using defaults");
        return T::default();
    }
    match serde_json::from_str::<T>(content) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::warn!(document = what, error = %err, "Corrupt document, using defaults");
            T::default()
        }
    }
}

fn serialize_document<T: Serialize>(doc: &T, what: &str) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(|source| WorkdayError::Json {
        context: format!("Failed to serialize {}", what),
        source,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// File-backed persistence
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON files under a [`StorageConfig`] root.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    storage: StorageConfig,
}

impl JsonFilePersistence {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    fn read_document<T: DeserializeOwned + Default>(&self, path: &Path, what: &str) -> T {
        match fs::read_to_string(path) {
            Ok(content) => parse_document(&content, what),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(document = what, path = %path.display(), "No document yet, using defaults");
                T::default()
            }
            Err(err) => {
                tracing::warn!(document = what, error = %err, "Failed to read document, using defaults");
                T::default()
            }
        }
    }

    fn write_document<T: Serialize>(&self, path: &Path, doc: &T, what: &str) -> Result<()> {
        let content = serialize_document(doc, what)?;

        let parent_dir = path
            .parent()
            .ok_or_else(|| WorkdayError::NoParentDir(path.to_path_buf()))?;
        fs::create_dir_all(parent_dir).map_err(|source| WorkdayError::Io {
            context: format!("Failed to create {}", parent_dir.display()),
            source,
        })?;

        let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(|source| WorkdayError::Io {
            context: format!("Failed to create temp file for {}", what),
            source,
        })?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|source| WorkdayError::Io {
                context: format!("Failed to write temp {}", what),
                source,
            })?;
        temp_file.flush().map_err(|source| WorkdayError::Io {
            context: format!("Failed to flush temp {}", what),
            source,
        })?;
        temp_file.persist(path).map_err(|err| WorkdayError::Io {
            context: format!("Failed to replace {}", path.display()),
            source: err.error,
        })?;

        Ok(())
    }
}

impl Persistence for JsonFilePersistence {
    fn load_settings(&self) -> Settings {
        self.read_document::<Settings>(&self.storage.settings_file(), "settings")
            .normalized()
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.write_document(&self.storage.settings_file(), settings, "settings")
    }

    fn load_sessions(&self) -> SessionStore {
        self.read_document(&self.storage.sessions_file(), "sessions")
    }

    fn save_sessions(&self, store: &SessionStore) -> Result<()> {
        self.write_document(&self.storage.sessions_file(), store, "sessions")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory persistence
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct MemoryDocuments {
    settings: Option<String>,
    sessions: Option<String>,
    fail_writes: bool,
    session_saves: usize,
}

/// Keeps serialized documents in memory. Clones share the same documents, so a
/// test can hand one clone to the engine and inspect through another.
///
/// Documents are stored as JSON text and parsed on load, so a restart through
/// this store exercises the same encoding as the file store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    docs: Arc<Mutex<MemoryDocuments>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the sessions document with raw JSON (useful for corrupt-input tests).
    pub fn with_raw_sessions(self, json: &str) -> Self {
        self.lock().sessions = Some(json.to_string());
        self
    }

    /// Makes every subsequent save fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful session saves so far.
    pub fn session_saves(&self) -> usize {
        self.lock().session_saves
    }

    pub fn raw_sessions(&self) -> Option<String> {
        self.lock().sessions.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryDocuments> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(docs: &MemoryDocuments, what: &str) -> Result<()> {
        if docs.fail_writes {
            return Err(WorkdayError::Io {
                context: format!("Failed to write {}", what),
                source: std::io::Error::new(std::io::ErrorKind::Other, "write disabled"),
            });
        }
        Ok(())
    }
}

impl Persistence for MemoryPersistence {
    fn load_settings(&self) -> Settings {
        match self.lock().settings.as_deref() {
            Some(content) => parse_document::<Settings>(content, "settings").normalized(),
            None => Settings::default(),
        }
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        let content = serialize_document(settings, "settings")?;
        let mut docs = self.lock();
        Self::check_writable(&docs, "settings")?;
        docs.settings = Some(content);
        Ok(())
    }

    fn load_sessions(&self) -> SessionStore {
        match self.lock().sessions.as_deref() {
            Some(content) => parse_document(content, "sessions"),
            None => SessionStore::default(),
        }
    }

    fn save_sessions(&self, store: &SessionStore) -> Result<()> {
        let content = serialize_document(store, "sessions")?;
        let mut docs = self.lock();
        Self::check_writable(&docs, "sessions")?;
        docs.sessions = Some(content);
        docs.session_saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DaySession;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_store() -> SessionStore {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let mut store = SessionStore::default();
        let mut done = DaySession::start(date, date.and_hms_opt(8, 0, 0).unwrap());
        done.effective_minutes = 481.5;
        store.archive(done);
        let next = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        store.current = Some(DaySession::start(next, next.and_hms_opt(9, 15, 0).unwrap()));
        store
    }

    #[test]
    fn file_store_defaults_when_missing() {
        let temp = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(StorageConfig::with_root(temp.path().join("nested")));

        assert_eq!(persistence.load_settings(), Settings::default());
        assert_eq!(persistence.load_sessions(), SessionStore::default());
    }

    #[test]
    fn file_store_round_trips_and_creates_root() {
        let temp = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(StorageConfig::with_root(temp.path().join("nested")));
        let store = sample_store();

        persistence.save_sessions(&store).unwrap();
        assert_eq!(persistence.load_sessions(), store);

        let settings = Settings {
            workday_minutes: 420,
            ..Settings::default()
        };
        persistence.save_settings(&settings).unwrap();
        assert_eq!(persistence.load_settings(), settings);
    }

    #[test]
    fn file_store_recovers_from_corrupt_json() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        fs::write(storage.sessions_file(), "{ not json").unwrap();
        fs::write(storage.settings_file(), "").unwrap();

        let persistence = JsonFilePersistence::new(storage);
        assert_eq!(persistence.load_sessions(), SessionStore::default());
        assert_eq!(persistence.load_settings(), Settings::default());
    }

    #[test]
    fn file_store_surfaces_write_failures() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();

        let persistence = JsonFilePersistence::new(StorageConfig::with_root(blocker.join("root")));
        assert!(persistence.save_sessions(&sample_store()).is_err());
    }

    #[test]
    fn memory_store_shares_documents_between_clones() {
        let persistence = MemoryPersistence::new();
        let observer = persistence.clone();

        persistence.save_sessions(&sample_store()).unwrap();

        assert_eq!(observer.load_sessions(), sample_store());
        assert_eq!(observer.session_saves(), 1);
    }

    #[test]
    fn memory_store_can_fail_writes() {
        let persistence = MemoryPersistence::new();
        persistence.set_fail_writes(true);

        assert!(matches!(
            persistence.save_sessions(&SessionStore::default()),
            Err(WorkdayError::Io { .. })
        ));
        assert_eq!(persistence.session_saves(), 0);
    }
}

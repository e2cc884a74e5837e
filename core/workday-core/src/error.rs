//! Error types for workday-core operations.
//!
//! Reads never surface errors (they degrade to defaults); these types cover
//! writes, settings validation, and lock monitoring.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Engine / Storage Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors that can occur in workday-core operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkdayError {
    // ─────────────────────────────────────────────────────────────────────
    // Settings Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid setting {field}: {reason}")]
    InvalidSettings { field: &'static str, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Storage path has no parent directory: {0}")]
    NoParentDir(PathBuf),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Lock Monitoring Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    LockSource(#[from] LockSourceError),
}

/// Convenience type alias for Results using WorkdayError.
pub type Result<T> = std::result::Result<T, WorkdayError>;

/// Failure to start delivering OS lock/unlock signals.
///
/// `Unavailable` is the expected degraded mode (no lock signal on this
/// platform or session). `Failed` means something that should have worked did not.
/// Either way the engine keeps running without lunch auto-detection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockSourceError {
    #[error("Lock events unavailable: {0}")]
    Unavailable(String),

    #[error("Lock event subscription failed: {0}")]
    Failed(String),
}

impl LockSourceError {
    pub fn is_degraded_mode(&self) -> bool {
        matches!(self, LockSourceError::Unavailable(_))
    }
}

impl From<WorkdayError> for String {
    fn from(err: WorkdayError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_source_error_distinguishes_degraded_mode() {
        assert!(LockSourceError::Unavailable("no loginctl".into()).is_degraded_mode());
        assert!(!LockSourceError::Failed("spawn failed".into()).is_degraded_mode());
    }

    #[test]
    fn lock_source_error_converts_transparently() {
        let err: WorkdayError = LockSourceError::Failed("boom".into()).into();
        assert_eq!(err.to_string(), "Lock event subscription failed: boom");
    }
}

//! # workday-core
//!
//! Core library for the workday tracker: measures effective work time against a
//! configured workday, keeps lunch and pauses out of it, flags overtime, and keeps
//! a per-day history.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Hosts drive the engine from a poll loop.
//! - **Single owner**: The engine lives on one thread. Lock/unlock signals from other
//!   threads arrive through a channel and are applied on the owning thread.
//! - **Graceful degradation**: Missing or corrupt files return defaults, not errors.
//!   Write failures are returned so the host can surface them.
//! - **Injectable edges**: Clock, persistence and lock source are passed in, so tests
//!   can simulate years of workdays without waiting on the wall clock.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use workday_core::{JsonFilePersistence, NoLockSource, StorageConfig, SystemClock, WorkdayEngine};
//!
//! let persistence = JsonFilePersistence::new(StorageConfig::default());
//! let settings = persistence.load_settings();
//! let mut engine = WorkdayEngine::new(settings, Box::new(persistence), Box::new(SystemClock), &NoLockSource)?;
//! engine.tick()?;
//! println!("{:.0}%", engine.progress_percent());
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod lock;
pub mod lunch;
pub mod persistence;
pub mod serde_helpers;
pub mod session;
pub mod settings;
pub mod stats;
pub mod storage;

pub use clock::{Clock, FakeClock, SystemClock};
pub use engine::{EngineEvent, StatusSnapshot, TickReport, WorkdayEngine};
pub use error::{LockSourceError, Result, WorkdayError};
pub use lock::{
    LockEvent, LockEventSender, LockEventSource, LockSubscription, ManualLockSource, NoLockSource,
};
pub use lunch::LunchTracker;
pub use persistence::{JsonFilePersistence, MemoryPersistence, Persistence};
pub use session::{DaySession, SessionStore};
pub use settings::{Settings, WindowGeometry};
pub use stats::HistorySummary;
pub use storage::StorageConfig;

//! The `run` command: owns the engine and drives it on a fixed cadence until
//! SIGINT or SIGTERM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

use workday_core::{EngineEvent, LockEventSource, NoLockSource, WorkdayEngine};

use crate::config::DaemonConfig;
use crate::intents::{self, IntentQueue};
use crate::lock_monitor::{LoginctlReader, PollingLockSource};

const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(200);

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn install_signal_handlers() {
    let handler = request_shutdown as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

/// Picks the lock source for this platform and configuration.
pub fn lock_source(config: &DaemonConfig) -> Box<dyn LockEventSource> {
    if !config.lock_detection {
        tracing::info!("Lock detection disabled in daemon config");
        return Box::new(NoLockSource);
    }
    if cfg!(target_os = "linux") {
        Box::new(PollingLockSource::new(
            LoginctlReader::from_env(),
            config.lock_poll_interval(),
        ))
    } else {
        Box::new(NoLockSource)
    }
}

pub fn run(
    mut engine: WorkdayEngine,
    config: &DaemonConfig,
    requests: &IntentQueue,
) -> Result<(), String> {
    install_signal_handlers();
    let events = engine.subscribe();
    let poll_interval = config.poll_interval();

    let stale = requests.drain();
    if !stale.is_empty() {
        tracing::warn!(count = stale.len(), "Discarding requests queued before startup");
    }

    tracing::info!(
        poll_interval_secs = poll_interval.as_secs(),
        lock_detection = engine.lock_detection_error().is_none(),
        "Workday daemon running"
    );

    while !SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
        step(&mut engine, requests);
        log_engine_events(&events);
        wait_for_next_tick(poll_interval);
    }

    tracing::info!("Shutdown requested");
    apply_requests(&mut engine, requests);
    log_engine_events(&events);
    let snapshot = engine.snapshot();
    engine.shutdown()?;
    tracing::info!(
        effective_minutes = snapshot.effective_minutes.round() as i64,
        "Workday daemon stopped"
    );
    Ok(())
}

/// One loop iteration: apply queued CLI requests, then tick and save.
fn step(engine: &mut WorkdayEngine, requests: &IntentQueue) {
    apply_requests(engine, requests);
    match engine.tick() {
        Ok(report) if report.lock_events > 0 => {
            tracing::debug!(lock_events = report.lock_events, "Tick");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "Failed to save session state"),
    }
}

fn apply_requests(engine: &mut WorkdayEngine, requests: &IntentQueue) {
    for intent in requests.drain() {
        if let Err(err) = intents::apply(engine, intent) {
            tracing::warn!(?intent, error = %err, "Failed to apply request");
        }
    }
}

fn log_engine_events(events: &Receiver<EngineEvent>) {
    for event in events.try_iter() {
        match event {
            EngineEvent::OvertimeStarted { overtime_minutes } => {
                tracing::info!(overtime_minutes, "Workday complete, now in overtime");
            }
            EngineEvent::PauseChanged { paused } => {
                tracing::info!(paused, "Pause state changed");
            }
            EngineEvent::DayRolledOver { archived_date } => {
                tracing::info!(archived = %archived_date, "Started a new workday");
            }
        }
    }
}

fn wait_for_next_tick(interval: Duration) {
    let deadline = Instant::now() + interval;
    while !SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SHUTDOWN_CHECK_INTERVAL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::Intent;
    use workday_core::{FakeClock, JsonFilePersistence, Persistence, StorageConfig};

    #[test]
    fn disabled_lock_detection_uses_no_source() {
        let config = DaemonConfig {
            lock_detection: false,
            ..DaemonConfig::default()
        };
        let source = lock_source(&config);
        let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let engine = WorkdayEngine::new(
            workday_core::Settings::default(),
            Box::new(workday_core::MemoryPersistence::new()),
            Box::new(workday_core::FakeClock::new(start)),
            source.as_ref(),
        )
        .unwrap();
        assert!(engine.lock_detection_error().is_some());
    }

    #[test]
    fn queued_requests_reach_the_stored_session() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let storage = StorageConfig::with_root(temp_dir.path().to_path_buf());
        let start = chrono::NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let clock = FakeClock::new(start);
        let persistence = JsonFilePersistence::new(storage.clone());
        let mut engine = WorkdayEngine::new(
            workday_core::Settings::default(),
            Box::new(persistence.clone()),
            Box::new(clock.clone()),
            &NoLockSource,
        )
        .unwrap();
        let requests = IntentQueue::new(&storage);

        clock.advance_minutes(60);
        requests.push(Intent::Pause).unwrap();
        step(&mut engine, &requests);
        assert!(engine.is_paused());
        let stored = persistence.load_sessions().current.unwrap();
        assert!(stored.is_paused);

        clock.advance_minutes(30);
        requests.push(Intent::Resume).unwrap();
        step(&mut engine, &requests);
        let stored = persistence.load_sessions().current.unwrap();
        assert!(!stored.is_paused);
        assert_eq!(stored.paused_minutes, 30.0);
        assert_eq!(stored.effective_minutes, 60.0);
        assert!(requests.drain().is_empty());
    }
}

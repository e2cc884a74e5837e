//! Screen lock detection through systemd-logind.
//!
//! Polls `loginctl show-session <id> -p LockedHint --value` on a background
//! thread and posts a lock event on every transition. The session id comes
//! from `XDG_SESSION_ID`. Without it, or without `loginctl`, subscribing
//! reports `Unavailable` and the engine runs without lunch detection.

use std::io::ErrorKind;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use workday_core::{
    Clock, LockEvent, LockEventSender, LockEventSource, LockSourceError, LockSubscription,
    SystemClock,
};

const SESSION_ENV_VAR: &str = "XDG_SESSION_ID";
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Reads whether the session is locked right now.
pub trait LockedHintReader: Send + Sync + 'static {
    fn is_locked(&self) -> Result<bool, LockSourceError>;
}

#[derive(Debug, Clone)]
pub struct LoginctlReader {
    session_id: Option<String>,
}

impl LoginctlReader {
    pub fn from_env() -> Self {
        Self {
            session_id: std::env::var(SESSION_ENV_VAR)
                .ok()
                .filter(|id| !id.trim().is_empty()),
        }
    }
}

impl LockedHintReader for LoginctlReader {
    fn is_locked(&self) -> Result<bool, LockSourceError> {
        let Some(session_id) = self.session_id.as_deref() else {
            return Err(LockSourceError::Unavailable(format!(
                "{} is not set",
                SESSION_ENV_VAR
            )));
        };

        let output = Command::new("loginctl")
            .args(["show-session", session_id, "-p", "LockedHint", "--value"])
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    LockSourceError::Unavailable("loginctl not found".to_string())
                }
                _ => LockSourceError::Failed(format!("Failed to run loginctl: {}", err)),
            })?;

        if !output.status.success() {
            return Err(LockSourceError::Unavailable(format!(
                "loginctl exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_locked_hint(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_locked_hint(value: &str) -> Result<bool, LockSourceError> {
    match value.trim() {
        "yes" => Ok(true),
        "no" => Ok(false),
        "" => Err(LockSourceError::Unavailable(
            "session reports no LockedHint".to_string(),
        )),
        other => Err(LockSourceError::Failed(format!(
            "Unexpected LockedHint value {:?}",
            other
        ))),
    }
}

/// Turns a stream of lock-state samples into transition events.
#[derive(Debug, Default)]
struct TransitionDetector {
    last: Option<bool>,
}

impl TransitionDetector {
    fn observe(&mut self, locked: bool) -> Option<bool> {
        match self.last.replace(locked) {
            Some(previous) if previous == locked => None,
            // Starting out unlocked is the normal state, not an unlock.
            None if !locked => None,
            _ => Some(locked),
        }
    }
}

pub struct PollingLockSource<P> {
    reader: Arc<P>,
    poll_interval: Duration,
}

impl<P: LockedHintReader> PollingLockSource<P> {
    pub fn new(reader: P, poll_interval: Duration) -> Self {
        Self {
            reader: Arc::new(reader),
            poll_interval,
        }
    }
}

impl<P: LockedHintReader> LockEventSource for PollingLockSource<P> {
    fn subscribe(
        &self,
        sender: LockEventSender,
    ) -> Result<Box<dyn LockSubscription>, LockSourceError> {
        // Read once up front so an unusable source is reported to the engine.
        let initial = self.reader.is_locked()?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let reader = Arc::clone(&self.reader);
        let poll_interval = self.poll_interval;
        let handle = thread::Builder::new()
            .name("lock-monitor".to_string())
            .spawn(move || poll_loop(&*reader, &sender, &thread_stop, poll_interval, initial))
            .map_err(|err| LockSourceError::Failed(format!("Failed to spawn lock monitor: {}", err)))?;

        tracing::info!(
            locked = initial,
            interval_ms = poll_interval.as_millis() as u64,
            "Lock monitor started"
        );
        Ok(Box::new(PollingSubscription {
            stop,
            handle: Some(handle),
        }))
    }
}

fn poll_loop<P: LockedHintReader>(
    reader: &P,
    sender: &LockEventSender,
    stop: &AtomicBool,
    poll_interval: Duration,
    initial: bool,
) {
    let clock = SystemClock;
    let mut detector = TransitionDetector::default();
    let mut sample = Ok(initial);
    let mut failing = false;

    while !stop.load(Ordering::SeqCst) {
        match sample {
            Ok(locked) => {
                failing = false;
                if let Some(locked) = detector.observe(locked) {
                    let at = clock.now();
                    let event = if locked {
                        LockEvent::Locked(at)
                    } else {
                        LockEvent::Unlocked(at)
                    };
                    tracing::debug!(locked, at = %event.at(), "Lock state changed");
                    if !sender.send(event) {
                        tracing::debug!("Engine gone, stopping lock monitor");
                        return;
                    }
                }
            }
            Err(err) => {
                if !failing {
                    tracing::warn!(error = %err, "Lock state read failed");
                    failing = true;
                }
            }
        }

        if !sleep_unless_stopped(stop, poll_interval) {
            break;
        }
        sample = reader.is_locked();
    }
    tracing::debug!("Lock monitor stopped");
}

/// Sleeps for `duration` in short slices. Returns false if stopped meanwhile.
fn sleep_unless_stopped(stop: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STOP_CHECK_INTERVAL.min(deadline - now));
    }
}

struct PollingSubscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LockSubscription for PollingSubscription {
    fn unsubscribe(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Lock monitor thread panicked");
            }
        }
    }
}

impl Drop for PollingSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

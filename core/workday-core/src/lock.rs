//! OS lock/unlock signal plumbing.
//!
//! Lock sources usually run on their own thread. They never touch engine state;
//! they post [`LockEvent`]s into a channel, and the engine applies them on its
//! own thread when it drains the channel (see `WorkdayEngine::process_lock_events`).
//!
//! ```text
//! OS signal → LockEventSource → LockEventSender ──channel──▶ WorkdayEngine (poll tick)
//! ```

use chrono::NaiveDateTime;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::error::LockSourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEvent {
    Locked(NaiveDateTime),
    Unlocked(NaiveDateTime),
}

impl LockEvent {
    pub fn at(&self) -> NaiveDateTime {
        match self {
            LockEvent::Locked(at) | LockEvent::Unlocked(at) => *at,
        }
    }
}

/// Producer side of the engine's lock event queue.
#[derive(Debug, Clone)]
pub struct LockEventSender {
    tx: Sender<LockEvent>,
}

impl LockEventSender {
    /// Posts an event. Returns false once the engine is gone.
    pub fn send(&self, event: LockEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn locked(&self, at: NaiveDateTime) -> bool {
        self.send(LockEvent::Locked(at))
    }

    pub fn unlocked(&self, at: NaiveDateTime) -> bool {
        self.send(LockEvent::Unlocked(at))
    }
}

pub(crate) fn channel() -> (LockEventSender, Receiver<LockEvent>) {
    let (tx, rx) = mpsc::channel();
    (LockEventSender { tx }, rx)
}

/// Live subscription to a lock source. Delivery stops on `unsubscribe` or drop.
pub trait LockSubscription: Send {
    fn unsubscribe(&mut self);
}

pub trait LockEventSource {
    fn subscribe(
        &self,
        sender: LockEventSender,
    ) -> Result<Box<dyn LockSubscription>, LockSourceError>;
}

/// For platforms without a lock signal. Always reports degraded mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLockSource;

impl LockEventSource for NoLockSource {
    fn subscribe(
        &self,
        _sender: LockEventSender,
    ) -> Result<Box<dyn LockSubscription>, LockSourceError> {
        Err(LockSourceError::Unavailable(
            "no lock signal on this platform".to_string(),
        ))
    }
}

/// Lock source driven by hand. Tests and embedding hosts call
/// [`ManualLockSource::lock`] / [`ManualLockSource::unlock`] from any thread.
#[derive(Debug, Clone, Default)]
pub struct ManualLockSource {
    sender: Arc<Mutex<Option<LockEventSender>>>,
}

impl ManualLockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot().is_some()
    }

    /// Returns false when nobody is subscribed.
    pub fn lock(&self, at: NaiveDateTime) -> bool {
        self.post(LockEvent::Locked(at))
    }

    pub fn unlock(&self, at: NaiveDateTime) -> bool {
        self.post(LockEvent::Unlocked(at))
    }

    fn post(&self, event: LockEvent) -> bool {
        self.slot()
            .as_ref()
            .map(|sender| sender.send(event))
            .unwrap_or(false)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<LockEventSender>> {
        self.sender.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct ManualSubscription {
    sender: Arc<Mutex<Option<LockEventSender>>>,
}

impl LockSubscription for ManualSubscription {
    fn unsubscribe(&mut self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl Drop for ManualSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl LockEventSource for ManualLockSource {
    fn subscribe(
        &self,
        sender: LockEventSender,
    ) -> Result<Box<dyn LockSubscription>, LockSourceError> {
        *self.slot() = Some(sender);
        Ok(Box::new(ManualSubscription {
            sender: Arc::clone(&self.sender),
        }))
    }
}

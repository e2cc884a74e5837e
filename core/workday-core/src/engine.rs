//! WorkdayEngine - the session time-tracking engine.
//!
//! Owns the day's session and answers every time question the presentation
//! layer asks. It has no scheduler of its own: the host polls it (typically
//! through [`WorkdayEngine::tick`]) and forwards user intents.
//!
//! ## Time model
//!
//! ```text
//! effective = (now - login) - lunch consumed (incl. in-progress) - paused (incl. in-progress)
//! ```
//!
//! floored at zero. Everything else (progress, remaining, overtime, estimated
//! end) derives from that one quantity and the clock.
//!
//! ## Threading
//!
//! The engine is single-owner. Lock sources post into a channel; the engine
//! applies queued lock events in [`WorkdayEngine::process_lock_events`] on the
//! owning thread, so no engine field is ever written from a callback thread.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::clock::Clock;
use crate::error::{LockSourceError, Result};
use crate::lock::{self, LockEvent, LockEventSender, LockEventSource, LockSubscription};
use crate::lunch::LunchTracker;
use crate::persistence::Persistence;
use crate::session::{DaySession, SessionStore};
use crate::settings::Settings;

/// Notifications for the presentation layer. Fire-and-forget.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    OvertimeStarted { overtime_minutes: f64 },
    PauseChanged { paused: bool },
    DayRolledOver { archived_date: NaiveDate },
}

/// What one poll tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub lock_events: usize,
    pub rolled_over: bool,
    pub overtime_started: bool,
}

/// Every derived query evaluated at a single instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub date: NaiveDate,
    pub now: NaiveDateTime,
    pub login_time: NaiveDateTime,
    pub effective_minutes: f64,
    pub paused_minutes: f64,
    pub lunch_minutes: f64,
    pub remaining_minutes: f64,
    pub overtime_minutes: f64,
    pub progress_percent: f64,
    pub filled_segments: u32,
    pub segments: u32,
    pub estimated_end: NaiveDateTime,
    pub is_paused: bool,
    pub is_overtime: bool,
    pub is_in_lunch_window: bool,
    pub is_on_lunch_break: bool,
    pub lock_detection: bool,
}

pub(crate) fn to_minutes(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 60_000.0
}

pub(crate) fn from_minutes(minutes: f64) -> Duration {
    if !minutes.is_finite() || minutes <= 0.0 {
        return Duration::zero();
    }
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

pub struct WorkdayEngine {
    settings: Settings,
    persistence: Box<dyn Persistence>,
    clock: Box<dyn Clock>,
    store: SessionStore,
    current_date: NaiveDate,
    login_time: NaiveDateTime,
    /// Committed pause time; an open pause is tracked by `pause_start`.
    paused_total: Duration,
    pause_start: Option<NaiveDateTime>,
    lunch: LunchTracker,
    overtime_notified: bool,
    lock_sender: LockEventSender,
    lock_events: Receiver<LockEvent>,
    lock_subscription: Option<Box<dyn LockSubscription>>,
    lock_unavailable: Option<LockSourceError>,
    subscribers: Vec<Sender<EngineEvent>>,
}

impl WorkdayEngine {
    /// Loads the session store, resumes today's session or archives a stale one
    /// and starts fresh, subscribes to `lock_source`, and persists the result.
    ///
    /// A lock source that cannot subscribe leaves lunch auto-detection off; it
    /// never prevents start-up. Only a failed initial save is an error.
    pub fn new(
        settings: Settings,
        persistence: Box<dyn Persistence>,
        clock: Box<dyn Clock>,
        lock_source: &dyn LockEventSource,
    ) -> Result<Self> {
        let settings = settings.normalized();
        let now = clock.now();
        let today = now.date();
        let mut store = persistence.load_sessions();

        let (lock_sender, lock_events) = lock::channel();
        let (lock_subscription, lock_unavailable) = match lock_source.subscribe(lock_sender.clone()) {
            Ok(subscription) => (Some(subscription), None),
            Err(err) => {
                if err.is_degraded_mode() {
                    tracing::info!(reason = %err, "Lunch auto-detection disabled");
                } else {
                    tracing::warn!(error = %err, "Lock monitor failed; lunch auto-detection disabled");
                }
                (None, Some(err))
            }
        };

        let mut engine = Self {
            settings,
            persistence,
            clock,
            store: SessionStore::default(),
            current_date: today,
            login_time: now,
            paused_total: Duration::zero(),
            pause_start: None,
            lunch: LunchTracker::default(),
            overtime_notified: false,
            lock_sender,
            lock_events,
            lock_subscription,
            lock_unavailable,
            subscribers: Vec::new(),
        };

        match store.current.take() {
            Some(session) if session.date == today => engine.restore_session(&session, now),
            Some(stale) => {
                tracing::info!(date = %stale.date, "Archiving session left over from a previous day");
                store.archive(stale);
            }
            None => {}
        }
        store.current = Some(engine.session_record(now));
        engine.store = store;

        engine.persistence.save_sessions(&engine.store)?;
        tracing::info!(
            date = %engine.current_date,
            login = %engine.login_time,
            history = engine.store.history.len(),
            "Workday engine initialized"
        );
        Ok(engine)
    }

    /// Restores accumulators from today's persisted record, repairing
    /// incoherent state instead of rejecting it.
    fn restore_session(&mut self, session: &DaySession, now: NaiveDateTime) {
        self.login_time = session.first_login.unwrap_or_else(|| {
            tracing::warn!(date = %session.date, "Session has no readable login time, using now");
            now
        });
        self.lunch = LunchTracker::new(from_minutes(session.lunch_minutes));

        let saved_paused = from_minutes(session.paused_minutes);
        if session.is_paused {
            let pause_start = session.pause_start.or(session.last_activity).unwrap_or(now);
            // The snapshot's paused total already includes the open pause up to the save.
            let open_at_save = session
                .last_activity
                .map(|saved_at| (saved_at - pause_start).max(Duration::zero()))
                .unwrap_or_else(Duration::zero);
            self.paused_total = (saved_paused - open_at_save).max(Duration::zero());
            self.pause_start = Some(pause_start);
        } else {
            if session.pause_start.is_some() {
                tracing::debug!(date = %session.date, "Clearing pause start on unpaused session");
            }
            self.paused_total = saved_paused;
            self.pause_start = None;
        }

        tracing::info!(
            date = %session.date,
            paused = self.pause_start.is_some(),
            "Resumed today's session"
        );
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Notifications & lock events
    // ─────────────────────────────────────────────────────────────────────────────

    /// Returns a receiver for engine notifications. Dropped receivers are
    /// pruned on the next emit.
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Producer handle for hosts that deliver lock events themselves.
    pub fn lock_event_sender(&self) -> LockEventSender {
        self.lock_sender.clone()
    }

    /// Why lunch auto-detection is off, if it is.
    pub fn lock_detection_error(&self) -> Option<&LockSourceError> {
        self.lock_unavailable.as_ref()
    }

    /// Applies every queued lock event. Returns how many were applied.
    pub fn process_lock_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.lock_events.try_recv() {
            self.handle_lock_event(event);
            applied += 1;
        }
        applied
    }

    /// Applies one lock event on the owning thread.
    pub fn handle_lock_event(&mut self, event: LockEvent) {
        match event {
            LockEvent::Locked(at) => {
                if self.lunch.on_lock(at, &self.settings) {
                    tracing::info!(at = %at, "Lunch break started");
                } else {
                    tracing::debug!(at = %at, "Screen locked outside lunch window");
                }
            }
            LockEvent::Unlocked(at) => {
                let was_lunch = self.lunch.is_on_lunch();
                let added = self.lunch.on_unlock(at, &self.settings);
                if was_lunch {
                    tracing::info!(
                        at = %at,
                        added_minutes = to_minutes(added),
                        total_minutes = to_minutes(self.lunch.consumed()),
                        "Lunch break ended"
                    );
                } else {
                    tracing::debug!(at = %at, "Screen unlocked");
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Pause / Resume
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn pause(&mut self) {
        if self.pause_start.is_some() {
            return;
        }
        let now = self.clock.now();
        self.pause_start = Some(now);
        tracing::debug!(at = %now, "Paused");
        self.emit(EngineEvent::PauseChanged { paused: true });
    }

    pub fn resume(&mut self) {
        let Some(start) = self.pause_start.take() else {
            return;
        };
        let now = self.clock.now();
        self.paused_total += (now - start).max(Duration::zero());
        tracing::debug!(
            at = %now,
            paused_minutes = to_minutes(self.paused_total),
            "Resumed"
        );
        self.emit(EngineEvent::PauseChanged { paused: false });
    }

    /// Pauses or resumes. Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
        self.is_paused()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Day lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    /// Archives the current session if the calendar day changed.
    ///
    /// Only one rollover happens per call, however many days were skipped; the
    /// skipped days get no history entries. The archived session is sealed at
    /// the moment of archiving.
    pub fn check_new_day(&mut self) -> Result<bool> {
        let now = self.clock.now();
        let today = now.date();
        if today == self.current_date {
            return Ok(false);
        }

        let archived_date = self.current_date;
        let was_paused = self.pause_start.is_some();
        let sealed = self.session_record(now);
        self.store.archive(sealed);

        self.start_fresh_day(now);
        tracing::info!(
            archived = %archived_date,
            today = %today,
            "Day rollover"
        );
        if was_paused {
            self.emit(EngineEvent::PauseChanged { paused: false });
        }
        self.emit(EngineEvent::DayRolledOver { archived_date });

        self.persistence.save_sessions(&self.store)?;
        Ok(true)
    }

    /// Discards today's session (no archive) and starts over from now.
    ///
    /// A pending rollover is applied first, so a previous day's session is
    /// archived rather than discarded.
    pub fn reset_day(&mut self) -> Result<()> {
        self.check_new_day()?;
        let now = self.clock.now();
        let was_paused = self.pause_start.is_some();

        self.start_fresh_day(now);
        tracing::info!(date = %self.current_date, login = %now, "Day reset");
        if was_paused {
            self.emit(EngineEvent::PauseChanged { paused: false });
        }

        self.persistence.save_sessions(&self.store)
    }

    fn start_fresh_day(&mut self, now: NaiveDateTime) {
        self.current_date = now.date();
        self.login_time = now;
        self.paused_total = Duration::zero();
        self.pause_start = None;
        self.lunch.start_new_day();
        self.overtime_notified = false;
        self.store.current = Some(DaySession::start(self.current_date, now));
    }

    /// Fires `OvertimeStarted` on the transition into overtime. Re-arms once
    /// effective time drops back under the workday (e.g. after a settings change).
    pub fn check_and_notify_overtime(&mut self) -> bool {
        let now = self.clock.now();
        if !self.is_overtime_at(now) {
            self.overtime_notified = false;
            return false;
        }
        if self.overtime_notified {
            return false;
        }
        self.overtime_notified = true;
        let overtime_minutes = to_minutes(self.overtime_at(now));
        tracing::info!(overtime_minutes, "Overtime started");
        self.emit(EngineEvent::OvertimeStarted { overtime_minutes });
        true
    }

    /// Snapshots the live session into the store and writes the store.
    pub fn save_state(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.store.current = Some(self.session_record(now));
        self.persistence.save_sessions(&self.store)
    }

    /// One poll-cadence step: drain lock events, roll over if needed, check
    /// overtime, save.
    pub fn tick(&mut self) -> Result<TickReport> {
        let lock_events = self.process_lock_events();
        let rolled_over = self.check_new_day()?;
        let overtime_started = self.check_and_notify_overtime();
        self.save_state()?;
        Ok(TickReport {
            lock_events,
            rolled_over,
            overtime_started,
        })
    }

    /// Swaps settings. Session state is untouched; later queries use the new values.
    pub fn update_settings(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        tracing::info!(
            workday_minutes = settings.workday_minutes,
            lunch_start = %settings.lunch_start,
            lunch_minutes = settings.lunch_duration_minutes,
            "Settings updated"
        );
        self.settings = settings;
        Ok(())
    }

    /// Unsubscribes from the lock source and writes a final snapshot.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(mut subscription) = self.lock_subscription.take() {
            subscription.unsubscribe();
        }
        self.process_lock_events();
        self.save_state()
    }

    /// Record of the session as of `at`. A lunch still in progress is
    /// included in `lunch_minutes`, so effective + lunch + paused always
    /// adds up to the time since login.
    fn session_record(&self, at: NaiveDateTime) -> DaySession {
        DaySession {
            date: self.current_date,
            first_login: Some(self.login_time),
            last_activity: Some(at),
            effective_minutes: to_minutes(self.effective_work_time_at(at)),
            paused_minutes: to_minutes(self.paused_time_at(at)),
            lunch_minutes: to_minutes(self.lunch_time_at(at)),
            is_paused: self.pause_start.is_some(),
            pause_start: self.pause_start,
            completed: false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Derived queries at an instant
    // ─────────────────────────────────────────────────────────────────────────────

    fn paused_time_at(&self, now: NaiveDateTime) -> Duration {
        let open = self
            .pause_start
            .map(|start| (now - start).max(Duration::zero()))
            .unwrap_or_else(Duration::zero);
        self.paused_total + open
    }

    fn lunch_time_at(&self, now: NaiveDateTime) -> Duration {
        self.lunch.live_consumed(now, &self.settings)
    }

    fn effective_work_time_at(&self, now: NaiveDateTime) -> Duration {
        let elapsed = now - self.login_time;
        (elapsed - self.lunch_time_at(now) - self.paused_time_at(now)).max(Duration::zero())
    }

    fn remaining_at(&self, now: NaiveDateTime) -> Duration {
        (self.settings.workday() - self.effective_work_time_at(now)).max(Duration::zero())
    }

    fn overtime_at(&self, now: NaiveDateTime) -> Duration {
        (self.effective_work_time_at(now) - self.settings.workday()).max(Duration::zero())
    }

    fn is_overtime_at(&self, now: NaiveDateTime) -> bool {
        self.effective_work_time_at(now) > self.settings.workday()
    }

    fn progress_at(&self, now: NaiveDateTime) -> f64 {
        let workday = self.settings.workday_minutes.max(1) as f64;
        to_minutes(self.effective_work_time_at(now)) / workday * 100.0
    }

    fn estimated_end_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        let remaining = self.remaining_at(now);
        let time = now.time();
        let lunch_ahead = time < self.settings.lunch_start || self.settings.is_in_lunch_window(time);
        let lunch_left = self.lunch.remaining_allowance(now, &self.settings);
        if lunch_ahead && lunch_left > Duration::zero() {
            now + remaining + lunch_left
        } else {
            now + remaining
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Public getters (evaluated against the clock)
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }

    pub fn login_time(&self) -> NaiveDateTime {
        self.login_time
    }

    pub fn is_paused(&self) -> bool {
        self.pause_start.is_some()
    }

    pub fn pause_start(&self) -> Option<NaiveDateTime> {
        self.pause_start
    }

    pub fn effective_work_time(&self) -> Duration {
        self.effective_work_time_at(self.clock.now())
    }

    pub fn total_effective_work_minutes(&self) -> f64 {
        to_minutes(self.effective_work_time())
    }

    /// Paused time including a pause still open.
    pub fn total_paused_time(&self) -> Duration {
        self.paused_time_at(self.clock.now())
    }

    pub fn total_paused_minutes(&self) -> f64 {
        to_minutes(self.total_paused_time())
    }

    /// Lunch consumed including a lunch still in progress.
    pub fn lunch_time_consumed(&self) -> Duration {
        self.lunch_time_at(self.clock.now())
    }

    /// Effective time as a share of the workday. Not clamped; exceeds 100 in overtime.
    pub fn progress_percent(&self) -> f64 {
        self.progress_at(self.clock.now())
    }

    /// Filled display segments out of `segments`, clamped at a full bar.
    pub fn filled_segments(&self, segments: u32) -> u32 {
        filled_segments(self.progress_percent(), segments)
    }

    pub fn remaining_time(&self) -> Duration {
        self.remaining_at(self.clock.now())
    }

    pub fn overtime(&self) -> Duration {
        self.overtime_at(self.clock.now())
    }

    pub fn is_overtime(&self) -> bool {
        self.is_overtime_at(self.clock.now())
    }

    pub fn is_in_lunch_window(&self) -> bool {
        self.settings.is_in_lunch_window(self.clock.now().time())
    }

    pub fn is_on_lunch_break(&self) -> bool {
        self.lunch.is_on_lunch()
    }

    pub fn estimated_end_time(&self) -> NaiveDateTime {
        self.estimated_end_at(self.clock.now())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let now = self.clock.now();
        let progress = self.progress_at(now);
        let segments = self.settings.progress_segments;
        StatusSnapshot {
            date: self.current_date,
            now,
            login_time: self.login_time,
            effective_minutes: to_minutes(self.effective_work_time_at(now)),
            paused_minutes: to_minutes(self.paused_time_at(now)),
            lunch_minutes: to_minutes(self.lunch_time_at(now)),
            remaining_minutes: to_minutes(self.remaining_at(now)),
            overtime_minutes: to_minutes(self.overtime_at(now)),
            progress_percent: progress,
            filled_segments: filled_segments(progress, segments),
            segments,
            estimated_end: self.estimated_end_at(now),
            is_paused: self.is_paused(),
            is_overtime: self.is_overtime_at(now),
            is_in_lunch_window: self.settings.is_in_lunch_window(now.time()),
            is_on_lunch_break: self.lunch.is_on_lunch(),
            lock_detection: self.lock_subscription.is_some(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn history(&self) -> &[DaySession] {
        &self.store.history
    }

    pub fn history_for_date(&self, date: NaiveDate) -> Option<&DaySession> {
        self.store.history_for_date(date)
    }

    pub fn history_for_month(&self, year: i32, month: u32) -> Vec<&DaySession> {
        self.store.history_for_month(year, month)
    }
}

fn filled_segments(progress_percent: f64, segments: u32) -> u32 {
    let clamped = progress_percent.clamp(0.0, 100.0);
    (clamped / 100.0 * segments as f64).floor() as u32
}

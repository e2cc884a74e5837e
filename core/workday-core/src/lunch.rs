//! Lunch detection from screen lock signals.
//!
//! Lunch is not a fixed deduction. A lock that starts inside the lunch window
//! marks the user as "on lunch"; the matching unlock commits the locked time,
//! capped so the day's total never exceeds the configured lunch duration.
//! While still locked, [`LunchTracker::live_consumed`] reports the total as if
//! the unlock happened now, without committing anything.

use chrono::{Duration, NaiveDateTime};

use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq)]
pub struct LunchTracker {
    consumed: Duration,
    locked_at: Option<NaiveDateTime>,
    on_lunch: bool,
}

impl Default for LunchTracker {
    fn default() -> Self {
        Self::new(Duration::zero())
    }
}

impl LunchTracker {
    /// Tracker resuming with `consumed` lunch already committed today.
    pub fn new(consumed: Duration) -> Self {
        Self {
            consumed: consumed.max(Duration::zero()),
            locked_at: None,
            on_lunch: false,
        }
    }

    /// Committed lunch time (excludes a lunch in progress).
    pub fn consumed(&self) -> Duration {
        self.consumed
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    pub fn locked_at(&self) -> Option<NaiveDateTime> {
        self.locked_at
    }

    pub fn is_on_lunch(&self) -> bool {
        self.locked_at.is_some() && self.on_lunch
    }

    /// Records a lock. Returns true when the lock starts a lunch break.
    ///
    /// A second lock while already locked is ignored; the first lock time wins.
    pub fn on_lock(&mut self, at: NaiveDateTime, settings: &Settings) -> bool {
        if self.locked_at.is_some() {
            return false;
        }
        self.locked_at = Some(at);
        self.on_lunch = settings.is_in_lunch_window(at.time());
        self.on_lunch
    }

    /// Records an unlock and returns the lunch time actually committed.
    pub fn on_unlock(&mut self, at: NaiveDateTime, settings: &Settings) -> Duration {
        let Some(locked_at) = self.locked_at.take() else {
            return Duration::zero();
        };
        if !std::mem::take(&mut self.on_lunch) {
            return Duration::zero();
        }

        let before = self.consumed;
        self.consumed = capped_total(before, countable_lock(locked_at, at, settings), settings);
        self.consumed - before
    }

    /// Lunch consumed so far, counting an in-progress lunch up to `now`.
    pub fn live_consumed(&self, now: NaiveDateTime, settings: &Settings) -> Duration {
        match self.locked_at {
            Some(locked_at) if self.on_lunch => {
                capped_total(self.consumed, countable_lock(locked_at, now, settings), settings)
            }
            _ => self.consumed,
        }
    }

    /// Lunch allowance still unused at `now`, floored at zero.
    pub fn remaining_allowance(&self, now: NaiveDateTime, settings: &Settings) -> Duration {
        (settings.lunch_duration() - self.live_consumed(now, settings)).max(Duration::zero())
    }

    /// Clears per-day lunch state. The physical lock state survives, but a
    /// lock carried over from the previous day no longer counts as lunch.
    pub fn start_new_day(&mut self) {
        self.consumed = Duration::zero();
        self.on_lunch = false;
    }
}

/// Locked time that counts as lunch under the minimum-lock policy.
fn countable_lock(from: NaiveDateTime, to: NaiveDateTime, settings: &Settings) -> Duration {
    let locked = (to - from).max(Duration::zero());
    if locked < settings.lunch_min_lock() {
        Duration::zero()
    } else {
        locked
    }
}

/// Adds `extra` to `consumed` without passing the configured allowance, and
/// never lowers a total that already exceeds it.
fn capped_total(consumed: Duration, extra: Duration, settings: &Settings) -> Duration {
    let cap = settings.lunch_duration();
    if consumed >= cap {
        return consumed;
    }
    (consumed + extra).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn lock_outside_window_is_not_lunch() {
        let settings = Settings::default();
        let mut lunch = LunchTracker::default();

        assert!(!lunch.on_lock(at(10, 0), &settings));
        assert!(lunch.is_locked());
        assert!(!lunch.is_on_lunch());
        assert_eq!(lunch.on_unlock(at(10, 30), &settings), Duration::zero());
        assert_eq!(lunch.consumed(), Duration::zero());
    }

    #[test]
    fn lock_inside_window_commits_on_unlock() {
        let settings = Settings::default();
        let mut lunch = LunchTracker::default();

        assert!(lunch.on_lock(at(12, 10), &settings));
        assert_eq!(lunch.live_consumed(at(12, 40), &settings), Duration::minutes(30));
        assert_eq!(lunch.consumed(), Duration::zero());

        assert_eq!(lunch.on_unlock(at(12, 50), &settings), Duration::minutes(40));
        assert_eq!(lunch.consumed(), Duration::minutes(40));
        assert!(!lunch.is_locked());
    }

    #[test]
    fn lunch_total_is_capped_across_breaks() {
        let settings = Settings::default();
        let mut lunch = LunchTracker::default();

        lunch.on_lock(at(12, 0), &settings);
        lunch.on_unlock(at(12, 45), &settings);
        lunch.on_lock(at(12, 50), &settings);
        assert_eq!(lunch.live_consumed(at(14, 0), &settings), Duration::minutes(60));
        assert_eq!(lunch.on_unlock(at(15, 0), &settings), Duration::minutes(15));
        assert_eq!(lunch.consumed(), Duration::minutes(60));
        assert_eq!(lunch.remaining_allowance(at(15, 0), &settings), Duration::zero());
    }

    #[test]
    fn short_lock_below_threshold_is_ignored() {
        let settings = Settings {
            lunch_min_lock_minutes: 5,
            ..Settings::default()
        };
        let mut lunch = LunchTracker::default();

        lunch.on_lock(at(12, 0), &settings);
        assert_eq!(lunch.live_consumed(at(12, 3), &settings), Duration::zero());
        assert_eq!(lunch.on_unlock(at(12, 4), &settings), Duration::zero());

        lunch.on_lock(at(12, 10), &settings);
        assert_eq!(lunch.on_unlock(at(12, 30), &settings), Duration::minutes(20));
    }

    #[test]
    fn repeated_lock_keeps_first_timestamp() {
        let settings = Settings::default();
        let mut lunch = LunchTracker::default();

        lunch.on_lock(at(12, 0), &settings);
        lunch.on_lock(at(12, 20), &settings);
        assert_eq!(lunch.locked_at(), Some(at(12, 0)));
    }

    #[test]
    fn unlock_without_lock_is_ignored() {
        let settings = Settings::default();
        let mut lunch = LunchTracker::new(Duration::minutes(10));
        assert_eq!(lunch.on_unlock(at(12, 30), &settings), Duration::zero());
        assert_eq!(lunch.consumed(), Duration::minutes(10));
    }

    #[test]
    fn new_day_drops_carried_lunch() {
        let settings = Settings::default();
        let mut lunch = LunchTracker::default();
        lunch.on_lock(at(12, 0), &settings);

        lunch.start_new_day();

        assert!(lunch.is_locked());
        assert!(!lunch.is_on_lunch());
        assert_eq!(lunch.on_unlock(at(12, 30), &settings), Duration::zero());
    }

    #[test]
    fn lowering_the_cap_never_shrinks_committed_lunch() {
        let mut lunch = LunchTracker::new(Duration::minutes(50));
        let settings = Settings {
            lunch_duration_minutes: 30,
            ..Settings::default()
        };
        lunch.on_lock(at(12, 0), &settings);
        assert_eq!(lunch.on_unlock(at(12, 20), &settings), Duration::zero());
        assert_eq!(lunch.consumed(), Duration::minutes(50));
    }
}

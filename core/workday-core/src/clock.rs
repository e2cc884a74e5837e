//! Time source for the engine.
//!
//! All engine arithmetic happens in local wall-clock time (`NaiveDateTime`), the
//! same calendar the user sees. `FakeClock` lets tests move time by hand.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};

pub trait Clock: Send {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Reads the OS clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Hand-driven clock. Clones share the same instant, so a test can keep one
/// handle and give another to the engine.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl FakeClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }
}

impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn fake_clock_clones_share_time() {
        let clock = FakeClock::new(at(2024, 2, 28, 23, 30));
        let handle = clock.clone();

        handle.advance_minutes(45);

        assert_eq!(clock.now(), at(2024, 2, 29, 0, 15));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn fake_clock_can_move_backwards() {
        let clock = FakeClock::new(at(2025, 1, 1, 9, 0));
        clock.set(at(2024, 12, 31, 17, 0));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }
}

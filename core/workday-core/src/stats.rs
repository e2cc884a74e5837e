//! History statistics.
//!
//! Aggregates archived day sessions into totals for reporting:
//! - Days tracked and days in overtime
//! - Total and average effective work time
//! - Total paused and lunch time

use serde::Serialize;

use crate::session::DaySession;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub days: u32,
    pub overtime_days: u32,
    pub total_effective_minutes: f64,
    pub average_effective_minutes: f64,
    pub total_paused_minutes: f64,
    pub total_lunch_minutes: f64,
}

impl HistorySummary {
    /// Summarizes `sessions` against a workday of `workday_minutes`.
    pub fn from_sessions<'a, I>(sessions: I, workday_minutes: u32) -> Self
    where
        I: IntoIterator<Item = &'a DaySession>,
    {
        let mut summary = Self::default();
        for session in sessions {
            summary.days += 1;
            if session.is_overtime(workday_minutes) {
                summary.overtime_days += 1;
            }
            summary.total_effective_minutes += session.effective_minutes;
            summary.total_paused_minutes += session.paused_minutes;
            summary.total_lunch_minutes += session.lunch_minutes;
        }
        if summary.days > 0 {
            summary.average_effective_minutes = summary.total_effective_minutes / summary.days as f64;
        }
        summary
    }

    /// Total effective time as (hours, minutes).
    pub fn total_time(&self) -> (u64, u64) {
        let minutes = self.total_effective_minutes.max(0.0).round() as u64;
        (minutes / 60, minutes % 60)
    }
}

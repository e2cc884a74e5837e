//! Day session records and the session store document.
//!
//! # File Format
//!
//! ```json
//! {
//!   "current": { "date": "2024-03-01", "firstLogin": "2024-03-01T08:55:00", ... },
//!   "history": [ { ... completed DaySession ... } ]
//! }
//! ```
//!
//! History is append-only; insertion order is chronological order. A history
//! entry that cannot be parsed (bad date, wrong shape) is dropped with a
//! warning so the rest of the history survives.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::serde_helpers::{lenient_bool, lenient_minutes, lenient_timestamp};

/// One calendar day's work record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySession {
    pub date: NaiveDate,
    /// `None` only when the stored value was missing or unparseable.
    #[serde(default, with = "lenient_timestamp")]
    pub first_login: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_timestamp")]
    pub last_activity: Option<NaiveDateTime>,
    #[serde(default, with = "lenient_minutes")]
    pub effective_minutes: f64,
    #[serde(default, with = "lenient_minutes")]
    pub paused_minutes: f64,
    #[serde(default, with = "lenient_minutes")]
    pub lunch_minutes: f64,
    #[serde(default, deserialize_with = "lenient_bool::deserialize")]
    pub is_paused: bool,
    #[serde(default, with = "lenient_timestamp")]
    pub pause_start: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_bool::deserialize")]
    pub completed: bool,
}

impl DaySession {
    /// Fresh record for `date`, logged in at `login`.
    pub fn start(date: NaiveDate, login: NaiveDateTime) -> Self {
        Self {
            date,
            first_login: Some(login),
            last_activity: None,
            effective_minutes: 0.0,
            paused_minutes: 0.0,
            lunch_minutes: 0.0,
            is_paused: false,
            pause_start: None,
            completed: false,
        }
    }

    /// Date key as stored on disk ("yyyy-MM-dd").
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn is_overtime(&self, workday_minutes: u32) -> bool {
        self.effective_minutes > workday_minutes as f64
    }
}

/// Container for the current session plus the completed history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStore {
    #[serde(default, deserialize_with = "lenient_record")]
    pub current: Option<DaySession>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub history: Vec<DaySession>,
}

impl SessionStore {
    /// Seals `session` and appends it to history.
    pub fn archive(&mut self, mut session: DaySession) {
        session.completed = true;
        self.history.push(session);
    }

    /// Most recent history entry for `date`, if any.
    pub fn history_for_date(&self, date: NaiveDate) -> Option<&DaySession> {
        self.history.iter().rev().find(|s| s.date == date)
    }

    pub fn history_for_month(&self, year: i32, month: u32) -> Vec<&DaySession> {
        self.history
            .iter()
            .filter(|s| s.date.year() == year && s.date.month() == month)
            .collect()
    }
}

fn parse_record(raw: Value) -> Option<DaySession> {
    match serde_json::from_value::<DaySession>(raw) {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::warn!(error = %err, "Dropping unreadable session record");
            None
        }
    }
}

fn lenient_record<'de, D>(deserializer: D) -> Result<Option<DaySession>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(None);
    }
    Ok(parse_record(raw))
}

fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<DaySession>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match raw {
        Value::Array(items) => Ok(items.into_iter().filter_map(parse_record).collect()),
        Value::Null => Ok(Vec::new()),
        other => {
            tracing::warn!(kind = %value_kind(&other), "Session history is not a list, ignoring");
            Ok(Vec::new())
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

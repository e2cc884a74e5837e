//! User settings: workday length and the lunch window.
//!
//! Lunch end is always derived from start + duration; it is never stored.

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, WorkdayError};
use crate::serde_helpers::time_of_day;

pub const DEFAULT_WORKDAY_MINUTES: u32 = 480;
pub const DEFAULT_LUNCH_DURATION_MINUTES: u32 = 60;
pub const DEFAULT_PROGRESS_SEGMENTS: u32 = 10;

fn default_lunch_start() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

fn default_workday_minutes() -> u32 {
    DEFAULT_WORKDAY_MINUTES
}

fn default_lunch_duration_minutes() -> u32 {
    DEFAULT_LUNCH_DURATION_MINUTES
}

fn default_progress_segments() -> u32 {
    DEFAULT_PROGRESS_SEGMENTS
}

fn default_language() -> String {
    "en".to_string()
}

fn lenient_lunch_start<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(time_of_day::deserialize_opt(deserializer)?.unwrap_or_else(default_lunch_start))
}

/// Window placement. Only carried through for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowGeometry {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub mini_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_workday_minutes")]
    pub workday_minutes: u32,
    #[serde(
        default = "default_lunch_start",
        serialize_with = "time_of_day::serialize",
        deserialize_with = "lenient_lunch_start"
    )]
    pub lunch_start: NaiveTime,
    #[serde(default = "default_lunch_duration_minutes")]
    pub lunch_duration_minutes: u32,
    /// A lock inside the lunch window only counts as lunch once it has lasted
    /// this long. 0 means any lock in the window is lunch.
    #[serde(default)]
    pub lunch_min_lock_minutes: u32,
    #[serde(default = "default_progress_segments")]
    pub progress_segments: u32,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowGeometry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workday_minutes: DEFAULT_WORKDAY_MINUTES,
            lunch_start: default_lunch_start(),
            lunch_duration_minutes: DEFAULT_LUNCH_DURATION_MINUTES,
            lunch_min_lock_minutes: 0,
            progress_segments: DEFAULT_PROGRESS_SEGMENTS,
            language: default_language(),
            window: None,
        }
    }
}

impl Settings {
    pub fn workday(&self) -> Duration {
        Duration::minutes(self.workday_minutes as i64)
    }

    pub fn lunch_duration(&self) -> Duration {
        Duration::minutes(self.lunch_duration_minutes as i64)
    }

    pub fn lunch_min_lock(&self) -> Duration {
        Duration::minutes(self.lunch_min_lock_minutes as i64)
    }

    /// End of the lunch window. Wraps past midnight like a clock face.
    pub fn lunch_end(&self) -> NaiveTime {
        let (end, _) = self.lunch_start.overflowing_add_signed(self.lunch_duration());
        end
    }

    /// True when `time` falls in `[lunch_start, lunch_end)`.
    ///
    /// An empty window (zero duration) contains nothing. A window that crosses
    /// midnight is handled as two pieces.
    pub fn is_in_lunch_window(&self, time: NaiveTime) -> bool {
        if self.lunch_duration_minutes == 0 {
            return false;
        }
        if self.lunch_duration_minutes >= 24 * 60 {
            return true;
        }
        let start = self.lunch_start;
        let end = self.lunch_end();
        if start < end {
            time >= start && time < end
        } else {
            time >= start || time < end
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workday_minutes == 0 {
            return Err(WorkdayError::InvalidSettings {
                field: "workdayMinutes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.progress_segments == 0 {
            return Err(WorkdayError::InvalidSettings {
                field: "progressSegments",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Repairs values that would break the engine's arithmetic.
    pub fn normalized(mut self) -> Self {
        if self.workday_minutes == 0 {
            tracing::warn!("Stored workday length is zero, using default");
            self.workday_minutes = DEFAULT_WORKDAY_MINUTES;
        }
        if self.progress_segments == 0 {
            self.progress_segments = DEFAULT_PROGRESS_SEGMENTS;
        }
        self
    }
}

//! Lenient (de)serializers for the persisted documents.
//!
//! The documents are hand-editable JSON. A single bad field must not take the
//! whole history down with it, so these helpers turn unparseable values into
//! "absent" instead of failing the surrounding document.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Local timestamp format written to disk (ISO-8601 without offset).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Time-of-day format for settings ("HH:mm").
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M";

/// Parses a local ISO-8601 timestamp.
///
/// Accepts the naive form we write, a space separator, and RFC 3339 strings
/// with an offset (converted to local time).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses "HH:mm" (seconds tolerated).
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, TIME_OF_DAY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// `Option<NaiveDateTime>` that reads unparseable or non-string values as `None`.
pub mod lenient_timestamp {
    use super::*;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw {
            Value::String(s) => {
                let parsed = parse_timestamp(&s);
                if parsed.is_none() && !s.trim().is_empty() {
                    tracing::warn!(value = %s, "Unparseable stored timestamp, treating as absent");
                }
                parsed
            }
            _ => None,
        })
    }
}

/// Minute counters: accepts any JSON number, clamps negatives and NaN-ish
/// input to zero, and reads anything else as zero.
pub mod lenient_minutes {
    use super::*;

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let minutes = raw.as_f64().unwrap_or(0.0);
        Ok(if minutes.is_finite() && minutes > 0.0 {
            minutes
        } else {
            0.0
        })
    }
}

/// Booleans that read `null` or garbage as `false`.
pub mod lenient_bool {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_bool().unwrap_or(false))
    }
}

/// "HH:mm" time of day.
pub mod time_of_day {
    use super::*;

    pub fn serialize<S>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIME_OF_DAY_FORMAT).to_string())
    }

    /// Returns `None` for malformed input; the caller picks the fallback.
    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().and_then(parse_time_of_day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        #[serde(default, with = "lenient_timestamp")]
        at: Option<NaiveDateTime>,
        #[serde(default, with = "lenient_minutes")]
        minutes: f64,
    }

    #[test]
    fn parses_naive_and_fractional_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 08:30:00"), Some(expected));
        assert!(parse_timestamp("2024-03-01T08:30:00.250").is_some());
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn formats_whole_seconds_without_fraction() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 5)
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-01T08:30:05");
    }

    #[test]
    fn malformed_fields_read_as_absent() {
        let parsed: Sample = serde_json::from_str(r#"{"at": "yesterday-ish", "minutes": -12.5}"#)
            .expect("lenient parse");
        assert!(parsed.at.is_none());
        assert_eq!(parsed.minutes, 0.0);

        let parsed: Sample =
            serde_json::from_str(r#"{"at": 42, "minutes": "ten"}"#).expect("lenient parse");
        assert!(parsed.at.is_none());
        assert_eq!(parsed.minutes, 0.0);
    }

    #[test]
    fn time_of_day_accepts_seconds() {
        assert_eq!(
            parse_time_of_day("12:30:00"),
            NaiveTime::from_hms_opt(12, 30, 0)
        );
        assert_eq!(parse_time_of_day("12:30"), NaiveTime::from_hms_opt(12, 30, 0));
        assert!(parse_time_of_day("25:00").is_none());
    }
}

//! The workout session record supplied by the host application.
//!
//! Sessions arrive as loosely-shaped JSON written by several generations of
//! the app, so every accessor here is tolerant: a missing or malformed field
//! reads as `None` and never fails the whole record.

use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storykit_common::error::{StoryError, StoryResult};

/// Fields consulted for the workout title, in priority order.
const TITLE_FIELDS: &[&str] = &["workoutTitle", "title", "name"];
/// Fields consulted for the completion date, in priority order.
const DATE_FIELDS: &[&str] = &["date", "completedAt", "finishedAt", "endedAt", "createdAt"];
/// Fields consulted for the start timestamp when no duration is stored.
const START_FIELDS: &[&str] = &["startedAt", "startTime"];
/// Fields holding a precomputed duration in seconds.
const DURATION_FIELDS: &[&str] = &["totalTime", "durationSeconds", "duration"];
/// Fields holding an externally supplied calorie estimate.
const KCAL_FIELDS: &[&str] = &["kcal", "calories", "estimatedCalories"];
/// Fields holding the team participant count.
const TEAM_FIELDS: &[&str] = &["teamCount", "teamSize", "participantsCount"];

/// Epoch values at or above this magnitude are milliseconds, below it seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// An opaque, session-like JSON record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRecord(pub Value);

impl SessionRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a session from JSON text.
    pub fn from_json_str(json: &str) -> StoryResult<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }

    /// Load a session from a JSON file.
    pub fn load(path: &Path) -> StoryResult<Self> {
        if !path.exists() {
            return Err(StoryError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// First non-empty title-like string.
    pub fn title(&self) -> Option<String> {
        TITLE_FIELDS.iter().find_map(|key| {
            self.field(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    }

    /// First candidate date field that actually parses.
    pub fn date(&self) -> Option<&Value> {
        DATE_FIELDS
            .iter()
            .filter_map(|key| self.field(key))
            .find(|v| v.instant().is_some())
    }

    /// Per-set log entries. Accepts a keyed object or an array.
    pub fn log_entries(&self) -> Vec<&Value> {
        match self.field("logs") {
            Some(Value::Object(map)) => map.values().collect(),
            Some(Value::Array(items)) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Stored duration in seconds, or the span between start and completion.
    pub fn duration_secs(&self) -> Option<f64> {
        let stored = DURATION_FIELDS
            .iter()
            .filter_map(|key| self.field(key))
            .find_map(parse_number)
            .filter(|secs| *secs >= 0.0);
        if stored.is_some() {
            return stored;
        }

        let start = START_FIELDS
            .iter()
            .filter_map(|key| self.field(key))
            .find_map(DateLike::instant)?;
        let end = self.date()?.instant()?;
        let secs = (end - start).num_milliseconds() as f64 / 1000.0;
        (secs > 0.0).then_some(secs)
    }

    /// Calorie estimate from an external service, when one is usable.
    pub fn kcal_estimate(&self) -> Option<f64> {
        KCAL_FIELDS
            .iter()
            .filter_map(|key| self.field(key))
            .find_map(parse_number)
            .filter(|kcal| *kcal > 0.0)
    }

    /// Number of people who trained together.
    pub fn team_count(&self) -> Option<u32> {
        let explicit = TEAM_FIELDS
            .iter()
            .filter_map(|key| self.field(key))
            .find_map(parse_number)
            .filter(|n| *n >= 0.0)
            .map(|n| n.floor() as u32);
        explicit.or_else(|| {
            self.field("participants")
                .and_then(Value::as_array)
                .map(|list| list.len() as u32)
        })
    }
}

/// Parse a finite number from a JSON number or a numeric string.
///
/// Strings may use a decimal comma (`"10,5"`).
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Anything that can be read as a point in time.
///
/// This is a capability, not a type: hosts pass native timestamps, ISO
/// strings, or serialized timestamp objects, and all of them work.
pub trait DateLike {
    /// The instant this value denotes, if any.
    fn instant(&self) -> Option<DateTime<Utc>>;

    /// The calendar day in the local time zone.
    fn local_date(&self) -> Option<NaiveDate> {
        self.instant()
            .map(|t| t.with_timezone(&Local).date_naive())
    }
}

impl<Tz: TimeZone> DateLike for DateTime<Tz> {
    fn instant(&self) -> Option<DateTime<Utc>> {
        Some(self.with_timezone(&Utc))
    }
}

impl DateLike for NaiveDate {
    fn instant(&self) -> Option<DateTime<Utc>> {
        local_midnight(*self)
    }

    fn local_date(&self) -> Option<NaiveDate> {
        Some(*self)
    }
}

impl DateLike for Value {
    fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Number(_) => parse_number(self).and_then(epoch_to_utc),
            Value::String(s) => parse_date_str(s),
            Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(parse_number);
                if let Some(seconds) = seconds {
                    let nanos = map
                        .get("nanoseconds")
                        .or_else(|| map.get("_nanoseconds"))
                        .and_then(parse_number)
                        .unwrap_or(0.0);
                    return Utc
                        .timestamp_opt(seconds.floor() as i64, nanos.clamp(0.0, 999_999_999.0) as u32)
                        .single();
                }
                ["toDate", "iso", "value", "$date"]
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .find_map(DateLike::instant)
            }
            _ => None,
        }
    }

    fn local_date(&self) -> Option<NaiveDate> {
        // A bare calendar day carries no time zone; keep it as written.
        if let Value::String(s) = self {
            if let Some(day) = parse_calendar_day(s.trim()) {
                return Some(day);
            }
        }
        self.instant()
            .map(|t| t.with_timezone(&Local).date_naive())
    }
}

fn epoch_to_utc(n: f64) -> Option<DateTime<Utc>> {
    if n.abs() >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(n as i64).single()
    } else {
        Utc.timestamp_opt(n.floor() as i64, 0).single()
    }
}

fn parse_calendar_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

fn local_midnight(day: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = day.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc));
        }
    }
    if let Some(day) = parse_calendar_day(s) {
        return local_midnight(day);
    }
    s.parse::<f64>().ok().and_then(epoch_to_utc)
}

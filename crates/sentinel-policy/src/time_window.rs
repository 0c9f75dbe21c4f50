//! Time-of-week windows for rule and auto-approve conditions.
//!
//! A window is a set of weekdays plus an optional `HH:MM`-`HH:MM` range,
//! interpreted in a fixed UTC offset. Start is inclusive, end exclusive. A
//! range whose end is earlier than its start spans midnight (`22:00`-`06:00`).

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

const MINUTES_PER_DAY: u32 = 24 * 60;

// ============================================================================
// Weekday
// ============================================================================

/// Day of the week, spelled out in lowercase in policy documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Monday through Friday.
    pub const WEEKDAYS: [Weekday; 5] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
    ];
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

// ============================================================================
// HourRange
// ============================================================================

/// Clock range in `HH:MM` form. `end` may be `24:00`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: String,
    pub end: String,
}

impl HourRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parses both bounds into minutes since midnight.
    fn bounds(&self) -> Result<(u32, u32)> {
        let start = parse_clock(&self.start)?;
        let end = parse_clock(&self.end)?;
        if start >= MINUTES_PER_DAY {
            return Err(PolicyError::InvalidTimeWindow(format!(
                "start {} must be before 24:00",
                self.start
            )));
        }
        if start == end {
            return Err(PolicyError::InvalidTimeWindow(format!(
                "empty hour range {}-{}",
                self.start, self.end
            )));
        }
        Ok((start, end))
    }
}

// ============================================================================
// TimeWindow
// ============================================================================

/// Days and hours during which a condition holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Permitted days; empty means every day.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<Weekday>,
    /// Permitted clock range; absent means all day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<HourRange>,
    /// Fixed UTC offset (`"UTC"`, `"+05:30"`, `"-08:00"`); absent means UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl TimeWindow {
    /// Business hours: Monday-Friday 09:00-17:00 UTC.
    pub fn business_hours() -> Self {
        Self {
            days: Weekday::WEEKDAYS.to_vec(),
            hours: Some(HourRange::new("09:00", "17:00")),
            timezone: None,
        }
    }

    /// Sets the timezone offset (builder pattern).
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Checks that the hour range and timezone parse.
    pub fn validate(&self) -> Result<()> {
        if let Some(hours) = &self.hours {
            hours.bounds()?;
        }
        self.offset()?;
        Ok(())
    }

    /// Returns true if `at` falls inside the window.
    ///
    /// A window that fails to parse never contains any instant.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let Ok(offset) = self.offset() else {
            return false;
        };
        let local = at.with_timezone(&offset);

        if !self.days.is_empty() && !self.days.contains(&Weekday::from(local.weekday())) {
            return false;
        }

        let Some(hours) = &self.hours else {
            return true;
        };
        let Ok((start, end)) = hours.bounds() else {
            return false;
        };
        let minute = local.hour() * 60 + local.minute();
        if start < end {
            minute >= start && minute < end
        } else {
            minute >= start || minute < end
        }
    }

    fn offset(&self) -> Result<FixedOffset> {
        parse_offset(self.timezone.as_deref().unwrap_or("UTC"))
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses `HH:MM` into minutes since midnight; `24:00` is accepted.
fn parse_clock(value: &str) -> Result<u32> {
    let invalid = || PolicyError::InvalidTimeWindow(format!("expected HH:MM, got {value:?}"));

    let (h, m) = value.split_once(':').ok_or_else(invalid)?;
    if h.len() != 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = h.parse().map_err(|_| invalid())?;
    let minutes: u32 = m.parse().map_err(|_| invalid())?;
    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Parses `UTC`, `Z`, or `±HH:MM` into a fixed offset.
fn parse_offset(value: &str) -> Result<FixedOffset> {
    let invalid = || PolicyError::InvalidTimeWindow(format!("unsupported timezone {value:?}"));

    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };
    let minutes = parse_clock(rest).map_err(|_| invalid())?;
    let secs = i32::try_from(minutes * 60).map_err(|_| invalid())?;
    FixedOffset::east_opt(sign * secs).ok_or_else(invalid)
}

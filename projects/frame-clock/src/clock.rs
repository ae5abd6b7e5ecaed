// Wall-clock time parsing shared by the OCR boundaries, CSV rows and jump input.

use chrono::{NaiveTime, Timelike};
use serde::{Serialize, Serializer};
use std::fmt;

const TWELVE_HOUR: &str = "%I:%M:%S %p";
const TWENTY_FOUR_HOUR: &str = "%H:%M:%S";

/// Time of day with second precision, independent of the source notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedTime(NaiveTime);

impl NormalizedTime {
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn second(&self) -> u32 {
        self.0.second()
    }

    pub fn seconds_of_day(&self) -> u32 {
        self.hour() * 3600 + self.minute() * 60 + self.second()
    }

    /// Signed number of seconds from `earlier` to `self`.
    pub fn seconds_since(&self, earlier: &NormalizedTime) -> f64 {
        (self.0 - earlier.0).num_seconds() as f64
    }
}

impl fmt::Display for NormalizedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TWENTY_FOUR_HOUR))
    }
}

impl Serialize for NormalizedTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_12_hour_time(text: &str) -> Option<NormalizedTime> {
    NaiveTime::parse_from_str(text, TWELVE_HOUR)
        .ok()
        .map(NormalizedTime)
}

fn parse_24_hour_time(text: &str) -> Option<NormalizedTime> {
    NaiveTime::parse_from_str(text, TWENTY_FOUR_HOUR)
        .ok()
        .map(NormalizedTime)
}

/// Parses `HH:MM:SS AM|PM` or `HH:MM:SS`.
///
/// The 12-hour form is tried first because the burned-in overlay always uses
/// it; CSV rows and the jump input may use either.
pub fn parse_time(text: &str) -> Option<NormalizedTime> {
    parse_12_hour_time(text).or_else(|| parse_24_hour_time(text))
}

/// Seconds since midnight, or 0 when `text` is not a time.
pub fn time_to_seconds(text: &str) -> u32 {
    parse_time(text).map(|t| t.seconds_of_day()).unwrap_or(0)
}

/// Renders a second count as `H:MM:SS`.
pub fn format_seconds(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!(
        "{}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

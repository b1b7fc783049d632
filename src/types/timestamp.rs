//! PTP sample timestamps and their calendar decomposition

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The PTP epoch year.
pub const EPOCH_YEAR: u64 = 1970;
const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_YEAR: u64 = 31_536_000;

/// A `{seconds, nanoseconds, attoseconds}` timestamp as carried in
/// `timing.sampleTimestamp` and `timing.recordedTimestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: u64,
    #[serde(default)]
    pub nanoseconds: u32,
    #[serde(default)]
    pub attoseconds: u64,
}

impl Timestamp {
    pub const fn new(seconds: u64, nanoseconds: u32) -> Self {
        Self { seconds, nanoseconds, attoseconds: 0 }
    }

    /// Read a timestamp object from a payload value.
    ///
    /// `seconds` is required. Missing `nanoseconds` or `attoseconds` read as 0.
    pub fn from_value(value: &Value) -> Option<Self> {
        let seconds = value.get("seconds")?.as_u64()?;
        let nanoseconds = value.get("nanoseconds").and_then(Value::as_u64).unwrap_or(0);
        let attoseconds = value.get("attoseconds").and_then(Value::as_u64).unwrap_or(0);
        Some(Self { seconds, nanoseconds: u32::try_from(nanoseconds).ok()?, attoseconds })
    }

    /// Build a timestamp from floating seconds, truncating below a nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        let secs = secs.max(0.0);
        let whole = secs.trunc();
        let nanoseconds = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
        Self::new(whole as u64, nanoseconds)
    }

    /// Seconds since the epoch including the sub-second parts.
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.nanoseconds as f64 * 1e-9 + self.attoseconds as f64 * 1e-18
    }

    /// Split into calendar parts using fixed 365-day years and 86 400-second
    /// days. Leap years and leap seconds are deliberately not applied.
    pub fn parts(&self) -> SampleTimeParts {
        let elapsed_years = self.seconds / SECONDS_PER_YEAR;
        let in_year = self.seconds - elapsed_years * SECONDS_PER_YEAR;
        let day = in_year / SECONDS_PER_DAY;
        let in_day = in_year - day * SECONDS_PER_DAY;
        let hour = in_day / SECONDS_PER_HOUR;
        let minute = (in_day - hour * SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
        let second = in_day - hour * SECONDS_PER_HOUR - minute * SECONDS_PER_MINUTE;

        SampleTimeParts {
            year: EPOCH_YEAR + elapsed_years,
            day: day as u32,
            hour: hour as u32,
            minute: minute as u32,
            second: second as u32,
            nanosecond: self.nanoseconds,
        }
    }

    /// Serialize as the payload object shape.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "seconds": self.seconds,
            "nanoseconds": self.nanoseconds,
            "attoseconds": self.attoseconds,
        })
    }
}

/// Calendar decomposition of a [`Timestamp`].
///
/// `day` is the 0-based day of the (365-day) year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleTimeParts {
    pub year: u64,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanosecond: u32,
}

impl SampleTimeParts {
    /// `HH:MM:SS:FF` since midnight, with the frame count taken from the
    /// sub-second part at `frame_rate`.
    pub fn timecode(&self, frame_rate: f64) -> String {
        let frames = (self.nanosecond as f64 * 1e-9 * frame_rate).floor() as u64;
        format!("{:02}:{:02}:{:02}:{:02}", self.hour, self.minute, self.second, frames)
    }

    /// Ordinal date form `YYYY-DDDTHH:MM:SS.N`.
    pub fn iso8601(&self) -> String {
        format!(
            "{:04}-{:03}T{:02}:{:02}:{:02}.{}",
            self.year, self.day, self.hour, self.minute, self.second, self.nanosecond
        )
    }
}

impl fmt::Display for SampleTimeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "year:{} day:{} hour:{} min:{} sec:{} nsec:{}",
            self.year, self.day, self.hour, self.minute, self.second, self.nanosecond
        )
    }
}

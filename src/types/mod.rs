//! Core value types shared by the sender and receiver.
//!
//! ## Overview
//!
//! - [`PayloadFormat`] is the encoding code carried in every datagram header
//! - [`TimeSource`] is the synchronization source a stream declares
//! - [`LengthUnit`], [`AngleUnit`] and [`Unit`] describe measurements and
//!   their conversions; [`TimeFormat`] selects a timestamp presentation
//! - [`Timestamp`] and [`SampleTimeParts`] hold PTP sample times
//! - [`UpdateRate`] controls how often a subscription yields samples
//!
//! ## Usage Example
//!
//! ```rust
//! use opentrackio::types::{LengthUnit, Timestamp};
//!
//! assert_eq!(LengthUnit::Meter.convert(1.0, LengthUnit::Centimeter), 100.0);
//!
//! let stamp = Timestamp::new(86_400 + 3_661, 500_000_000);
//! assert_eq!(stamp.parts().timecode(24.0), "01:01:01:12");
//! ```

mod payload_format;
mod time_source;
mod timestamp;
mod units;
mod update_rate;

pub use payload_format::PayloadFormat;
pub use time_source::TimeSource;
pub use timestamp::{EPOCH_YEAR, SampleTimeParts, Timestamp};
pub use units::{AngleUnit, LengthUnit, TimeFormat, Unit};
pub use update_rate::UpdateRate;

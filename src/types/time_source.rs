//! Synchronization source declared by a sample stream

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ProtocolError, Result};

/// External clock governing a sample stream.
///
/// Read from `timing.synchronization.source`. A stream that does not declare
/// a source is treated as [`TimeSource::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeSource {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "ptp")]
    Ptp,
    #[serde(rename = "ntp")]
    Ntp,
    #[serde(rename = "genlock")]
    Genlock,
    #[serde(rename = "videoIn")]
    VideoIn,
}

impl TimeSource {
    /// String used for this source in sample payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            TimeSource::None => "none",
            TimeSource::Ptp => "ptp",
            TimeSource::Ntp => "ntp",
            TimeSource::Genlock => "genlock",
            TimeSource::VideoIn => "videoIn",
        }
    }

    /// Parse the payload string for a source. Unknown strings yield `None`.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "none" => Some(TimeSource::None),
            "ptp" => Some(TimeSource::Ptp),
            "ntp" => Some(TimeSource::Ntp),
            "genlock" => Some(TimeSource::Genlock),
            "videoIn" => Some(TimeSource::VideoIn),
            _ => None,
        }
    }

    /// Whether the local clock must be disciplined by a network query.
    pub const fn needs_network_offset(self) -> bool {
        matches!(self, TimeSource::Ntp)
    }

    /// Timing mode a sender declares for this source.
    ///
    /// Sources without an inherent transport clock carry their own timestamp
    /// (`internal`); genlock and video input are `external`.
    pub const fn timing_mode(self) -> &'static str {
        match self {
            TimeSource::Ntp | TimeSource::Ptp | TimeSource::None => "internal",
            TimeSource::Genlock | TimeSource::VideoIn => "external",
        }
    }
}

impl FromStr for TimeSource {
    type Err = ProtocolError;

    /// Case-insensitive parse, for configuration files and command lines.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(TimeSource::None),
            "ptp" => Ok(TimeSource::Ptp),
            "ntp" => Ok(TimeSource::Ntp),
            "genlock" => Ok(TimeSource::Genlock),
            "videoin" => Ok(TimeSource::VideoIn),
            _ => Err(ProtocolError::config(format!(
                "Time source must be genlock, videoIn, ptp, ntp or none, got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Delivery rate for sample subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a subscription yields samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every sample as it is reassembled
    #[default]
    Native,

    /// At most this many samples per second, keeping the latest.
    /// A cap at or above the stream rate behaves as `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Resolve against the stream's nominal sample rate.
    ///
    /// A zero cap is treated as `Native` rather than stalling the stream.
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    pub fn needs_throttle(self, source_hz: f64) -> bool {
        matches!(self.normalize(source_hz), UpdateRate::Max(_))
    }

    /// Minimum spacing between yielded samples, if throttled.
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

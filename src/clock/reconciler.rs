//! Pins a stream's time source and derives the local reference time

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Clock;
use crate::Result;
use crate::sample::Sample;
use crate::types::TimeSource;

/// Supplies the offset between the local clock and a network time reference.
#[async_trait::async_trait]
pub trait OffsetSource: Send + Sync + 'static {
    /// Seconds to add to the local clock. Called at most once per reconciler.
    async fn query_offset(&self) -> Result<f64>;
}

/// An offset known ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixedOffset(pub f64);

#[async_trait::async_trait]
impl OffsetSource for FixedOffset {
    async fn query_offset(&self) -> Result<f64> {
        Ok(self.0)
    }
}

/// Offset to apply for `source`: queried once for NTP, 0 otherwise or when
/// the query fails.
pub(crate) async fn offset_for(source: TimeSource, offsets: &dyn OffsetSource) -> f64 {
    if !source.needs_network_offset() {
        return 0.0;
    }
    match offsets.query_offset().await {
        Ok(offset) => offset,
        Err(e) => {
            warn!("NTP offset unavailable, using local clock unmodified: {}", e);
            0.0
        }
    }
}

/// The pinned time source and its clock offset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSourceState {
    pub source: TimeSource,
    /// Seconds added to the local clock; non-zero only for NTP
    pub offset: f64,
}

/// Tracks which clock governs the stream and what local time corresponds to it.
///
/// The first observed sample pins the time source. An NTP source triggers
/// one offset query; a failed query leaves the offset at 0. Later samples
/// never change the pinned state.
pub struct TimeSourceReconciler {
    clock: Arc<dyn Clock>,
    offsets: Box<dyn OffsetSource>,
    state: Option<TimeSourceState>,
}

impl std::fmt::Debug for TimeSourceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSourceReconciler")
            .field("clock", &self.clock)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TimeSourceReconciler {
    pub fn new(clock: Arc<dyn Clock>, offsets: impl OffsetSource) -> Self {
        Self { clock, offsets: Box::new(offsets), state: None }
    }

    /// Pin the time source from `sample` if nothing is pinned yet.
    ///
    /// Returns the pinned state.
    pub async fn observe(&mut self, sample: &Sample) -> TimeSourceState {
        if let Some(state) = self.state {
            return state;
        }

        let source = sample.time_source();
        let offset = offset_for(source, self.offsets.as_ref()).await;

        let state = TimeSourceState { source, offset };
        info!("Time source pinned: {} (offset {:+.6}s)", source, offset);
        self.state = Some(state);
        state
    }

    pub fn state(&self) -> Option<TimeSourceState> {
        self.state
    }

    /// Wall clock, corrected by the NTP offset when the source is NTP.
    pub fn local_reference_time(&self) -> f64 {
        let now = self.clock.now();
        match self.state {
            Some(TimeSourceState { source: TimeSource::Ntp, offset }) => now + offset,
            _ => now,
        }
    }

    /// Local reference time minus the sample's own timestamp.
    ///
    /// For latency and drift observation only.
    pub fn reference_delta(&self, sample: &Sample) -> Option<f64> {
        let stamp = sample.sample_timestamp()?;
        Some(self.local_reference_time() - stamp.as_secs_f64())
    }
}

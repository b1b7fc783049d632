//! Sender-side sample timestamps

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::info;

use super::Clock;
use super::reconciler::{OffsetSource, offset_for};
use crate::types::{TimeSource, Timestamp};

/// Writes the sender's reference time and declared time source into
/// outgoing samples.
///
/// For an NTP source the offset is queried once when the stamper is
/// resolved; a failed query leaves the local clock unmodified.
#[derive(Debug, Clone)]
pub struct SampleStamper {
    clock: Arc<dyn Clock>,
    source: TimeSource,
    offset: f64,
}

impl SampleStamper {
    /// A stamper that applies no offset.
    pub fn new(clock: Arc<dyn Clock>, source: TimeSource) -> Self {
        Self { clock, source, offset: 0.0 }
    }

    /// Query `offsets` if `source` needs it and return the stamper.
    pub async fn resolve(
        clock: Arc<dyn Clock>,
        source: TimeSource,
        offsets: &dyn OffsetSource,
    ) -> Self {
        let offset = offset_for(source, offsets).await;
        info!("Sender time source: {} (offset {:+.6}s)", source, offset);
        Self { clock, source, offset }
    }

    pub fn source(&self) -> TimeSource {
        self.source
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Local clock plus the offset.
    pub fn reference_time(&self) -> f64 {
        self.clock.now() + self.offset
    }

    /// Set `timing.sampleTimestamp`, `timing.mode` and
    /// `timing.synchronization.source` on `value`.
    ///
    /// Returns the timestamp written. A non-object `value` is left as is.
    pub fn stamp(&self, value: &mut Value) -> Timestamp {
        let stamp = Timestamp::from_secs_f64(self.reference_time());
        let Some(root) = value.as_object_mut() else {
            return stamp;
        };

        if let Some(timing) = object_entry(root, "timing") {
            timing.insert(
                "sampleTimestamp".to_string(),
                json!({"seconds": stamp.seconds, "nanoseconds": stamp.nanoseconds}),
            );
            timing.insert("mode".to_string(), json!(self.source.timing_mode()));
            if let Some(sync) = object_entry(timing, "synchronization") {
                sync.insert("source".to_string(), json!(self.source.as_str()));
            }
        }
        stamp
    }
}

/// The object at `key`, replacing any non-object value found there.
fn object_entry<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
) -> Option<&'a mut Map<String, Value>> {
    let entry = map.entry(key).or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    entry.as_object_mut()
}

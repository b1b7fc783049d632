//! Decoded samples and typed accessors.
//!
//! A [`Sample`] is one reassembled and parsed payload together with its
//! receive metadata. Fields that carry no unit are read directly from the
//! sample; unit-bearing measurements go through a [`SampleDecoder`], which
//! applies the schema's declared units and the caller's [`UnitPreferences`].
//!
//! ```rust
//! use opentrackio::sample::{Sample, SampleDecoder, TranslationAxis};
//! use opentrackio::schema::SchemaUnits;
//! use opentrackio::types::LengthUnit;
//! use serde_json::json;
//!
//! let sample = Sample::from_value(json!({
//!     "transforms": [{"id": "Camera", "translation": {"x": 0.0, "y": 0.0, "z": 1.0}}]
//! }));
//! let units = SchemaUnits::from_schema(&json!({"properties": {"transforms": {"items": {
//!     "properties": {"translation": {"units": "meter"}}
//! }}}}))?;
//!
//! let mut decoder = SampleDecoder::new(units);
//! decoder.set_translation_units(LengthUnit::Centimeter);
//! let z = decoder.camera_translation(&sample, TranslationAxis::Z).unwrap();
//! assert_eq!(z.value, 100.0);
//! # Ok::<(), opentrackio::ProtocolError>(())
//! ```

mod decoder;

pub use decoder::{
    Conversion, DEFAULT_TRANSFORM_ID, Measurement, Rotation, RotationAxis, SampleDecoder,
    SampleTime, Translation, TranslationAxis, UnitPreferences,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload;
use crate::schema::resolve_path;
use crate::types::{PayloadFormat, TimeSource, Timestamp};
use crate::wire::AssembledPayload;
use crate::Result;

/// Raw lens encoder positions, normalized 0..1 by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LensEncoders {
    pub focus: Option<f64>,
    pub iris: Option<f64>,
    pub zoom: Option<f64>,
}

/// One decoded sample.
///
/// Immutable once decoded. `sequence_number` and `byte_len` describe how the
/// sample arrived; locally built samples carry 0 for both.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    value: Value,
    sequence_number: u16,
    format: PayloadFormat,
    byte_len: usize,
}

impl Sample {
    /// Parse a reassembled payload.
    pub fn decode(assembled: &AssembledPayload) -> Result<Self> {
        let value = payload::decode(&assembled.bytes, assembled.format)?;
        Ok(Self {
            value,
            sequence_number: assembled.sequence_number,
            format: assembled.format,
            byte_len: assembled.bytes.len(),
        })
    }

    /// Wrap a payload value that did not come off the wire.
    pub fn from_value(value: Value) -> Self {
        Self { value, sequence_number: 0, format: PayloadFormat::default(), byte_len: 0 }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Size of the reassembled payload in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Value at a nested key path.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        resolve_path(&self.value, path)
    }

    fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    fn get_f64(&self, path: &[&str]) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    /// First transform whose id contains `id`.
    pub fn transform(&self, id: &str) -> Option<&Value> {
        self.get(&["transforms"])?.as_array()?.iter().find(|transform| {
            transform.get("id").and_then(Value::as_str).is_some_and(|name| name.contains(id))
        })
    }

    pub fn protocol_name(&self) -> Option<&str> {
        self.get_str(&["protocol", "name"])
    }

    /// Protocol version as its numeric components.
    pub fn protocol_version(&self) -> Option<Vec<u64>> {
        self.get(&["protocol", "version"])?.as_array()?.iter().map(Value::as_u64).collect()
    }

    /// Protocol version joined as `major.minor.patch`.
    pub fn protocol_version_string(&self) -> Option<String> {
        let parts = self.protocol_version()?;
        Some(parts.iter().map(u64::to_string).collect::<Vec<_>>().join("."))
    }

    pub fn source_id(&self) -> Option<&str> {
        self.get_str(&["sourceId"])
    }

    pub fn source_number(&self) -> Option<u64> {
        self.get(&["sourceNumber"]).and_then(Value::as_u64)
    }

    pub fn sample_id(&self) -> Option<&str> {
        self.get_str(&["sampleId"])
    }

    /// Scene, setup and take denoted by the tracker.
    pub fn slate(&self) -> Option<&str> {
        self.get_str(&["tracker", "slate"])
    }

    pub fn tracker_status(&self) -> Option<&str> {
        self.get_str(&["tracker", "status"])
    }

    /// Serial number of the tracking device, from the static block.
    pub fn tracker_serial_number(&self) -> Option<&str> {
        self.get_str(&["static", "tracker", "serialNumber"])
    }

    /// Serial number of the camera, from the static block.
    pub fn camera_serial_number(&self) -> Option<&str> {
        self.get_str(&["static", "camera", "serialNumber"])
    }

    /// Active sensor height in pixels, from the static block.
    pub fn sensor_resolution_height(&self) -> Option<u64> {
        self.get(&["static", "camera", "activeSensorResolution", "height"]).and_then(Value::as_u64)
    }

    /// Active sensor width in pixels, from the static block.
    pub fn sensor_resolution_width(&self) -> Option<u64> {
        self.get(&["static", "camera", "activeSensorResolution", "width"]).and_then(Value::as_u64)
    }

    pub fn lens_encoders(&self) -> Option<LensEncoders> {
        let encoders = self.get(&["lens", "encoders"])?;
        Some(LensEncoders {
            focus: encoders.get("focus").and_then(Value::as_f64),
            iris: encoders.get("iris").and_then(Value::as_f64),
            zoom: encoders.get("zoom").and_then(Value::as_f64),
        })
    }

    pub fn f_stop(&self) -> Option<f64> {
        self.get_f64(&["lens", "fStop"])
    }

    /// Declared synchronization source. Absent or unknown reads as `None`.
    pub fn time_source(&self) -> TimeSource {
        self.get_str(&["timing", "synchronization", "source"])
            .and_then(TimeSource::from_wire)
            .unwrap_or_default()
    }

    pub fn is_sync_locked(&self) -> Option<bool> {
        self.get(&["timing", "synchronization", "locked"]).and_then(Value::as_bool)
    }

    pub fn sample_timestamp(&self) -> Option<Timestamp> {
        self.get(&["timing", "sampleTimestamp"]).and_then(Timestamp::from_value)
    }

    pub fn recorded_timestamp(&self) -> Option<Timestamp> {
        self.get(&["timing", "recordedTimestamp"]).and_then(Timestamp::from_value)
    }

    /// House timecode as `HH:MM:SS:FF`.
    pub fn timecode(&self) -> Option<String> {
        let timecode = self.get(&["timing", "timecode"])?;
        let field = |name: &str| timecode.get(name).and_then(Value::as_u64);
        Some(format!(
            "{:02}:{:02}:{:02}:{:02}",
            field("hours")?,
            field("minutes")?,
            field("seconds")?,
            field("frames")?
        ))
    }

    /// Frame rate the house timecode counts in.
    ///
    /// Read from `timing.timecode.frameRate`, falling back to
    /// `timing.sampleRate` and then `timing.frameRate`.
    pub fn timecode_frame_rate(&self) -> Option<f64> {
        [
            &["timing", "timecode", "frameRate"][..],
            &["timing", "sampleRate"][..],
            &["timing", "frameRate"][..],
        ]
        .iter()
        .find_map(|path| self.get(path).and_then(rational))
    }
}

/// `{num, denom}` as a float. A zero denominator is not a rate.
fn rational(value: &Value) -> Option<f64> {
    let num = value.get("num")?.as_f64()?;
    let denom = value.get("denom")?.as_f64()?;
    if denom == 0.0 { None } else { Some(num / denom) }
}

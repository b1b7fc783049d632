//! Test fixtures for samples, schemas and datagram streams
//!
//! Builders here produce payloads shaped like a real tracker's output so unit
//! tests and benchmarks exercise the same field layout the receiver sees.

#![cfg(any(test, feature = "benchmark"))]

use serde_json::{Value, json};

use crate::payload;
use crate::sample::Sample;
use crate::types::{PayloadFormat, TimeSource};
use crate::wire::{Segmentation, Segmenter};

/// Source UUID used by every fixture sample.
pub const FIXTURE_SOURCE_ID: &str = "urn:uuid:5ca3f4e2-3c6b-4a4e-9f3a-0f1e2d3c4b5a";

/// A complete sample payload from a tracker running on its internal clock.
pub fn sample_payload() -> Value {
    SampleBuilder::new().build_value()
}

/// Schema document declaring units the way the current protocol schema does.
pub fn schema_document() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "OpenTrackIO",
        "type": "object",
        "properties": {
            "static": {
                "type": "object",
                "properties": {
                    "camera": {
                        "type": "object",
                        "properties": {
                            "activeSensorPhysicalDimensions": {
                                "type": "object",
                                "units": "millimeter"
                            },
                            "activeSensorResolution": {"type": "object", "units": "pixel"}
                        }
                    }
                }
            },
            "lens": {
                "type": "object",
                "properties": {
                    "entrancePupilOffset": {"type": "number", "units": "meter"},
                    "focusDistance": {"type": "number", "units": "meter"},
                    "pinholeFocalLength": {"type": "number", "units": "millimeter"}
                }
            },
            "timing": {
                "type": "object",
                "properties": {
                    "sampleTimestamp": {"type": "object", "units": "second"}
                }
            },
            "transforms": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "translation": {"type": "object", "units": "meter"},
                        "rotation": {"type": "object", "units": "degree"}
                    }
                }
            }
        }
    })
}

/// Fluent builder for sample payloads.
#[derive(Debug, Clone)]
pub struct SampleBuilder {
    value: Value,
}

impl Default for SampleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuilder {
    pub fn new() -> Self {
        let value = json!({
            "tracker": {
                "notes": "Example generated sample.",
                "recording": false,
                "slate": "A101_A_4",
                "status": "Optical Good"
            },
            "timing": {
                "mode": "internal",
                "sampleRate": {"num": 24000, "denom": 1001},
                "sampleTimestamp": {"seconds": 1_718_000_000u64, "nanoseconds": 0},
                "synchronization": {"locked": true, "source": "ptp"},
                "timecode": {
                    "hours": 1,
                    "minutes": 0,
                    "seconds": 0,
                    "frames": 0,
                    "frameRate": {"num": 24000, "denom": 1001}
                }
            },
            "lens": {
                "encoders": {"focus": 0.1, "iris": 0.2, "zoom": 0.3},
                "entrancePupilOffset": 0.123,
                "fStop": 4.0,
                "pinholeFocalLength": 24.305,
                "focusDistance": 10.0
            },
            "protocol": {"name": "OpenTrackIO", "version": [1, 0, 0]},
            "sampleId": "urn:uuid:0b7d3a58-8a1c-4d3b-9e8f-6a5b4c3d2e1f",
            "sourceId": FIXTURE_SOURCE_ID,
            "sourceNumber": 1,
            "transforms": [{
                "translation": {"x": 0.0, "y": 0.0, "z": 0.0},
                "rotation": {"pan": 0.0, "tilt": 0.0, "roll": 0.0},
                "id": "Camera"
            }]
        });
        Self { value }
    }

    pub fn translation(mut self, x: f64, y: f64, z: f64) -> Self {
        self.value["transforms"][0]["translation"] = json!({"x": x, "y": y, "z": z});
        self
    }

    pub fn rotation(mut self, pan: f64, tilt: f64, roll: f64) -> Self {
        self.value["transforms"][0]["rotation"] = json!({"pan": pan, "tilt": tilt, "roll": roll});
        self
    }

    pub fn timestamp(mut self, seconds: u64, nanoseconds: u32) -> Self {
        self.value["timing"]["sampleTimestamp"] =
            json!({"seconds": seconds, "nanoseconds": nanoseconds});
        self
    }

    pub fn timecode(mut self, hours: u32, minutes: u32, seconds: u32, frames: u32) -> Self {
        let timecode = &mut self.value["timing"]["timecode"];
        timecode["hours"] = json!(hours);
        timecode["minutes"] = json!(minutes);
        timecode["seconds"] = json!(seconds);
        timecode["frames"] = json!(frames);
        self
    }

    pub fn time_source(mut self, source: TimeSource) -> Self {
        self.value["timing"]["mode"] = json!(source.timing_mode());
        self.value["timing"]["synchronization"]["source"] = json!(source.as_str());
        self
    }

    pub fn focus_distance(mut self, meters: f64) -> Self {
        self.value["lens"]["focusDistance"] = json!(meters);
        self
    }

    pub fn source_number(mut self, number: u8) -> Self {
        self.value["sourceNumber"] = json!(number);
        self
    }

    /// Add the static block carried by the first sample of a stream.
    pub fn with_static_block(mut self) -> Self {
        self.value["static"] = json!({
            "camera": {
                "activeSensorPhysicalDimensions": {"height": 24.0, "width": 36.0},
                "activeSensorResolution": {"height": 2160, "width": 3840},
                "make": "CameraMaker",
                "serialNumber": "9876543210B"
            },
            "tracker": {
                "make": "TrackerMaker",
                "serialNumber": "1234567890A"
            }
        });
        self
    }

    pub fn build_value(self) -> Value {
        self.value
    }

    pub fn build(self) -> Sample {
        Sample::from_value(self.value)
    }
}

/// Serialize and fragment `value` with a fresh segmenter, so the datagrams
/// always carry sequence number 1. Use [`segment_value`] with a shared
/// segmenter for streams of several samples.
pub fn datagrams_for(
    value: &Value,
    format: PayloadFormat,
    segmentation: Segmentation,
) -> Vec<Vec<u8>> {
    segment_value(&mut Segmenter::new(format, segmentation), value)
}

/// Serialize `value` in the segmenter's format and fragment it under the
/// segmenter's next sequence number.
pub fn segment_value(segmenter: &mut Segmenter, value: &Value) -> Vec<Vec<u8>> {
    let bytes = match payload::encode(value, segmenter.format()) {
        Ok(bytes) => bytes,
        Err(e) => panic!("fixture payload failed to encode: {}", e),
    };
    match segmenter.segment(&bytes) {
        Ok(datagrams) => datagrams,
        Err(e) => panic!("fixture payload failed to segment: {}", e),
    }
}

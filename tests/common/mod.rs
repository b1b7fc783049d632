//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::time::Instant;

use opentrackio::wire::{AssembledPayload, Reassembler, Segmentation, Segmenter};
use opentrackio::{PayloadFormat, payload};
use serde_json::{Value, json};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// A sample with one camera transform at `translation` meters.
pub fn sample_at(translation: [f64; 3]) -> Value {
    json!({
        "protocol": {"name": "OpenTrackIO", "version": [1, 0, 0]},
        "sourceId": "urn:uuid:5ca3f4e2-3c6b-4a4e-9f3a-0f1e2d3c4b5a",
        "sourceNumber": 1,
        "sampleId": "urn:uuid:0b7d3a58-8a1c-4d3b-9e8f-6a5b4c3d2e1f",
        "timing": {
            "mode": "internal",
            "sampleRate": {"num": 24000, "denom": 1001},
            "sampleTimestamp": {"seconds": 100, "nanoseconds": 0},
            "synchronization": {"locked": true, "source": "ptp"}
        },
        "lens": {"focusDistance": 2.5, "pinholeFocalLength": 35.0},
        "transforms": [{
            "id": "Camera",
            "translation": {"x": translation[0], "y": translation[1], "z": translation[2]},
            "rotation": {"pan": 90.0, "tilt": 0.0, "roll": 0.0}
        }]
    })
}

/// Schema declaring meters for translation and degrees for rotation.
pub fn schema_text() -> &'static str {
    r#"{
        "type": "object",
        "properties": {
            "lens": {
                "type": "object",
                "properties": {
                    "focusDistance": {"type": "number", "units": "meter"},
                    "pinholeFocalLength": {"type": "number", "units": "millimeter"}
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
    }"#
}

pub fn datagrams(value: &Value, format: PayloadFormat, segmentation: Segmentation) -> Vec<Vec<u8>> {
    let bytes = payload::encode(value, format).expect("fixture encodes");
    Segmenter::new(format, segmentation).segment(&bytes).expect("fixture segments")
}

/// Feed datagrams in the given order; return every completed payload.
pub fn reassemble_all(
    reassembler: &mut Reassembler,
    datagrams: impl IntoIterator<Item = Vec<u8>>,
) -> Vec<AssembledPayload> {
    let now = Instant::now();
    datagrams
        .into_iter()
        .filter_map(|d| reassembler.accept(&d, now).ok().flatten())
        .collect()
}

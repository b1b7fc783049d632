//! Sample payload serialization
//!
//! Payloads are held as a [`serde_json::Value`] tree and written as JSON text
//! or CBOR. Both encodings carry the same field names and value types, so a
//! value survives either one unchanged (floats excepted where JSON text
//! cannot represent them exactly).

use serde_json::Value;

use crate::types::PayloadFormat;
use crate::{ProtocolError, Result};

/// Serialize `value` in `format`.
pub fn encode(value: &Value, format: PayloadFormat) -> Result<Vec<u8>> {
    match format {
        PayloadFormat::Json => serde_json::to_vec(value).map_err(|e| ProtocolError::PayloadEncode {
            format: format.name(),
            details: e.to_string(),
        }),
        PayloadFormat::Cbor => {
            let mut bytes = Vec::new();
            ciborium::into_writer(value, &mut bytes).map_err(|e| {
                ProtocolError::PayloadEncode { format: format.name(), details: e.to_string() }
            })?;
            Ok(bytes)
        }
    }
}

/// Parse a reassembled payload.
pub fn decode(bytes: &[u8], format: PayloadFormat) -> Result<Value> {
    match format {
        PayloadFormat::Json => serde_json::from_slice(bytes).map_err(|e| {
            ProtocolError::PayloadDecode { format: format.name(), details: e.to_string() }
        }),
        PayloadFormat::Cbor => ciborium::from_reader::<Value, _>(bytes).map_err(|e| {
            ProtocolError::PayloadDecode { format: format.name(), details: e.to_string() }
        }),
    }
}

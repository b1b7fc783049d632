//! Payload encoding carried in the datagram header

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ProtocolError, Result};

/// Serialization of a reassembled sample payload.
///
/// The wire code lives in byte 5 of every datagram header. Both formats carry
/// the same field names and value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// UTF-8 JSON text (wire code `0x01`)
    #[default]
    Json,
    /// CBOR binary map (wire code `0x02`)
    Cbor,
}

impl PayloadFormat {
    /// Wire code written into the header encoding byte.
    pub const fn code(self) -> u8 {
        match self {
            PayloadFormat::Json => 0x01,
            PayloadFormat::Cbor => 0x02,
        }
    }

    /// Short uppercase name used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            PayloadFormat::Json => "JSON",
            PayloadFormat::Cbor => "CBOR",
        }
    }
}

impl TryFrom<u8> for PayloadFormat {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(PayloadFormat::Json),
            0x02 => Ok(PayloadFormat::Cbor),
            other => Err(ProtocolError::UnsupportedEncoding { code: other }),
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "JSON" => Ok(PayloadFormat::Json),
            "CBOR" => Ok(PayloadFormat::Cbor),
            _ => Err(ProtocolError::config(format!("Format must be JSON or CBOR, got '{}'", s))),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! Error types for the OpenTrackIO transport.
//!
//! Every failure the sender or receiver can produce is a [`ProtocolError`].
//! Most variants describe a single rejected datagram: the receive loop logs
//! them and moves on to the next datagram, so none of them is fatal to a
//! running receiver.
//!
//! ## Error Categories
//!
//! - **Fragment rejections**: malformed header, checksum mismatch, duplicate
//!   sequence number, unsupported payload encoding
//! - **Payload errors**: a fully reassembled payload that is not valid JSON/CBOR
//! - **Schema errors**: a schema document that cannot back the field table
//! - **Configuration errors**: out-of-range ports or source numbers
//! - **I/O, timeout and NTP errors**: socket setup and time-source queries
//!
//! ## Classification
//!
//! ```rust
//! use opentrackio::ProtocolError;
//!
//! let error = ProtocolError::ChecksumMismatch { expected: 0x1234, actual: 0x4321 };
//! assert!(error.is_fragment_rejection());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Main error type for transport operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProtocolError {
    #[error("Malformed datagram header: {reason}")]
    MalformedHeader { reason: String },

    #[error("Checksum mismatch: header carries {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Duplicate sequence number {sequence_number}")]
    DuplicateSequence { sequence_number: u16 },

    #[error("Unsupported payload encoding {code:#04x}")]
    UnsupportedEncoding { code: u8 },

    #[error("Failed to decode {format} payload: {details}")]
    PayloadDecode { format: &'static str, details: String },

    #[error("Failed to encode {format} payload: {details}")]
    PayloadEncode { format: &'static str, details: String },

    #[error("Schema error in {context}: {details}")]
    Schema { context: String, details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Socket error during {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("NTP query to {server} failed: {reason}")]
    Ntp { server: String, reason: String },
}

impl ProtocolError {
    /// Returns whether this error rejects a single datagram only.
    ///
    /// Rejected datagrams are dropped; the sample they belonged to is lost
    /// unless the sender transmits it again.
    pub fn is_fragment_rejection(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedHeader { .. }
                | ProtocolError::ChecksumMismatch { .. }
                | ProtocolError::DuplicateSequence { .. }
                | ProtocolError::UnsupportedEncoding { .. }
        )
    }

    /// Returns whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProtocolError::Io { .. } => true,
            ProtocolError::Timeout { .. } => true,
            ProtocolError::Ntp { .. } => true,
            ProtocolError::MalformedHeader { .. } => false,
            ProtocolError::ChecksumMismatch { .. } => false,
            ProtocolError::DuplicateSequence { .. } => false,
            ProtocolError::UnsupportedEncoding { .. } => false,
            ProtocolError::PayloadDecode { .. } => false,
            ProtocolError::PayloadEncode { .. } => false,
            ProtocolError::Schema { .. } => false,
            ProtocolError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ProtocolError::MalformedHeader { .. } => vec![
                "Check that the sender uses the 16-byte OTrk header layout",
                "Verify the receive buffer is at least as large as the sender MTU",
            ],
            ProtocolError::ChecksumMismatch { .. } => vec![
                "Check the network path for corruption",
                "Verify the sender computes Fletcher-16 over header and payload",
            ],
            ProtocolError::DuplicateSequence { .. } => vec![
                "Check for multiple senders on the same multicast group",
                "Verify the sender increments the sequence number per sample",
            ],
            ProtocolError::UnsupportedEncoding { .. } => vec![
                "Configure the sender for JSON or CBOR payloads",
                "Update the receiver to a version supporting the encoding",
            ],
            ProtocolError::PayloadDecode { .. } => vec![
                "Verify the payload matches the encoding code in the header",
                "Check the sender serializer output",
            ],
            ProtocolError::PayloadEncode { .. } => vec![
                "Check the sample contains only JSON-compatible values",
            ],
            ProtocolError::Schema { .. } => vec![
                "Check the schema file is a valid OpenTrackIO JSON schema",
                "Download the current schema from opentrackio.org",
            ],
            ProtocolError::Config { .. } => vec![
                "Use a port between 49152 and 65535",
                "Use a source number between 1 and 200",
            ],
            ProtocolError::Io { .. } => vec![
                "Check the network interface supports multicast",
                "Verify no other process holds the port exclusively",
                "Check firewall rules for UDP traffic",
            ],
            ProtocolError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Check network connectivity",
            ],
            ProtocolError::Ntp { .. } => vec![
                "Check the NTP server address",
                "Verify outbound UDP port 123 is allowed",
                "Continue with the local system clock",
            ],
        }
    }

    /// Helper constructor for malformed header errors.
    pub fn malformed(reason: impl Into<String>) -> Self {
        ProtocolError::MalformedHeader { reason: reason.into() }
    }

    /// Helper constructor for schema errors.
    pub fn schema(context: impl Into<String>, details: impl Into<String>) -> Self {
        ProtocolError::Schema { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        ProtocolError::Config { reason: reason.into() }
    }

    /// Helper constructor for socket errors with operation context.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        ProtocolError::Io { operation: operation.into(), source }
    }

    /// Helper constructor for NTP failures.
    pub fn ntp(server: impl Into<String>, reason: impl Into<String>) -> Self {
        ProtocolError::Ntp { server: server.into(), reason: reason.into() }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Io { operation: "<unknown>".to_string(), source: err }
    }
}

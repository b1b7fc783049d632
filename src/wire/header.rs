//! Datagram header codec
//!
//! Every datagram starts with a fixed 16-byte header in network byte order:
//!
//! | Offset | Size | Field                                             |
//! |--------|------|---------------------------------------------------|
//! | 0      | 4    | identifier `"OTrk"`                               |
//! | 4      | 1    | reserved, written as 0 and ignored on receive     |
//! | 5      | 1    | payload encoding code                             |
//! | 6      | 2    | sequence number                                   |
//! | 8      | 4    | segment offset                                    |
//! | 12     | 2    | last-segment flag (bit 15) and payload length     |
//! | 14     | 2    | Fletcher-16 over bytes 0..14 and the payload      |
//!
//! The payload slice follows the header directly.

use super::checksum::fletcher16;
use crate::types::PayloadFormat;
use crate::{ProtocolError, Result};

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 16;

/// Identifier opening every datagram.
pub const MAGIC: [u8; 4] = *b"OTrk";

/// Largest payload slice one datagram can describe (15-bit length field).
pub const MAX_SEGMENT_PAYLOAD: usize = 0x7FFF;

const LAST_SEGMENT_FLAG: u16 = 0x8000;
const LENGTH_MASK: u16 = 0x7FFF;
const CHECKSUMMED_LEN: usize = 14;

/// Decoded header of one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub encoding: PayloadFormat,
    pub sequence_number: u16,
    pub segment_offset: u32,
    pub last_segment: bool,
    pub payload_length: u16,
    pub checksum: u16,
}

impl DatagramHeader {
    /// Build the header describing `payload`, filling in its length and
    /// checksum.
    pub fn new(
        encoding: PayloadFormat,
        sequence_number: u16,
        segment_offset: u32,
        last_segment: bool,
        payload: &[u8],
    ) -> Result<Self> {
        if payload.len() > MAX_SEGMENT_PAYLOAD {
            return Err(ProtocolError::malformed(format!(
                "segment of {} bytes exceeds the {} byte length field",
                payload.len(),
                MAX_SEGMENT_PAYLOAD
            )));
        }

        let mut header = Self {
            encoding,
            sequence_number,
            segment_offset,
            last_segment,
            payload_length: payload.len() as u16,
            checksum: 0,
        };
        header.checksum = fletcher16(&[&header.checksummed_prefix(), payload]);
        Ok(header)
    }

    fn checksummed_prefix(&self) -> [u8; CHECKSUMMED_LEN] {
        let mut prefix = [0u8; CHECKSUMMED_LEN];
        prefix[0..4].copy_from_slice(&MAGIC);
        prefix[4] = 0;
        prefix[5] = self.encoding.code();
        prefix[6..8].copy_from_slice(&self.sequence_number.to_be_bytes());
        prefix[8..12].copy_from_slice(&self.segment_offset.to_be_bytes());

        let mut length_word = self.payload_length & LENGTH_MASK;
        if self.last_segment {
            length_word |= LAST_SEGMENT_FLAG;
        }
        prefix[12..14].copy_from_slice(&length_word.to_be_bytes());
        prefix
    }

    /// Serialize to the 16 wire bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..CHECKSUMMED_LEN].copy_from_slice(&self.checksummed_prefix());
        bytes[CHECKSUMMED_LEN..].copy_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    /// Parse and validate one datagram, returning its header and payload slice.
    ///
    /// The checksum is verified before the encoding byte is interpreted, so a
    /// corrupted encoding byte reports as a checksum mismatch.
    pub fn decode(datagram: &[u8]) -> Result<(Self, &[u8])> {
        if datagram.len() < HEADER_LEN {
            return Err(ProtocolError::malformed(format!(
                "datagram of {} bytes is shorter than the {} byte header",
                datagram.len(),
                HEADER_LEN
            )));
        }

        if datagram[0..4] != MAGIC {
            return Err(ProtocolError::malformed(format!(
                "identifier {:02x?} does not match {:02x?}",
                &datagram[0..4],
                MAGIC
            )));
        }

        let length_word = u16::from_be_bytes([datagram[12], datagram[13]]);
        let payload_length = length_word & LENGTH_MASK;
        let payload = &datagram[HEADER_LEN..];
        if payload.len() != payload_length as usize {
            return Err(ProtocolError::malformed(format!(
                "header declares {} payload bytes but {} follow",
                payload_length,
                payload.len()
            )));
        }

        let expected = u16::from_be_bytes([datagram[14], datagram[15]]);
        let actual = fletcher16(&[&datagram[..CHECKSUMMED_LEN], payload]);
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        let encoding = PayloadFormat::try_from(datagram[5])?;
        let header = Self {
            encoding,
            sequence_number: u16::from_be_bytes([datagram[6], datagram[7]]),
            segment_offset: u32::from_be_bytes([
                datagram[8],
                datagram[9],
                datagram[10],
                datagram[11],
            ]),
            last_segment: length_word & LAST_SEGMENT_FLAG != 0,
            payload_length,
            checksum: expected,
        };
        Ok((header, payload))
    }
}

/// Concatenate an encoded header and its payload into one datagram.
pub fn encode_datagram(header: &DatagramHeader, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(HEADER_LEN + payload.len());
    datagram.extend_from_slice(&header.encode());
    datagram.extend_from_slice(payload);
    datagram
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn datagram(payload: &[u8], last: bool) -> Vec<u8> {
        let header = DatagramHeader::new(PayloadFormat::Json, 7, 1968, last, payload).unwrap();
        encode_datagram(&header, payload)
    }

    #[test]
    fn layout_is_big_endian() {
        let bytes = datagram(b"{}", true);
        assert_eq!(&bytes[0..4], b"OTrk");
        assert_eq!(bytes[4], 0);
        assert_eq!(bytes[5], 0x01);
        assert_eq!(&bytes[6..8], &[0x00, 0x07]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x07, 0xB0]);
        assert_eq!(&bytes[12..14], &[0x80, 0x02]);
        assert_eq!(&bytes[16..], b"{}");

        let checksum = fletcher16(&[&bytes[..14], b"{}"]);
        assert_eq!(&bytes[14..16], &checksum.to_be_bytes());
    }

    #[test]
    fn decode_returns_fields_and_payload() {
        let bytes = datagram(b"payload", false);
        let (header, payload) = DatagramHeader::decode(&bytes).unwrap();
        assert_eq!(header.encoding, PayloadFormat::Json);
        assert_eq!(header.sequence_number, 7);
        assert_eq!(header.segment_offset, 1968);
        assert!(!header.last_segment);
        assert_eq!(header.payload_length, 7);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn reserved_byte_is_ignored_but_checksummed() {
        let mut bytes = datagram(b"x", true);
        bytes[4] = 0x5A;
        // Recompute the checksum as a sender setting the byte would
        let checksum = fletcher16(&[&bytes[..14], &bytes[16..]]);
        bytes[14..16].copy_from_slice(&checksum.to_be_bytes());
        assert!(DatagramHeader::decode(&bytes).is_ok());
    }

    #[test]
    fn short_datagram_is_malformed() {
        let err = DatagramHeader::decode(&[0u8; 15]).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHeader { .. }));
    }

    #[test]
    fn wrong_identifier_is_malformed() {
        let mut bytes = datagram(b"abc", true);
        bytes[0..4].copy_from_slice(b"OTRK");
        assert!(matches!(
            DatagramHeader::decode(&bytes),
            Err(ProtocolError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let bytes = datagram(b"abcdef", true);
        assert!(matches!(
            DatagramHeader::decode(&bytes[..bytes.len() - 1]),
            Err(ProtocolError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let mut bytes = datagram(b"abc", true);
        bytes[5] = 0x03;
        let checksum = fletcher16(&[&bytes[..14], &bytes[16..]]);
        bytes[14..16].copy_from_slice(&checksum.to_be_bytes());
        assert!(matches!(
            DatagramHeader::decode(&bytes),
            Err(ProtocolError::UnsupportedEncoding { code: 0x03 })
        ));
    }

    #[test]
    fn oversized_segment_is_refused() {
        let payload = vec![0u8; MAX_SEGMENT_PAYLOAD + 1];
        assert!(DatagramHeader::new(PayloadFormat::Cbor, 1, 0, true, &payload).is_err());
    }

    proptest! {
        #[test]
        fn encode_decode_preserves_header(
            sequence_number in any::<u16>(),
            segment_offset in any::<u32>(),
            last_segment in any::<bool>(),
            cbor in any::<bool>(),
            payload in prop::collection::vec(any::<u8>(), 0..600),
        ) {
            let encoding = if cbor { PayloadFormat::Cbor } else { PayloadFormat::Json };
            let header = DatagramHeader::new(encoding, sequence_number, segment_offset, last_segment, &payload).unwrap();
            let bytes = encode_datagram(&header, &payload);
            let (decoded, slice) = DatagramHeader::decode(&bytes).unwrap();
            prop_assert_eq!(decoded, header);
            prop_assert_eq!(slice, payload.as_slice());
        }

        #[test]
        fn any_single_bit_flip_is_rejected(
            payload in prop::collection::vec(any::<u8>(), 1..200),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut bytes = datagram(&payload, true);
            let index = position.index(bytes.len());
            bytes[index] ^= 1 << bit;
            prop_assert!(DatagramHeader::decode(&bytes).is_err());
        }
    }
}

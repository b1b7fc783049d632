//! Sender-side fragmentation of one serialized sample

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::header::{DatagramHeader, HEADER_LEN, encode_datagram};
use crate::Result;
use crate::types::PayloadFormat;

/// Default datagram budget: a 1500 byte MTU minus the header.
pub const DEFAULT_MAX_PAYLOAD: usize = 1500 - HEADER_LEN;

/// How a payload is divided into datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segmentation {
    /// Fill each datagram with up to this many payload bytes
    MaxPayload(usize),
    /// Split into slices of `ceil(len / count)` bytes. Yields fewer than
    /// `count` datagrams when the payload is shorter than `count` bytes or
    /// the division leaves the last slices empty, and more when a slice
    /// would not fit in one MTU.
    FixedCount(usize),
}

impl Default for Segmentation {
    fn default() -> Self {
        Segmentation::MaxPayload(DEFAULT_MAX_PAYLOAD)
    }
}

impl Segmentation {
    /// Slice size for a payload of `total` bytes. Never zero, and never
    /// more than a 1500-byte MTU can carry after the header.
    fn slice_len(self, total: usize) -> usize {
        let len = match self {
            Segmentation::MaxPayload(max) => max,
            Segmentation::FixedCount(count) => total.div_ceil(count.max(1)),
        };
        len.clamp(1, DEFAULT_MAX_PAYLOAD)
    }
}

/// Splits serialized samples into checksummed datagrams.
///
/// Each call to [`Segmenter::segment`] consumes one sequence number shared by
/// all fragments of that sample. Sequence numbers start at 1 and wrap from
/// 65535 back to 1; 0 is never used.
#[derive(Debug)]
pub struct Segmenter {
    format: PayloadFormat,
    segmentation: Segmentation,
    next_sequence: u16,
}

impl Segmenter {
    pub fn new(format: PayloadFormat, segmentation: Segmentation) -> Self {
        Self { format, segmentation, next_sequence: 1 }
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Sequence number the next sample will carry.
    pub fn next_sequence(&self) -> u16 {
        self.next_sequence
    }

    fn advance_sequence(&mut self) -> u16 {
        let current = self.next_sequence;
        self.next_sequence = if current == u16::MAX { 1 } else { current + 1 };
        current
    }

    /// Produce the ordered datagrams carrying `payload`.
    ///
    /// An empty payload yields a single empty datagram flagged as last.
    pub fn segment(&mut self, payload: &[u8]) -> Result<Vec<Vec<u8>>> {
        let sequence_number = self.advance_sequence();
        let slice_len = self.segmentation.slice_len(payload.len());

        if payload.is_empty() {
            let header = DatagramHeader::new(self.format, sequence_number, 0, true, payload)?;
            return Ok(vec![encode_datagram(&header, payload)]);
        }

        let mut datagrams = Vec::with_capacity(payload.len().div_ceil(slice_len));
        for (index, slice) in payload.chunks(slice_len).enumerate() {
            let offset = index * slice_len;
            let last_segment = offset + slice.len() == payload.len();
            let header = DatagramHeader::new(
                self.format,
                sequence_number,
                offset as u32,
                last_segment,
                slice,
            )?;
            datagrams.push(encode_datagram(&header, slice));
        }

        trace!(
            "Segmented {} bytes into {} datagrams (seq {})",
            payload.len(),
            datagrams.len(),
            sequence_number
        );
        Ok(datagrams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(datagrams: &[Vec<u8>]) -> Vec<(DatagramHeader, Vec<u8>)> {
        datagrams
            .iter()
            .map(|d| {
                let (header, payload) = DatagramHeader::decode(d).unwrap();
                (header, payload.to_vec())
            })
            .collect()
    }

    #[test]
    fn small_payload_is_one_datagram() {
        let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::default());
        let datagrams = segmenter.segment(b"{\"a\":1}").unwrap();
        assert_eq!(datagrams.len(), 1);

        let (header, payload) = &decode_all(&datagrams)[0];
        assert!(header.last_segment);
        assert_eq!(header.segment_offset, 0);
        assert_eq!(header.sequence_number, 1);
        assert_eq!(payload, b"{\"a\":1}");
    }

    #[test]
    fn exact_multiple_fills_every_datagram() {
        let mut segmenter = Segmenter::new(PayloadFormat::Cbor, Segmentation::MaxPayload(100));
        let payload = vec![0xAB; 300];
        let decoded = decode_all(&segmenter.segment(&payload).unwrap());

        assert_eq!(decoded.len(), 3);
        let offsets: Vec<u32> = decoded.iter().map(|(h, _)| h.segment_offset).collect();
        assert_eq!(offsets, vec![0, 100, 200]);
        assert!(decoded.iter().all(|(_, p)| p.len() == 100));
        assert_eq!(decoded.iter().filter(|(h, _)| h.last_segment).count(), 1);
        assert!(decoded[2].0.last_segment);
    }

    #[test]
    fn fixed_count_splits_evenly() {
        let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::FixedCount(3));
        let decoded = decode_all(&segmenter.segment(&[1u8; 100]).unwrap());
        let lengths: Vec<usize> = decoded.iter().map(|(_, p)| p.len()).collect();
        assert_eq!(lengths, vec![34, 34, 32]);
    }

    #[test]
    fn empty_payload_is_one_last_fragment() {
        let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::default());
        let decoded = decode_all(&segmenter.segment(&[]).unwrap());
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].0.last_segment);
        assert_eq!(decoded[0].0.payload_length, 0);
    }

    #[test]
    fn sequence_numbers_wrap_past_zero() {
        let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::default());
        segmenter.next_sequence = u16::MAX;

        let last = decode_all(&segmenter.segment(b"a").unwrap());
        let wrapped = decode_all(&segmenter.segment(b"b").unwrap());
        assert_eq!(last[0].0.sequence_number, u16::MAX);
        assert_eq!(wrapped[0].0.sequence_number, 1);
    }

    #[test]
    fn oversized_budget_is_capped_to_the_mtu() {
        let mut segmenter =
            Segmenter::new(PayloadFormat::Json, Segmentation::MaxPayload(usize::MAX));
        let datagrams = segmenter.segment(&vec![0u8; 3000]).unwrap();
        assert_eq!(datagrams.len(), 3);
        assert!(datagrams.iter().all(|d| d.len() <= 1500));
    }

    #[test]
    fn single_slice_large_payload_still_fits_the_mtu() {
        let mut segmenter = Segmenter::new(PayloadFormat::Cbor, Segmentation::FixedCount(1));
        let payload = vec![0x42u8; 4000];
        let datagrams = segmenter.segment(&payload).unwrap();

        assert_eq!(datagrams.len(), 3);
        assert!(datagrams.iter().all(|d| d.len() <= HEADER_LEN + DEFAULT_MAX_PAYLOAD));
        let decoded = decode_all(&datagrams);
        let joined: Vec<u8> = decoded.iter().flat_map(|(_, p)| p.clone()).collect();
        assert_eq!(joined, payload);
        assert!(decoded[2].0.last_segment);
    }

    #[test]
    fn fixed_count_yields_fewer_slices_for_tiny_payloads() {
        let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::FixedCount(8));
        assert_eq!(segmenter.segment(b"abc").unwrap().len(), 3);
    }

    proptest! {
        #[test]
        fn fragments_cover_the_payload(
            payload in prop::collection::vec(any::<u8>(), 1..5000),
            max in 1usize..=DEFAULT_MAX_PAYLOAD,
        ) {
            let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::MaxPayload(max));
            let decoded = decode_all(&segmenter.segment(&payload).unwrap());

            prop_assert_eq!(decoded.len(), payload.len().div_ceil(max));
            let mut joined = Vec::new();
            for (index, (header, slice)) in decoded.iter().enumerate() {
                prop_assert_eq!(header.segment_offset as usize, joined.len());
                prop_assert_eq!(header.last_segment, index == decoded.len() - 1);
                prop_assert_eq!(header.sequence_number, 1);
                joined.extend_from_slice(slice);
            }
            prop_assert_eq!(joined, payload);
        }
    }
}

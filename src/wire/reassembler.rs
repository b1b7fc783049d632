//! Receiver-side reassembly of fragmented samples
//!
//! Fragments are buffered per sequence number. A sample completes once its
//! last segment has arrived and the buffered offsets cover the payload from
//! byte 0 without gaps, so fragments may arrive in any order.
//!
//! The table is owned by the [`Reassembler`] instance and bounded two ways:
//! at most `max_pending` samples are in flight (the oldest is dropped to make
//! room) and [`Reassembler::evict_expired`] drops samples older than the TTL.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::header::DatagramHeader;
use crate::types::PayloadFormat;
use crate::{ProtocolError, Result};

/// Limits for the reassembly table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyLimits {
    /// Samples that may be collecting fragments at once
    pub max_pending: usize,
    /// Age after which an incomplete sample is discarded
    #[serde(with = "crate::config::duration_millis")]
    pub ttl: Duration,
}

impl Default for ReassemblyLimits {
    fn default() -> Self {
        Self { max_pending: 16, ttl: Duration::from_secs(1) }
    }
}

/// A completed sample payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPayload {
    pub sequence_number: u16,
    pub format: PayloadFormat,
    pub bytes: Vec<u8>,
    pub fragments: usize,
}

#[derive(Debug)]
struct PendingSample {
    format: PayloadFormat,
    created: Instant,
    segments: BTreeMap<u32, Vec<u8>>,
    total_len: Option<usize>,
}

impl PendingSample {
    fn new(format: PayloadFormat, created: Instant) -> Self {
        Self { format, created, segments: BTreeMap::new(), total_len: None }
    }

    fn is_complete(&self) -> bool {
        let Some(total) = self.total_len else {
            return false;
        };
        let mut covered = 0usize;
        for (&offset, bytes) in &self.segments {
            if offset as usize != covered {
                return false;
            }
            covered += bytes.len();
        }
        covered == total
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.total_len.unwrap_or(0));
        for (_, segment) in self.segments {
            bytes.extend_from_slice(&segment);
        }
        bytes
    }
}

/// Buffers fragments until each sample is complete.
#[derive(Debug)]
pub struct Reassembler {
    limits: ReassemblyLimits,
    pending: HashMap<u16, PendingSample>,
    last_completed: Option<u16>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(ReassemblyLimits::default())
    }
}

impl Reassembler {
    pub fn new(limits: ReassemblyLimits) -> Self {
        Self { limits, pending: HashMap::new(), last_completed: None }
    }

    pub fn limits(&self) -> ReassemblyLimits {
        self.limits
    }

    /// Validate one datagram and add it to its sample.
    ///
    /// Returns the assembled payload when this datagram completes a sample.
    /// Rejected datagrams leave the table untouched.
    pub fn accept(&mut self, datagram: &[u8], now: Instant) -> Result<Option<AssembledPayload>> {
        let (header, payload) = DatagramHeader::decode(datagram)?;
        let sequence_number = header.sequence_number;

        if self.last_completed == Some(sequence_number) {
            return Err(ProtocolError::DuplicateSequence { sequence_number });
        }

        if !self.pending.contains_key(&sequence_number) {
            self.make_room();
        }
        let entry = self
            .pending
            .entry(sequence_number)
            .or_insert_with(|| PendingSample::new(header.encoding, now));

        if entry.format != header.encoding {
            return Err(ProtocolError::malformed(format!(
                "sample {} switched encoding from {} to {}",
                sequence_number, entry.format, header.encoding
            )));
        }

        if header.last_segment {
            entry.total_len = Some(header.segment_offset as usize + payload.len());
        }
        entry.segments.insert(header.segment_offset, payload.to_vec());

        trace!(
            "Fragment seq={} offset={} len={} last={}",
            sequence_number, header.segment_offset, header.payload_length, header.last_segment
        );

        if !entry.is_complete() {
            return Ok(None);
        }

        let Some(sample) = self.pending.remove(&sequence_number) else {
            return Ok(None);
        };
        self.last_completed = Some(sequence_number);
        let fragments = sample.segments.len();
        let format = sample.format;
        let bytes = sample.into_bytes();
        trace!("Sample {} complete: {} bytes in {} fragments", sequence_number, bytes.len(), fragments);

        Ok(Some(AssembledPayload { sequence_number, format, bytes, fragments }))
    }

    fn make_room(&mut self) {
        while self.pending.len() >= self.limits.max_pending.max(1) {
            let oldest = self.pending.iter().min_by_key(|(_, s)| s.created).map(|(seq, _)| *seq);
            match oldest {
                Some(seq) => {
                    debug!("Reassembly table full, dropping incomplete sample {}", seq);
                    self.pending.remove(&seq);
                }
                None => break,
            }
        }
    }

    /// Drop incomplete samples older than the TTL. Returns how many were dropped.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let ttl = self.limits.ttl;
        let before = self.pending.len();
        self.pending.retain(|seq, sample| {
            let keep = now.saturating_duration_since(sample.created) < ttl;
            if !keep {
                debug!("Evicting stale sample {} ({} fragments)", seq, sample.segments.len());
            }
            keep
        });
        before - self.pending.len()
    }

    /// Drop the buffer for one sequence number. Returns whether it existed.
    pub fn clear(&mut self, sequence_number: u16) -> bool {
        self.pending.remove(&sequence_number).is_some()
    }

    /// Samples currently collecting fragments.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sequence number of the most recently completed sample.
    pub fn last_completed(&self) -> Option<u16> {
        self.last_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{Segmentation, Segmenter};
    use proptest::prelude::*;

    fn fragments(payload: &[u8], max: usize) -> Vec<Vec<u8>> {
        Segmenter::new(PayloadFormat::Json, Segmentation::MaxPayload(max)).segment(payload).unwrap()
    }

    fn feed(
        reassembler: &mut Reassembler,
        datagrams: &[Vec<u8>],
        now: Instant,
    ) -> Option<AssembledPayload> {
        let mut completed = None;
        for datagram in datagrams {
            if let Some(done) = reassembler.accept(datagram, now).unwrap() {
                assert!(completed.is_none(), "sample completed twice");
                completed = Some(done);
            }
        }
        completed
    }

    #[test]
    fn in_order_fragments_complete() {
        let payload: Vec<u8> = (0..250u8).collect();
        let mut reassembler = Reassembler::default();
        let done = feed(&mut reassembler, &fragments(&payload, 100), Instant::now()).unwrap();
        assert_eq!(done.bytes, payload);
        assert_eq!(done.fragments, 3);
        assert_eq!(done.sequence_number, 1);
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn reverse_order_fragments_complete() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut datagrams = fragments(&payload, 128);
        datagrams.reverse();

        let mut reassembler = Reassembler::default();
        let done = feed(&mut reassembler, &datagrams, Instant::now()).unwrap();
        assert_eq!(done.bytes, payload);
    }

    #[test]
    fn completed_sequence_is_rejected_as_duplicate() {
        let datagrams = fragments(b"hello", 100);
        let mut reassembler = Reassembler::default();
        let now = Instant::now();
        assert!(feed(&mut reassembler, &datagrams, now).is_some());

        let err = reassembler.accept(&datagrams[0], now).unwrap_err();
        assert!(matches!(err, ProtocolError::DuplicateSequence { sequence_number: 1 }));
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn consecutive_replayed_fragments_are_both_duplicates() {
        let datagrams = fragments(&[7u8; 90], 30);
        let mut reassembler = Reassembler::default();
        let now = Instant::now();
        assert!(feed(&mut reassembler, &datagrams, now).is_some());

        for datagram in &datagrams[..2] {
            let err = reassembler.accept(datagram, now).unwrap_err();
            assert!(matches!(err, ProtocolError::DuplicateSequence { sequence_number: 1 }));
            assert_eq!(reassembler.pending_count(), 0);
        }
        assert_eq!(reassembler.last_completed(), Some(1));
    }

    #[test]
    fn corrupted_fragment_blocks_completion_until_evicted() {
        let payload = vec![7u8; 100];
        let mut datagrams = fragments(&payload, 40);
        assert_eq!(datagrams.len(), 3);
        let last = datagrams[1].len() - 1;
        datagrams[1][last] ^= 0x01;

        let mut reassembler = Reassembler::default();
        let start = Instant::now();
        assert!(reassembler.accept(&datagrams[0], start).unwrap().is_none());
        assert!(matches!(
            reassembler.accept(&datagrams[1], start),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
        assert!(reassembler.accept(&datagrams[2], start).unwrap().is_none());
        assert_eq!(reassembler.pending_count(), 1);

        assert_eq!(reassembler.evict_expired(start + Duration::from_millis(500)), 0);
        assert_eq!(reassembler.evict_expired(start + Duration::from_secs(2)), 1);
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn table_is_bounded() {
        let limits = ReassemblyLimits { max_pending: 4, ttl: Duration::from_secs(60) };
        let mut reassembler = Reassembler::new(limits);
        let mut segmenter = Segmenter::new(PayloadFormat::Cbor, Segmentation::MaxPayload(10));
        let start = Instant::now();

        for i in 0..10u64 {
            let datagrams = segmenter.segment(&[0u8; 30]).unwrap();
            // First fragment only, so nothing completes
            let at = start + Duration::from_millis(i);
            assert!(reassembler.accept(&datagrams[0], at).unwrap().is_none());
            assert!(reassembler.pending_count() <= 4);
        }
        assert_eq!(reassembler.pending_count(), 4);
    }

    #[test]
    fn clear_discards_one_sample() {
        let datagrams = fragments(&[1u8; 50], 20);
        let mut reassembler = Reassembler::default();
        reassembler.accept(&datagrams[0], Instant::now()).unwrap();
        assert!(reassembler.clear(1));
        assert!(!reassembler.clear(1));
        assert_eq!(reassembler.pending_count(), 0);
    }

    #[test]
    fn interleaved_samples_complete_independently() {
        let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::MaxPayload(8));
        let first = segmenter.segment(b"first sample bytes").unwrap();
        let second = segmenter.segment(b"second sample bytes").unwrap();

        let mut reassembler = Reassembler::default();
        let now = Instant::now();
        let mut done = Vec::new();
        for pair in first.iter().zip(second.iter()) {
            for datagram in [pair.0, pair.1] {
                if let Some(sample) = reassembler.accept(datagram, now).unwrap() {
                    done.push(sample);
                }
            }
        }
        for datagram in first.iter().skip(second.len()).chain(second.iter().skip(first.len())) {
            if let Some(sample) = reassembler.accept(datagram, now).unwrap() {
                done.push(sample);
            }
        }

        let mut bodies: Vec<Vec<u8>> = done.into_iter().map(|s| s.bytes).collect();
        bodies.sort();
        assert_eq!(bodies, vec![b"first sample bytes".to_vec(), b"second sample bytes".to_vec()]);
    }

    proptest! {
        #[test]
        fn any_arrival_order_reassembles(
            payload in prop::collection::vec(any::<u8>(), 1..3000),
            max in 16usize..600,
            seed in any::<u64>(),
        ) {
            let mut datagrams = fragments(&payload, max);
            // Deterministic shuffle
            let mut state = seed | 1;
            for i in (1..datagrams.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                datagrams.swap(i, (state % (i as u64 + 1)) as usize);
            }

            let mut reassembler = Reassembler::default();
            let done = feed(&mut reassembler, &datagrams, Instant::now());
            prop_assert_eq!(done.map(|d| d.bytes), Some(payload));
        }
    }
}

//! Datagram framing: header codec, checksum, fragmentation and reassembly.
//!
//! A serialized sample is split by the [`Segmenter`] into datagrams of at most
//! one MTU. Each datagram carries a [`DatagramHeader`] naming the sample's
//! sequence number, the slice offset and whether it is the last slice. The
//! [`Reassembler`] validates each datagram and rebuilds the payload.
//!
//! ```rust
//! use opentrackio::types::PayloadFormat;
//! use opentrackio::wire::{Reassembler, Segmentation, Segmenter};
//! use std::time::Instant;
//!
//! let mut segmenter = Segmenter::new(PayloadFormat::Json, Segmentation::MaxPayload(4));
//! let mut reassembler = Reassembler::default();
//!
//! let mut done = None;
//! for datagram in segmenter.segment(b"{\"a\":[1,2,3]}")?.iter().rev() {
//!     done = reassembler.accept(datagram, Instant::now())?.or(done);
//! }
//! assert_eq!(done.unwrap().bytes, b"{\"a\":[1,2,3]}");
//! # Ok::<(), opentrackio::ProtocolError>(())
//! ```

mod checksum;
mod header;
mod reassembler;
mod segmenter;

pub use checksum::fletcher16;
pub use header::{DatagramHeader, HEADER_LEN, MAGIC, MAX_SEGMENT_PAYLOAD, encode_datagram};
pub use reassembler::{AssembledPayload, Reassembler, ReassemblyLimits};
pub use segmenter::{DEFAULT_MAX_PAYLOAD, Segmentation, Segmenter};

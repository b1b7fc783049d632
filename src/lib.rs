//! Sender and receiver for the OpenTrackIO camera-tracking sample protocol.
//!
//! A sender serializes one tracking sample as JSON or CBOR, fragments it into
//! checksummed UDP datagrams and multicasts them to `235.135.1.<source>`. A
//! receiver validates and reassembles the fragments, decodes the sample, and
//! converts its measurements into the units the caller asks for.
//!
//! # Features
//!
//! - **Wire codec**: 16-byte header with Fletcher-16 checksum, per-sample
//!   sequence numbers, out-of-order reassembly with bounded, expiring buffers
//! - **Two payload formats**: JSON and CBOR, chosen per datagram
//! - **Schema-driven units**: measurement units read from the protocol's
//!   JSON schema, converted on access
//! - **Time sources**: PTP, NTP, genlock and video-in, with a one-shot SNTP
//!   offset for NTP streams
//! - **Paced sending**: samples sent at the stream rate and stamped with the
//!   sender's reference time
//!
//! ## Example (receive)
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use opentrackio::{LengthUnit, OpenTrackIO, ReceiverConfig, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> opentrackio::Result<()> {
//!     let mut connection = OpenTrackIO::receive(ReceiverConfig::for_source(1)).await?;
//!     connection.decoder_mut().set_translation_units(LengthUnit::Centimeter);
//!
//!     let mut samples = connection.subscribe(UpdateRate::Max(10));
//!     while let Some(sample) = samples.next().await {
//!         if let Some(t) = connection.decoder().camera_translations(&sample) {
//!             println!("camera at {:.1} {:.1} {:.1} cm", t.value.x, t.value.y, t.value.z);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Protocol layers
pub mod payload;
pub mod sample;
pub mod schema;
pub mod wire;

// Stream-based receive architecture
pub mod clock;
pub mod config;
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod sender;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use clock::{
    Clock, NtpClient, SampleStamper, SystemClock, TimeSourceReconciler, TimeSourceState,
};
pub use config::{ReceiverConfig, SenderConfig};
pub use connection::ReceiverConnection;
pub use driver::ReceiveStats;
pub use provider::DatagramProvider;
pub use sample::{Sample, SampleDecoder, UnitPreferences};
pub use schema::SchemaUnits;
pub use sender::{SendReport, Sender, Transmission};
pub use wire::{Reassembler, Segmentation, Segmenter};

/// Unified entry point for OpenTrackIO streams.
///
/// # Examples
///
/// ## Sending
/// ```rust,no_run
/// use opentrackio::{OpenTrackIO, SenderConfig};
///
/// #[tokio::main]
/// async fn main() -> opentrackio::Result<()> {
///     let mut sender = OpenTrackIO::send(SenderConfig::for_source(1))?;
///     let sample = serde_json::json!({"protocol": {"name": "OpenTrackIO", "version": [1, 0, 0]}});
///     sender.send(&sample).await?;
///     Ok(())
/// }
/// ```
pub struct OpenTrackIO;

impl OpenTrackIO {
    /// Join a source's multicast group and start receiving samples.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The schema file cannot be read or parsed
    /// - The socket cannot be bound or cannot join the group
    pub async fn receive(config: ReceiverConfig) -> Result<ReceiverConnection> {
        ReceiverConnection::open(config).await
    }

    /// Load a receiver configuration from YAML and start receiving.
    pub async fn receive_from_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<ReceiverConnection> {
        ReceiverConnection::open(ReceiverConfig::from_file(path)?).await
    }

    /// Open a sender for a source's multicast group.
    ///
    /// Must be called within a tokio runtime.
    pub fn send(config: SenderConfig) -> Result<Sender> {
        Sender::bind(&config)
    }

    /// Open a sender and transmit `next_sample`'s values at the configured
    /// rate, stamped from the configured time source.
    ///
    /// An NTP source is queried once before the first sample is sent.
    pub async fn transmit<F>(config: SenderConfig, next_sample: F) -> Result<Transmission>
    where
        F: FnMut(u64) -> Option<serde_json::Value> + Send + 'static,
    {
        let sender = Sender::bind(&config)?;
        let stamper = Sender::stamper(&config).await;
        Ok(sender.spawn(config.sample_rate_hz, stamper, next_sample))
    }
}

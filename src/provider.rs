//! Provider trait for datagram sources

use crate::Result;

/// Trait for sources of raw protocol datagrams
///
/// Providers abstract over where datagrams come from (a multicast socket, an
/// in-memory capture) and handle their own waiting. The driver owns one
/// provider and pulls from it until it ends or the connection is dropped.
#[async_trait::async_trait]
pub trait DatagramProvider: Send + 'static {
    /// Get the next datagram
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - One datagram, header included
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - I/O error; the driver backs off and retries
    async fn next_datagram(&mut self) -> Result<Option<Vec<u8>>>;

    /// Nominal sample rate of the stream in Hz
    ///
    /// Used to decide whether a subscription's rate cap requires throttling.
    fn sample_rate(&self) -> f64;
}

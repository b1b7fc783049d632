//! Sample sender
//!
//! Serializes a payload value, fragments it and transmits every datagram to
//! the stream's multicast group. [`Sender::run`] repeats this at the stream
//! rate, stamping each sample with the sender's reference time.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::clock::{NtpClient, SampleStamper, SystemClock};
use crate::config::SenderConfig;
use crate::payload;
use crate::types::PayloadFormat;
use crate::wire::Segmenter;
use crate::{ProtocolError, Result};

fn multicast_send_socket(interface: Ipv4Addr, ttl: u32) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| ProtocolError::io("creating sender socket", e))?;
    socket
        .set_multicast_ttl_v4(ttl)
        .map_err(|e| ProtocolError::io("setting IP_MULTICAST_TTL", e))?;
    if !interface.is_unspecified() {
        socket
            .set_multicast_if_v4(&interface)
            .map_err(|e| ProtocolError::io(format!("selecting interface {}", interface), e))?;
    }

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&addr.into()).map_err(|e| ProtocolError::io("binding sender socket", e))?;
    socket.set_nonblocking(true).map_err(|e| ProtocolError::io("setting non-blocking", e))?;

    UdpSocket::from_std(socket.into())
        .map_err(|e| ProtocolError::io("registering socket with the runtime", e))
}

/// What one [`Sender::send`] put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub sequence_number: u16,
    pub datagrams: usize,
    /// Serialized payload size, headers excluded
    pub payload_bytes: usize,
}

fn tick_period(rate_hz: f64) -> Result<Duration> {
    if !(rate_hz.is_finite() && rate_hz > 0.0) {
        return Err(ProtocolError::config(format!("send rate {} Hz must be positive", rate_hz)));
    }
    Ok(Duration::from_secs_f64(1.0 / rate_hz))
}

/// A paced transmission running on its own task.
#[derive(Debug)]
pub struct Transmission {
    cancel: CancellationToken,
    handle: JoinHandle<Result<u64>>,
}

impl Transmission {
    /// Token that stops the transmission when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop sending and return how many samples were sent.
    pub async fn stop(self) -> Result<u64> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the sample source to run dry or the token to be cancelled.
    pub async fn join(self) -> Result<u64> {
        self.handle
            .await
            .map_err(|e| ProtocolError::io("joining transmit task", std::io::Error::other(e)))?
    }
}

/// Transmits samples to one destination
#[derive(Debug)]
pub struct Sender {
    socket: UdpSocket,
    destination: SocketAddr,
    segmenter: Segmenter,
    sent: u64,
}

impl Sender {
    /// Send to the configured multicast group.
    pub fn bind(config: &SenderConfig) -> Result<Self> {
        config.validate()?;
        let destination = SocketAddr::V4(SocketAddrV4::new(config.destination_group(), config.port));
        Self::bind_to(config, destination)
    }

    /// Send to an explicit address instead of the configured group.
    pub fn bind_to(config: &SenderConfig, destination: SocketAddr) -> Result<Self> {
        let socket = multicast_send_socket(config.interface, config.multicast_ttl)?;
        info!(
            "Sending {} samples to {} (ttl {})",
            config.format, destination, config.multicast_ttl
        );
        Ok(Self {
            socket,
            destination,
            segmenter: Segmenter::new(config.format, config.segmentation),
            sent: 0,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn format(&self) -> PayloadFormat {
        self.segmenter.format()
    }

    /// Samples sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Serialize `value` in the configured format and send it.
    pub async fn send(&mut self, value: &Value) -> Result<SendReport> {
        let bytes = payload::encode(value, self.segmenter.format())?;
        self.send_serialized(&bytes).await
    }

    /// Send an already serialized payload.
    ///
    /// The bytes must be in the configured format; they are not inspected.
    pub async fn send_serialized(&mut self, bytes: &[u8]) -> Result<SendReport> {
        let sequence_number = self.segmenter.next_sequence();
        let datagrams = self.segmenter.segment(bytes)?;

        for datagram in &datagrams {
            self.socket
                .send_to(datagram, self.destination)
                .await
                .map_err(|e| ProtocolError::io(format!("sending to {}", self.destination), e))?;
            trace!("Sent {} bytes (seq {})", datagram.len(), sequence_number);
        }

        self.sent += 1;
        debug!(
            "Sample {} sent: {} bytes in {} datagrams",
            sequence_number,
            bytes.len(),
            datagrams.len()
        );
        Ok(SendReport { sequence_number, datagrams: datagrams.len(), payload_bytes: bytes.len() })
    }

    /// Stamper for the configured time source, querying the configured NTP
    /// server once when the source is NTP.
    pub async fn stamper(config: &SenderConfig) -> SampleStamper {
        let ntp = NtpClient::new(config.ntp_server.clone(), config.ntp_timeout);
        SampleStamper::resolve(Arc::new(SystemClock), config.time_source, &ntp).await
    }

    /// Send one sample per tick at `rate_hz` until `cancel` fires or
    /// `next_sample` returns `None`.
    ///
    /// `next_sample` receives the number of samples this call has sent so
    /// far. Each sample is stamped before it is serialized. Returns the number
    /// of samples sent.
    pub async fn run<F>(
        &mut self,
        rate_hz: f64,
        stamper: &SampleStamper,
        mut next_sample: F,
        cancel: &CancellationToken,
    ) -> Result<u64>
    where
        F: FnMut(u64) -> Option<Value>,
    {
        let mut ticks = interval(tick_period(rate_hz)?);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Transmitting to {} at {:.3} Hz", self.destination, rate_hz);

        let mut sent = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Transmission cancelled after {} samples", sent);
                    break;
                }
                _ = ticks.tick() => {}
            }

            let Some(mut value) = next_sample(sent) else {
                info!("Sample source ended after {} samples", sent);
                break;
            };
            stamper.stamp(&mut value);
            self.send(&value).await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Move the sender onto its own task running [`Sender::run`].
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn<F>(mut self, rate_hz: f64, stamper: SampleStamper, next_sample: F) -> Transmission
    where
        F: FnMut(u64) -> Option<Value> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle =
            tokio::spawn(async move { self.run(rate_hz, &stamper, next_sample, &token).await });
        Transmission { cancel, handle }
    }
}

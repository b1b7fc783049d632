//! SNTP offset queries
//!
//! One client-mode exchange through `sntpc`, which validates the reply
//! (mode, stratum, originate timestamp, peer address) and computes
//!
//! ```text
//! offset = ((t1 - t0) + (t2 - t3)) / 2
//! ```
//!
//! from the local send/receive times `t0`/`t3` and the server's
//! receive/transmit times `t1`/`t2`. Local times come from a [`Clock`] so
//! tests can pin them.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use sntpc::{NtpContext, NtpTimestampGenerator};
use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, info};

use super::reconciler::OffsetSource;
use super::{Clock, SystemClock};
use crate::{ProtocolError, Result};

/// Server queried when none is configured.
pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org:123";

/// Upper bound on one query, including name resolution.
pub const DEFAULT_NTP_TIMEOUT: Duration = Duration::from_secs(2);

/// Seconds from 1900-01-01 (NTP era 0) to 1970-01-01.
pub const NTP_UNIX_EPOCH_DELTA: f64 = 2_208_988_800.0;

/// Feeds [`Clock`] readings to `sntpc` as its local timestamps.
#[derive(Clone, Copy)]
struct ClockTimestamps<'a> {
    clock: &'a dyn Clock,
    now: f64,
}

impl<'a> ClockTimestamps<'a> {
    fn new(clock: &'a dyn Clock) -> Self {
        Self { clock, now: clock.now() }
    }
}

impl NtpTimestampGenerator for ClockTimestamps<'_> {
    fn init(&mut self) {
        self.now = self.clock.now().max(0.0);
    }

    fn timestamp_sec(&self) -> u64 {
        self.now.trunc() as u64
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        (self.now.fract() * 1e6) as u32
    }
}

/// Queries one NTP server for the local clock's offset.
#[derive(Debug, Clone)]
pub struct NtpClient {
    server: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for NtpClient {
    fn default() -> Self {
        Self::new(DEFAULT_NTP_SERVER, DEFAULT_NTP_TIMEOUT)
    }
}

impl NtpClient {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self { server: server.into(), timeout, clock: Arc::new(SystemClock) }
    }

    /// Use `clock` for the local send and receive timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        lookup_host(self.server.as_str())
            .await
            .map_err(|e| ProtocolError::ntp(&self.server, format!("cannot resolve: {}", e)))?
            .next()
            .ok_or_else(|| ProtocolError::ntp(&self.server, "no addresses"))
    }

    async fn exchange(&self) -> Result<f64> {
        let server = self.resolve().await?;
        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| ProtocolError::io("binding NTP client socket", e))?;

        let context = NtpContext::new(ClockTimestamps::new(self.clock.as_ref()));
        let result = sntpc::get_time(server, &socket, context)
            .await
            .map_err(|e| ProtocolError::ntp(&self.server, format!("{:?}", e)))?;

        debug!(
            "NTP exchange with {}: stratum {} roundtrip {}us",
            server,
            result.stratum(),
            result.roundtrip()
        );
        Ok(result.offset() as f64 * 1e-6)
    }

    /// One bounded query. Fails with [`ProtocolError::Timeout`] when the
    /// server does not answer within the timeout.
    pub async fn query(&self) -> Result<f64> {
        let offset = tokio::time::timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| ProtocolError::Timeout { duration: self.timeout })??;
        info!("NTP offset from {}: {:+.6}s", self.server, offset);
        Ok(offset)
    }
}

/// Query `server` once for the local clock's offset in seconds.
pub async fn query_offset(server: &str, timeout: Duration) -> Result<f64> {
    NtpClient::new(server, timeout).query().await
}

#[async_trait::async_trait]
impl OffsetSource for NtpClient {
    async fn query_offset(&self) -> Result<f64> {
        self.query().await
    }
}

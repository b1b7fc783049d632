//! In-memory datagram provider
//!
//! Replays a captured datagram list, or relays datagrams pushed through a
//! [`MemoryFeed`]. Useful for tests and for replaying captures offline.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::config::DEFAULT_SAMPLE_RATE_HZ;
use crate::provider::DatagramProvider;
use crate::Result;

#[derive(Debug)]
enum Source {
    Capture(VecDeque<Vec<u8>>),
    Channel(mpsc::Receiver<Vec<u8>>),
}

/// Provider backed by memory instead of a socket
#[derive(Debug)]
pub struct MemoryProvider {
    source: Source,
    pacing: Option<Interval>,
    sample_rate: f64,
    delivered: u64,
}

/// Sending half of a channel-backed [`MemoryProvider`].
///
/// Dropping every feed ends the provider.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    tx: mpsc::Sender<Vec<u8>>,
}

impl MemoryFeed {
    /// Queue one datagram. Returns `false` once the provider is gone.
    pub async fn push(&self, datagram: Vec<u8>) -> bool {
        self.tx.send(datagram).await.is_ok()
    }

    /// Queue every datagram in order.
    pub async fn push_all(&self, datagrams: impl IntoIterator<Item = Vec<u8>>) -> bool {
        for datagram in datagrams {
            if !self.push(datagram).await {
                return false;
            }
        }
        true
    }
}

impl MemoryProvider {
    /// Replay `datagrams` in order, then end.
    pub fn new(datagrams: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self::from_source(Source::Capture(datagrams.into_iter().collect()))
    }

    /// A provider fed at runtime; it ends when every feed is dropped.
    pub fn channel(capacity: usize) -> (MemoryFeed, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (MemoryFeed { tx }, Self::from_source(Source::Channel(rx)))
    }

    fn from_source(source: Source) -> Self {
        Self { source, pacing: None, sample_rate: DEFAULT_SAMPLE_RATE_HZ, delivered: 0 }
    }

    /// Nominal rate reported to subscriptions.
    pub fn with_sample_rate(mut self, hz: f64) -> Self {
        self.sample_rate = hz;
        self
    }

    /// Deliver at most one datagram per `period`.
    pub fn with_pacing(mut self, period: Duration) -> Self {
        let mut pacing = interval(period);
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.pacing = Some(pacing);
        self
    }

    /// Datagrams handed out so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

#[async_trait::async_trait]
impl DatagramProvider for MemoryProvider {
    async fn next_datagram(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(pacing) = self.pacing.as_mut() {
            pacing.tick().await;
        }

        let next = match &mut self.source {
            Source::Capture(queue) => queue.pop_front(),
            Source::Channel(rx) => rx.recv().await,
        };

        match next {
            Some(datagram) => {
                self.delivered += 1;
                trace!("Memory datagram {}: {} bytes", self.delivered, datagram.len());
                Ok(Some(datagram))
            }
            None => {
                debug!("Memory provider drained after {} datagrams", self.delivered);
                Ok(None)
            }
        }
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

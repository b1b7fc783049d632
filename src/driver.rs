//! Driver spawns and manages the receive task

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::clock::{TimeSourceReconciler, TimeSourceState};
use crate::provider::DatagramProvider;
use crate::sample::Sample;
use crate::wire::Reassembler;

/// Consecutive provider errors tolerated before the receive task gives up.
const MAX_ERRORS: u32 = 10;

/// Counters kept by the receive task
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReceiveStats {
    /// Datagrams read from the provider
    pub datagrams: u64,
    /// Samples reassembled, decoded and published
    pub samples: u64,
    /// Datagrams dropped by header validation or duplicate detection
    pub rejected: u64,
    /// Reassembled payloads that failed to deserialize
    pub decode_failures: u64,
    /// Incomplete samples discarded by the TTL sweep
    pub evicted: u64,
    /// Local reference time minus the latest sample's timestamp, in seconds
    pub reference_delta: Option<f64>,
    /// Set once the provider has ended or failed for good
    pub ended: bool,
}

/// Result of spawning the receive task
pub struct DriverChannels {
    /// Latest decoded sample
    pub samples: watch::Receiver<Option<Arc<Sample>>>,
    /// Pinned time source, once the first sample has arrived
    pub time_source: watch::Receiver<Option<TimeSourceState>>,
    /// Running counters
    pub stats: watch::Receiver<ReceiveStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the receive task
///
/// One task owns the provider, the reassembler and the reconciler. Each
/// datagram is processed completely before the next is read, so none of them
/// needs locking.
pub struct Driver;

struct ReceiveTask<P> {
    provider: P,
    reassembler: Reassembler,
    reconciler: TimeSourceReconciler,
    sample_tx: watch::Sender<Option<Arc<Sample>>>,
    time_source_tx: watch::Sender<Option<TimeSourceState>>,
    stats_tx: watch::Sender<ReceiveStats>,
}

impl Driver {
    /// Spawn the receive task for `provider`
    ///
    /// Returns watch receivers for samples, time source and statistics, plus
    /// a cancellation token for shutdown.
    pub fn spawn<P>(
        provider: P,
        reassembler: Reassembler,
        reconciler: TimeSourceReconciler,
    ) -> DriverChannels
    where
        P: DatagramProvider,
    {
        let (sample_tx, sample_rx) = watch::channel(None);
        let (time_source_tx, time_source_rx) = watch::channel(None);
        let (stats_tx, stats_rx) = watch::channel(ReceiveStats::default());
        let cancel = CancellationToken::new();

        let task = ReceiveTask {
            provider,
            reassembler,
            reconciler,
            sample_tx,
            time_source_tx,
            stats_tx,
        };
        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            task.run(cancel_task).await;
        });

        DriverChannels {
            samples: sample_rx,
            time_source: time_source_rx,
            stats: stats_rx,
            cancel,
        }
    }
}

impl<P: DatagramProvider> ReceiveTask<P> {
    async fn run(mut self, cancel: CancellationToken) {
        info!("Receive task started");
        let mut error_count = 0u32;

        let ttl = self.reassembler.limits().ttl;
        let mut eviction = interval(ttl);
        eviction.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receive task cancelled");
                    break;
                }
                _ = eviction.tick() => {
                    self.sweep();
                    continue;
                }
                result = self.provider.next_datagram() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    error_count = 0;
                    if !self.handle_datagram(&datagram, &cancel).await {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Provider ended after {} datagrams", self.stats_tx.borrow().datagrams);
                    break;
                }
                Err(e) => {
                    // Provider error - don't crash on transient failures
                    error_count += 1;
                    error!("Provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many provider errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, ... capped at 1.6s
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        self.stats_tx.send_modify(|stats| stats.ended = true);
        let stats = *self.stats_tx.borrow();
        info!(
            datagrams = stats.datagrams,
            samples = stats.samples,
            rejected = stats.rejected,
            evicted = stats.evicted,
            "Receive task ended"
        );
    }

    fn sweep(&mut self) {
        let evicted = self.reassembler.evict_expired(Instant::now().into_std());
        if evicted > 0 {
            debug!("Evicted {} stale partial samples", evicted);
            self.stats_tx.send_modify(|stats| stats.evicted += evicted as u64);
        }
    }

    /// Returns `false` once nobody is listening for samples or the task was
    /// cancelled while pinning the time source.
    async fn handle_datagram(&mut self, datagram: &[u8], cancel: &CancellationToken) -> bool {
        self.stats_tx.send_modify(|stats| stats.datagrams += 1);

        let assembled = match self.reassembler.accept(datagram, Instant::now().into_std()) {
            Ok(Some(assembled)) => assembled,
            Ok(None) => return true,
            Err(e) => {
                if e.is_fragment_rejection() {
                    debug!("Dropped datagram ({} bytes): {}", datagram.len(), e);
                } else {
                    warn!("Dropped datagram ({} bytes): {}", datagram.len(), e);
                }
                self.stats_tx.send_modify(|stats| stats.rejected += 1);
                return true;
            }
        };

        let sample = match Sample::decode(&assembled) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Discarding sample {}: {}", assembled.sequence_number, e);
                self.stats_tx.send_modify(|stats| stats.decode_failures += 1);
                return true;
            }
        };

        if self.reconciler.state().is_none() {
            // The NTP query is bounded by its own timeout but must not delay shutdown
            let state = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receive task cancelled while pinning the time source");
                    return false;
                }
                state = self.reconciler.observe(&sample) => state,
            };
            let _ = self.time_source_tx.send(Some(state));
        }
        let delta = self.reconciler.reference_delta(&sample);

        trace!(
            "Sample {}: {} bytes {} in {} fragments",
            assembled.sequence_number,
            assembled.bytes.len(),
            assembled.format,
            assembled.fragments
        );

        self.stats_tx.send_modify(|stats| {
            stats.samples += 1;
            stats.reference_delta = delta;
        });
        if self.sample_tx.send(Some(Arc::new(sample))).is_err() {
            debug!("Sample receivers dropped, shutting down");
            return false;
        }
        true
    }
}

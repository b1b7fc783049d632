//! Receiver connection for a sample stream

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::{NtpClient, SystemClock, TimeSourceReconciler, TimeSourceState};
use crate::config::ReceiverConfig;
use crate::driver::{Driver, ReceiveStats};
use crate::provider::DatagramProvider;
use crate::providers::MulticastProvider;
use crate::sample::{Sample, SampleDecoder};
use crate::schema::SchemaUnits;
use crate::stream::ThrottleExt;
use crate::types::UpdateRate;
use crate::wire::Reassembler;
use crate::{ProtocolError, Result};

/// Handle to a running receive task
///
/// Samples are published as they complete; subscribers see the latest one.
/// Dropping the connection stops the task.
pub struct ReceiverConnection {
    samples: watch::Receiver<Option<Arc<Sample>>>,
    time_source: watch::Receiver<Option<TimeSourceState>>,
    stats: watch::Receiver<ReceiveStats>,
    decoder: SampleDecoder,
    source_hz: f64,
    cancel: CancellationToken,
}

impl ReceiverConnection {
    /// Join the configured multicast group and start receiving.
    ///
    /// Loads the schema named by `config.schema_path`, if any. Returns as
    /// soon as the socket is bound; use [`Self::wait_for_sample`] to block
    /// until data flows.
    pub async fn open(config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        let units = match &config.schema_path {
            Some(path) => SchemaUnits::from_file(path)?,
            None => SchemaUnits::default(),
        };
        let decoder = SampleDecoder::with_preferences(units, config.preferences);

        let provider = MulticastProvider::bind(&config)?;
        let ntp = NtpClient::new(config.ntp_server.clone(), config.ntp_timeout);
        let reconciler = TimeSourceReconciler::new(Arc::new(SystemClock), ntp);

        Ok(Self::spawn(provider, Reassembler::new(config.reassembly), reconciler, decoder))
    }

    /// Start receiving from any provider.
    pub fn spawn<P>(
        provider: P,
        reassembler: Reassembler,
        reconciler: TimeSourceReconciler,
        decoder: SampleDecoder,
    ) -> Self
    where
        P: DatagramProvider,
    {
        let source_hz = provider.sample_rate();
        let channels = Driver::spawn(provider, reassembler, reconciler);

        info!("Receiver connection opened ({:.3}Hz nominal)", source_hz);

        Self {
            samples: channels.samples,
            time_source: channels.time_source,
            stats: channels.stats,
            decoder,
            source_hz,
            cancel: channels.cancel,
        }
    }

    /// Subscribe to decoded samples
    ///
    /// The stream yields the current sample first, if there is one, and ends
    /// when the receive task stops.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<Sample>> + 'static {
        let samples = WatchStream::new(self.samples.clone()).filter_map(|opt| async move { opt });

        match rate.normalize(self.source_hz) {
            UpdateRate::Native => samples.boxed(),
            UpdateRate::Max(hz) => {
                let interval = Duration::from_secs_f64(1.0 / hz as f64);
                samples.throttle(interval).boxed()
            }
        }
    }

    /// Most recently decoded sample
    pub fn current_sample(&self) -> Option<Arc<Sample>> {
        self.samples.borrow().clone()
    }

    /// Wait until a sample is available.
    pub async fn wait_for_sample(&self, timeout: Duration) -> Result<Arc<Sample>> {
        let mut samples = self.samples.clone();
        let waited = tokio::time::timeout(timeout, async move {
            samples.wait_for(|s| s.is_some()).await.map(|s| s.clone())
        })
        .await
        .map_err(|_| ProtocolError::Timeout { duration: timeout })?;

        match waited {
            Ok(Some(sample)) => Ok(sample),
            _ => Err(ProtocolError::io(
                "waiting for first sample",
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "receive task ended"),
            )),
        }
    }

    /// Pinned time source, once the first sample has been decoded
    pub fn time_source(&self) -> Option<TimeSourceState> {
        *self.time_source.borrow()
    }

    pub fn stats(&self) -> ReceiveStats {
        *self.stats.borrow()
    }

    /// Statistics as a stream of updates
    pub fn stats_updates(&self) -> impl Stream<Item = ReceiveStats> + 'static {
        WatchStream::new(self.stats.clone())
    }

    /// Decoder applying the schema units and the caller's preferences
    pub fn decoder(&self) -> &SampleDecoder {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut SampleDecoder {
        &mut self.decoder
    }

    /// Nominal stream rate used for throttling decisions
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Stop the receive task. Existing subscriptions end.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.stats.borrow().ended
    }
}

impl Drop for ReceiverConnection {
    fn drop(&mut self) {
        debug!("Dropping receiver connection");
        self.cancel.cancel();
    }
}

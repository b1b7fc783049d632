//! Wall clocks and time-source reconciliation.
//!
//! The receiver compares sample timestamps against a local reference time.
//! That reference is a [`Clock`] reading, corrected by an NTP offset when the
//! stream declares NTP as its time source. Senders stamp outgoing samples
//! from the same kind of reference with [`SampleStamper`].

mod ntp;
mod reconciler;
mod stamper;

pub use ntp::{DEFAULT_NTP_SERVER, DEFAULT_NTP_TIMEOUT, NTP_UNIX_EPOCH_DELTA, NtpClient, query_offset};
pub use reconciler::{FixedOffset, OffsetSource, TimeSourceReconciler, TimeSourceState};
pub use stamper::SampleStamper;

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in seconds since the Unix epoch.
pub trait Clock: Send + Sync + Debug + 'static {
    fn now(&self) -> f64;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        // A clock before 1970 reads as the epoch
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self { bits: Arc::new(AtomicU64::new(now.to_bits())) }
    }

    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

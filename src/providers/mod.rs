//! Datagram provider implementations

pub mod memory;
pub mod multicast;

pub use memory::{MemoryFeed, MemoryProvider};
pub use multicast::MulticastProvider;

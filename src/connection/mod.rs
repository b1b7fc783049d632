//! Connection handles over the receive driver

mod receiver;

pub use receiver::ReceiverConnection;

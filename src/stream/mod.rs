//! Stream combinators for sample subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};

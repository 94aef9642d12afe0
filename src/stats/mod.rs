//! Handle statistics and the backpressure watchdog

pub mod metrics;
pub mod watchdog;

pub use metrics::{HandleStats, StatsTable};
pub use watchdog::{Watchdog, DEFAULT_PENDING_THRESHOLD, DEFAULT_WATCHDOG_INTERVAL};

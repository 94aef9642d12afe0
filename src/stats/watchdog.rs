//! Backpressure watchdog
//!
//! Periodically scans the stats table and flags handles whose mailbox depth
//! is above a threshold. Observation only: nothing is throttled or killed.

use std::sync::Arc;
use std::time::Duration;

use super::metrics::{HandleStats, StatsTable};

/// Default scan period
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(10);

/// Default pending-message depth above which a handle is flagged
pub const DEFAULT_PENDING_THRESHOLD: usize = 100;

/// Periodic scanner over [`StatsTable`]
#[derive(Debug, Clone)]
pub struct Watchdog {
    stats: Arc<StatsTable>,
    interval: Duration,
    threshold: usize,
}

impl Watchdog {
    pub fn new(stats: Arc<StatsTable>, interval: Duration, threshold: usize) -> Self {
        Self {
            stats,
            interval,
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Run one scan and return the handles falling behind
    ///
    /// Depths of rows written through a mailbox are read at scan time.
    pub fn scan(&self) -> Vec<HandleStats> {
        let lagging: Vec<HandleStats> = self
            .stats
            .snapshot()
            .into_iter()
            .filter(|row| row.pending_messages > self.threshold)
            .collect();

        for row in &lagging {
            tracing::warn!(
                handle = %row.handle,
                stream = %row.name,
                clients = row.client_count,
                pending = row.pending_messages,
                threshold = self.threshold,
                "Media handle is falling behind"
            );
        }

        lagging
    }

    /// Spawn the periodic scan task
    ///
    /// The first scan runs one period after spawning. Returns a handle that
    /// can be used to abort the task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            loop {
                ticker.tick().await;
                self.scan();
            }
        })
    }
}

//! Lifecycle monitoring
//!
//! Every handle the coordinator registers or watches gets one exit watcher.
//! Watchers fan in to a single channel drained by the coordinator, so exit
//! cleanup is serialized with registrations.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::handle::{ExitReason, Handle, HandleId};
use crate::stats::StatsTable;

use super::event::EventSender;
use super::table::RegistryTable;

/// Subscription to a handle's exit
#[derive(Debug, Clone)]
pub struct MonitorToken {
    handle: HandleId,
    task: Arc<AbortHandle>,
}

impl MonitorToken {
    /// Handle being watched
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    /// False once the exit has been delivered or the watcher was cancelled
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub(crate) fn cancel(&self) {
        self.task.abort();
    }
}

/// Exit notification for one handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Down {
    pub handle: HandleId,
    pub reason: ExitReason,
}

/// Start watching `handle`; its exit is delivered on `down_tx`
pub(crate) fn monitor(handle: &Handle, down_tx: mpsc::UnboundedSender<Down>) -> MonitorToken {
    let watch = handle.exit_watch();
    let id = watch.id();

    let task = tokio::spawn(async move {
        let reason = watch.wait().await;
        let _ = down_tx.send(Down { handle: id, reason });
    });

    MonitorToken {
        handle: id,
        task: Arc::new(task.abort_handle()),
    }
}

/// Clean up after a handle exit
///
/// Drops the handle's stats row and every table entry pointing at it. Watched
/// handles that were never registered only lose their stats row.
pub(crate) fn reap(table: &RegistryTable, stats: &StatsTable, events: &EventSender, down: &Down) {
    stats.remove(down.handle);

    let removed = table.remove_by_handle(down.handle);
    for entry in &removed {
        tracing::info!(
            stream = %entry.key,
            handle = %down.handle,
            reason = %down.reason,
            age_ms = entry.age().as_millis() as u64,
            "Stream stopped"
        );
        events.stopped(entry.key.clone(), down.handle);
    }

    if down.reason.is_abnormal() {
        let streams: Vec<String> = removed.iter().map(|e| e.key.to_string()).collect();
        tracing::error!(
            handle = %down.handle,
            reason = ?down.reason,
            streams = ?streams,
            "Media handle exited abnormally"
        );
    }
}

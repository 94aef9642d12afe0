//! Per-handle runtime statistics
//!
//! Each handle writes its own row; the watchdog is the only bulk reader.
//! Rows are dropped by the lifecycle monitor when the handle exits.
//!
//! A row written through a handle's mailbox is bound to the mailbox depth
//! counter, so readers see the current depth even when the handle has
//! stopped reporting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::handle::HandleId;

/// Runtime stats row for one handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleStats {
    /// Handle the row belongs to
    pub handle: HandleId,
    /// Resource name the handle serves
    pub name: String,
    /// Number of attached consumers
    pub client_count: u32,
    /// Commands queued in the handle's mailbox
    pub pending_messages: usize,
}

#[derive(Debug)]
struct Row {
    stats: HandleStats,
    /// Live mailbox depth; overrides `stats.pending_messages` when bound
    depth: Option<Arc<AtomicUsize>>,
}

impl Row {
    fn current(&self) -> HandleStats {
        let mut stats = self.stats.clone();
        if let Some(depth) = &self.depth {
            stats.pending_messages = depth.load(Ordering::SeqCst);
        }
        stats
    }
}

/// Side table of handle stats keyed by handle
#[derive(Debug, Default)]
pub struct StatsTable {
    rows: DashMap<HandleId, Row>,
}

impl StatsTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the row for `stats.handle`
    ///
    /// A depth counter already bound to the row is kept.
    pub fn update(&self, stats: HandleStats) {
        match self.rows.entry(stats.handle) {
            Entry::Occupied(mut row) => row.get_mut().stats = stats,
            Entry::Vacant(slot) => {
                slot.insert(Row { stats, depth: None });
            }
        }
    }

    /// Insert or replace a row whose depth is read from `depth` on every access
    pub(crate) fn update_live(&self, stats: HandleStats, depth: Arc<AtomicUsize>) {
        self.rows.insert(
            stats.handle,
            Row {
                stats,
                depth: Some(depth),
            },
        );
    }

    pub fn get(&self, handle: HandleId) -> Option<HandleStats> {
        self.rows.get(&handle).map(|row| row.current())
    }

    pub(crate) fn remove(&self, handle: HandleId) -> Option<HandleStats> {
        self.rows.remove(&handle).map(|(_, row)| row.current())
    }

    /// Every row as of now, with bound depths read at call time
    pub fn snapshot(&self) -> Vec<HandleStats> {
        self.rows.iter().map(|row| row.value().current()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{ExitReason, Handle};

    fn idle_handle() -> Handle {
        Handle::spawn(|mut mailbox| async move {
            while mailbox.recv().await.is_some() {}
            ExitReason::Normal
        })
    }

    #[tokio::test]
    async fn test_update_replaces_row() {
        let table = StatsTable::new();
        let handle = idle_handle();

        table.update(HandleStats {
            handle: handle.id(),
            name: "live1".into(),
            client_count: 1,
            pending_messages: 0,
        });
        table.update(HandleStats {
            handle: handle.id(),
            name: "live1".into(),
            client_count: 4,
            pending_messages: 12,
        });

        assert_eq!(table.len(), 1);
        let row = table.get(handle.id()).unwrap();
        assert_eq!(row.client_count, 4);
        assert_eq!(row.pending_messages, 12);
    }

    #[tokio::test]
    async fn test_remove_and_snapshot() {
        let table = StatsTable::new();
        let a = idle_handle();
        let b = idle_handle();

        for (handle, name) in [(&a, "a"), (&b, "b")] {
            table.update(HandleStats {
                handle: handle.id(),
                name: name.into(),
                client_count: 0,
                pending_messages: 0,
            });
        }
        assert_eq!(table.snapshot().len(), 2);

        assert!(table.remove(a.id()).is_some());
        assert!(table.remove(a.id()).is_none());
        assert_eq!(table.snapshot()[0].name, "b");
    }

    #[tokio::test]
    async fn test_mailbox_reports_its_own_depth() {
        let table = std::sync::Arc::new(StatsTable::new());
        let (go_tx, go_rx) = tokio::sync::oneshot::channel::<()>();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let stats = std::sync::Arc::clone(&table);

        let handle = Handle::spawn(move |mailbox| async move {
            let _ = go_rx.await;
            mailbox.report(&stats, "cam1.flv", 2);
            let _ = done_tx.send(());
            let _keep = mailbox;
            std::future::pending::<()>().await;
            ExitReason::Normal
        });

        for _ in 0..3 {
            handle.stop().unwrap();
        }
        go_tx.send(()).unwrap();
        done_rx.await.unwrap();

        let row = table.get(handle.id()).unwrap();
        assert_eq!(row.name, "cam1.flv");
        assert_eq!(row.client_count, 2);
        assert_eq!(row.pending_messages, 3);

        // Depth follows the mailbox after the report
        handle.stop().unwrap();
        assert_eq!(table.get(handle.id()).unwrap().pending_messages, 4);

        // A plain update keeps the binding
        table.update(HandleStats {
            handle: handle.id(),
            name: "cam1.flv".into(),
            client_count: 5,
            pending_messages: 0,
        });
        let row = table.get(handle.id()).unwrap();
        assert_eq!(row.client_count, 5);
        assert_eq!(row.pending_messages, 4);
        handle.kill();
    }
}

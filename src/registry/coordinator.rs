//! Request coordinator
//!
//! A single task owns every write to the registry table. Requests are handled
//! one at a time in arrival order, so two racing registrations for one key
//! are decided by whichever arrives first. Exit notifications from the
//! lifecycle monitor are drained by the same task, ahead of new requests.
//!
//! ```text
//!   Opener ──register──┐
//!   API ────remove─────┼──► requests ──┐
//!   API ────watch──────┘               ├──► Coordinator ──► RegistryTable
//!   exit watchers ───────► downs ──────┘         │
//!                                                └──► events
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::handle::{Handle, HandleId};
use crate::options::Options;
use crate::stats::StatsTable;

use super::entry::RegistryEntry;
use super::error::RegistryError;
use super::event::EventSender;
use super::key::RegistryKey;
use super::monitor::{self, Down, MonitorToken};
use super::table::RegistryTable;

/// Mutation requests accepted by the coordinator
#[derive(Debug)]
pub(crate) enum Request {
    Register {
        key: RegistryKey,
        handle: Handle,
        options: Options,
        reply: oneshot::Sender<Result<Handle, RegistryError>>,
    },
    /// Watch for exit without publishing a name
    Watch { handle: Handle },
    UnregisterHandle {
        handle: HandleId,
        reply: oneshot::Sender<usize>,
    },
    Remove {
        key: RegistryKey,
        reply: oneshot::Sender<bool>,
    },
}

/// Sending side used by the rest of the registry
#[derive(Debug, Clone)]
pub(crate) struct CoordinatorClient {
    tx: mpsc::UnboundedSender<Request>,
}

impl CoordinatorClient {
    /// Register `handle` under `key`, or learn who already owns it
    pub(crate) async fn register(
        &self,
        key: RegistryKey,
        handle: Handle,
        options: Options,
    ) -> Result<Handle, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Register {
            key,
            handle,
            options,
            reply,
        })?;
        rx.await.map_err(|_| RegistryError::CoordinatorClosed)?
    }

    pub(crate) fn watch(&self, handle: Handle) -> Result<(), RegistryError> {
        self.send(Request::Watch { handle })
    }

    /// Drop every entry of `handle`; returns how many went away
    pub(crate) async fn unregister_handle(&self, handle: HandleId) -> Result<usize, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::UnregisterHandle { handle, reply })?;
        rx.await.map_err(|_| RegistryError::CoordinatorClosed)
    }

    /// Drop the entry for `key`; returns whether one existed
    pub(crate) async fn remove(&self, key: RegistryKey) -> Result<bool, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Remove { key, reply })?;
        rx.await.map_err(|_| RegistryError::CoordinatorClosed)
    }

    fn send(&self, request: Request) -> Result<(), RegistryError> {
        self.tx
            .send(request)
            .map_err(|_| RegistryError::CoordinatorClosed)
    }
}

/// The serialization task
pub(crate) struct Coordinator {
    requests: mpsc::UnboundedReceiver<Request>,
    down_tx: mpsc::UnboundedSender<Down>,
    downs: mpsc::UnboundedReceiver<Down>,
    table: Arc<RegistryTable>,
    stats: Arc<StatsTable>,
    events: EventSender,
    /// One exit watcher per handle, however many keys it holds
    monitors: HashMap<HandleId, MonitorToken>,
}

impl Coordinator {
    /// Spawn the coordinator task
    ///
    /// The task stops once every [`CoordinatorClient`] is dropped.
    pub(crate) fn spawn(
        table: Arc<RegistryTable>,
        stats: Arc<StatsTable>,
        events: EventSender,
    ) -> (CoordinatorClient, JoinHandle<()>) {
        let (tx, requests) = mpsc::unbounded_channel();
        let (down_tx, downs) = mpsc::unbounded_channel();

        let coordinator = Self {
            requests,
            down_tx,
            downs,
            table,
            stats,
            events,
            monitors: HashMap::new(),
        };
        let task = tokio::spawn(coordinator.run());

        (CoordinatorClient { tx }, task)
    }

    async fn run(mut self) {
        tracing::debug!("Registry coordinator started");

        loop {
            tokio::select! {
                biased;
                Some(down) = self.downs.recv() => self.handle_down(down),
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
            }
        }

        for token in self.monitors.values() {
            token.cancel();
        }
        tracing::debug!(
            monitors = self.monitors.len(),
            entries = self.table.len(),
            "Registry coordinator stopped"
        );
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Register {
                key,
                handle,
                options,
                reply,
            } => {
                let result = self.register(key, handle, options);
                let _ = reply.send(result);
            }
            Request::Watch { handle } => {
                let token = self.ensure_monitor(&handle);
                tracing::debug!(handle = %token.handle(), "Watching private handle");
            }
            Request::UnregisterHandle { handle, reply } => {
                let removed = self.table.remove_by_handle(handle);
                for entry in &removed {
                    tracing::info!(
                        stream = %entry.key,
                        handle = %handle,
                        age_ms = entry.age().as_millis() as u64,
                        "Stream unregistered"
                    );
                    self.events.stopped(entry.key.clone(), handle);
                }
                let _ = reply.send(removed.len());
            }
            Request::Remove { key, reply } => {
                let removed = self.table.remove(&key);
                if let Some(entry) = &removed {
                    tracing::info!(
                        stream = %key,
                        handle = %entry.handle.id(),
                        age_ms = entry.age().as_millis() as u64,
                        "Stream removed"
                    );
                    self.events.stopped(key, entry.handle.id());
                }
                let _ = reply.send(removed.is_some());
            }
        }
    }

    fn register(
        &mut self,
        key: RegistryKey,
        handle: Handle,
        options: Options,
    ) -> Result<Handle, RegistryError> {
        if let Some(existing) = self.table.find(&key) {
            tracing::debug!(
                stream = %key,
                existing = %existing.id(),
                rejected = %handle.id(),
                "Key already registered"
            );
            return Err(RegistryError::AlreadyRegistered { key, existing });
        }

        if !handle.is_alive() {
            return Err(RegistryError::HandleExited {
                key,
                handle: handle.id(),
            });
        }

        let token = self.ensure_monitor(&handle);
        let entry = RegistryEntry::new(key.clone(), handle.clone(), token, options);
        if let Err(existing) = self.table.insert_if_absent(entry) {
            return Err(RegistryError::AlreadyRegistered { key, existing });
        }

        tracing::info!(stream = %key, handle = %handle.id(), "Stream registered");
        self.events.created(key, handle.id());
        Ok(handle)
    }

    fn ensure_monitor(&mut self, handle: &Handle) -> MonitorToken {
        let down_tx = &self.down_tx;
        self.monitors
            .entry(handle.id())
            .or_insert_with(|| monitor::monitor(handle, down_tx.clone()))
            .clone()
    }

    fn handle_down(&mut self, down: Down) {
        self.monitors.remove(&down.handle);
        monitor::reap(&self.table, &self.stats, &self.events, &down);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::broadcast;

    use super::*;
    use crate::handle::ExitReason;
    use crate::registry::event::RegistryEvent;
    use crate::stats::HandleStats;

    struct Fixture {
        client: CoordinatorClient,
        table: Arc<RegistryTable>,
        stats: Arc<StatsTable>,
        events: broadcast::Receiver<RegistryEvent>,
        task: JoinHandle<()>,
    }

    fn fixture() -> Fixture {
        let table = Arc::new(RegistryTable::new());
        let stats = Arc::new(StatsTable::new());
        let events = EventSender::new(16);
        let rx = events.subscribe();
        let (client, task) = Coordinator::spawn(Arc::clone(&table), Arc::clone(&stats), events);
        Fixture {
            client,
            table,
            stats,
            events: rx,
            task,
        }
    }

    fn idle_handle() -> Handle {
        Handle::spawn(|mut mailbox| async move {
            while let Some(cmd) = mailbox.recv().await {
                if matches!(cmd, crate::handle::HandleCommand::Shutdown) {
                    return ExitReason::Shutdown;
                }
            }
            ExitReason::Normal
        })
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_second_register_reports_winner() {
        let f = fixture();
        let key = RegistryKey::new("vhost1", "live1");
        let h1 = idle_handle();
        let h2 = idle_handle();

        let first = f.client.register(key.clone(), h1.clone(), Options::new()).await;
        assert_eq!(first.unwrap(), h1);

        let second = f.client.register(key.clone(), h2.clone(), Options::new()).await;
        match second {
            Err(RegistryError::AlreadyRegistered { existing, .. }) => assert_eq!(existing, h1),
            other => panic!("expected AlreadyRegistered, got {:?}", other),
        }
        assert_eq!(f.table.find(&key), Some(h1));
        // The loser is not watched
        assert!(f.table.keys_for(h2.id()).is_empty());
    }

    #[tokio::test]
    async fn test_death_removes_entry_and_stats() {
        let mut f = fixture();
        let key = RegistryKey::new("vhost1", "live1");
        let handle = idle_handle();

        f.client.register(key.clone(), handle.clone(), Options::new()).await.unwrap();
        f.stats.update(HandleStats {
            handle: handle.id(),
            name: "live1".into(),
            client_count: 1,
            pending_messages: 0,
        });
        assert!(f.table.get(&key).unwrap().is_monitored());

        handle.kill();
        let (table, stats, id) = (Arc::clone(&f.table), Arc::clone(&f.stats), handle.id());
        eventually(move || table.find(&key).is_none() && stats.get(id).is_none()).await;

        assert!(matches!(f.events.recv().await, Ok(RegistryEvent::StreamCreated { .. })));
        assert!(matches!(f.events.recv().await, Ok(RegistryEvent::StreamStopped { .. })));
    }

    #[tokio::test]
    async fn test_watch_only_cleans_stats() {
        let f = fixture();
        let handle = idle_handle();

        f.client.watch(handle.clone()).unwrap();
        f.stats.update(HandleStats {
            handle: handle.id(),
            name: "private".into(),
            client_count: 0,
            pending_messages: 0,
        });
        assert!(f.table.is_empty());

        handle.shutdown().unwrap();
        let (stats, id) = (Arc::clone(&f.stats), handle.id());
        eventually(move || stats.get(id).is_none()).await;
        assert!(f.table.is_empty());
    }

    #[tokio::test]
    async fn test_remove_leaves_handle_running() {
        let f = fixture();
        let key = RegistryKey::new("vhost1", "live1");
        let h1 = idle_handle();

        f.client.register(key.clone(), h1.clone(), Options::new()).await.unwrap();
        assert!(f.client.remove(key.clone()).await.unwrap());
        assert!(!f.client.remove(key.clone()).await.unwrap());

        assert!(f.table.find(&key).is_none());
        assert!(h1.is_alive());
    }

    #[tokio::test]
    async fn test_unregister_by_handle() {
        let f = fixture();
        let h1 = idle_handle();
        for name in ["a", "b"] {
            f.client
                .register(RegistryKey::new("vhost1", name), h1.clone(), Options::new())
                .await
                .unwrap();
        }

        // Both names share the one watcher of the handle
        let a = f.table.get(&RegistryKey::new("vhost1", "a")).unwrap();
        let b = f.table.get(&RegistryKey::new("vhost1", "b")).unwrap();
        assert_eq!(a.monitor.handle(), h1.id());
        assert_eq!(b.monitor.handle(), h1.id());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(a.age() >= Duration::from_millis(10));

        assert_eq!(f.client.unregister_handle(h1.id()).await.unwrap(), 2);
        assert!(f.table.is_empty());
        assert_eq!(f.client.unregister_handle(h1.id()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_exited_handle() {
        let f = fixture();
        let handle = idle_handle();
        handle.shutdown().unwrap();
        handle.wait_exit().await;

        let result = f
            .client
            .register(RegistryKey::new("vhost1", "late"), handle, Options::new())
            .await;
        assert!(matches!(result, Err(RegistryError::HandleExited { .. })));
        assert!(f.table.is_empty());
    }

    #[tokio::test]
    async fn test_stops_when_clients_drop() {
        let f = fixture();
        let Fixture { client, task, .. } = f;
        drop(client);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("coordinator should stop")
            .unwrap();
    }
}

//! Media registry implementation
//!
//! The public entry point: find-or-create, explicit registration, removal and
//! introspection of media handles, one namespace per virtual host.

use std::sync::{Arc, Weak};

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

use crate::error::{Error, NotFoundCause, Result};
use crate::handle::{Handle, HandleId, HandleStarter, InfoMap, MediaInfo, PlayRequest};
use crate::options::Options;
use crate::remote::RemoteOpener;
use crate::stats::{StatsTable, Watchdog};

use super::config::RegistryConfig;
use super::coordinator::{Coordinator, CoordinatorClient};
use super::entry::{EntryListing, RegistryEntry};
use super::event::{EventSender, RegistryEvent};
use super::key::RegistryKey;
use super::opener::Opener;
use super::table::RegistryTable;

/// Central registry of running media handles
///
/// Cloning is cheap; clones share one table and one coordinator. The
/// coordinator and the backpressure watchdog stop when the last clone is
/// dropped.
#[derive(Clone)]
pub struct MediaRegistry {
    inner: Arc<Inner>,
}

/// Non-owning reference to a [`MediaRegistry`]
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<Inner>,
}

struct Inner {
    config: Arc<RegistryConfig>,
    table: Arc<RegistryTable>,
    stats: Arc<StatsTable>,
    events: EventSender,
    coordinator: CoordinatorClient,
    opener: Opener,
    watchdog: AbortHandle,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.watchdog.abort();
    }
}

impl MediaRegistry {
    /// Create a registry with default configuration
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(starter: Arc<dyn HandleStarter>) -> Self {
        Self::with_config(RegistryConfig::default(), starter)
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig, starter: Arc<dyn HandleStarter>) -> Self {
        Self::build(config, starter, None)
    }

    /// Create a registry that can delegate `type = remote` opens
    pub fn with_remote(
        config: RegistryConfig,
        starter: Arc<dyn HandleStarter>,
        remote: Arc<dyn RemoteOpener>,
    ) -> Self {
        Self::build(config, starter, Some(remote))
    }

    fn build(
        config: RegistryConfig,
        starter: Arc<dyn HandleStarter>,
        remote: Option<Arc<dyn RemoteOpener>>,
    ) -> Self {
        let config = Arc::new(config);
        let table = Arc::new(RegistryTable::new());
        let stats = Arc::new(StatsTable::new());
        let events = EventSender::new(config.event_capacity);

        let (coordinator, _task) =
            Coordinator::spawn(Arc::clone(&table), Arc::clone(&stats), events.clone());
        let opener = Opener::new(
            Arc::clone(&config),
            Arc::clone(&table),
            coordinator.clone(),
            starter,
            remote,
        );
        let watchdog = Watchdog::new(
            Arc::clone(&stats),
            config.watchdog_interval,
            config.watchdog_threshold,
        )
        .spawn()
        .abort_handle();

        Self {
            inner: Arc::new(Inner {
                config,
                table,
                stats,
                events,
                coordinator,
                opener,
                watchdog,
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Find-or-create the handle for `name`
    pub async fn open(
        &self,
        host: &str,
        name: impl AsRef<[u8]>,
        options: Options,
    ) -> Result<Handle> {
        self.inner.opener.open(RegistryKey::new(host, name), options).await
    }

    /// Open `name` and mark `source` as its media source
    pub async fn create(
        &self,
        host: &str,
        name: impl AsRef<[u8]>,
        options: Options,
        source: impl Into<String>,
    ) -> Result<Handle> {
        let handle = self.open(host, name, options).await?;
        handle.set_source(source)?;
        Ok(handle)
    }

    /// Open `name` and start delivering it to a consumer
    ///
    /// `options` must carry `stream_id`; `client_buffer` is optional.
    pub async fn play(
        &self,
        host: &str,
        name: impl AsRef<[u8]>,
        options: Options,
    ) -> Result<Handle> {
        let stream_id = options.stream_id.ok_or(Error::MissingOption("stream_id"))?;
        let client_buffer = options.client_buffer;

        let handle = self.open(host, name, options.clone()).await?;
        handle.play(PlayRequest {
            stream_id,
            client_buffer,
            options,
        })?;
        Ok(handle)
    }

    /// Lookup only; never creates
    pub fn find(&self, host: &str, name: impl AsRef<[u8]>) -> Option<Handle> {
        self.inner.table.find(&RegistryKey::new(host, name))
    }

    /// Full table entry for `name`
    pub fn entry(&self, host: &str, name: impl AsRef<[u8]>) -> Option<RegistryEntry> {
        self.inner.table.get(&RegistryKey::new(host, name))
    }

    /// Publish an externally started handle under `name`
    ///
    /// Fails with [`RegistryError::AlreadyRegistered`](super::RegistryError)
    /// carrying the current owner when the name is taken.
    pub async fn register(
        &self,
        host: &str,
        name: impl AsRef<[u8]>,
        handle: Handle,
        options: Options,
    ) -> Result<Handle> {
        let key = RegistryKey::new(host, name);
        Ok(self.inner.coordinator.register(key, handle, options).await?)
    }

    /// Drop `name` from the table; the handle keeps running
    pub async fn remove(&self, host: &str, name: impl AsRef<[u8]>) {
        let key = RegistryKey::new(host, name);
        if let Err(e) = self.inner.coordinator.remove(key.clone()).await {
            tracing::warn!(stream = %key, error = %e, "Remove not applied");
        }
    }

    /// Ask the handle registered under `name` to stop
    pub fn stop(&self, host: &str, name: impl AsRef<[u8]>) -> Result<()> {
        let key = RegistryKey::new(host, name);
        match self.inner.table.find(&key) {
            Some(handle) => {
                tracing::info!(stream = %key, handle = %handle.id(), "Stopping stream");
                Ok(handle.stop()?)
            }
            None => Err(Error::not_found(&key, NotFoundCause::NotRunning)),
        }
    }

    /// Watch a handle for exit without publishing it by name
    pub fn watch(&self, handle: &Handle) -> Result<()> {
        Ok(self.inner.coordinator.watch(handle.clone())?)
    }

    /// Drop every entry pointing at `handle`; returns how many went away
    pub async fn unregister_handle(&self, handle: HandleId) -> Result<usize> {
        Ok(self.inner.coordinator.unregister_handle(handle).await?)
    }

    /// Every entry of `host` with its handle's current status
    ///
    /// Handles are queried concurrently; one that does not answer within
    /// the status timeout is listed with no status.
    pub async fn entries(&self, host: &str) -> Vec<EntryListing> {
        let limit = self.inner.config.status_timeout;
        let rows = self.inner.table.host_entries(host);

        let statuses = join_all(rows.iter().map(|entry| entry.handle.status(limit))).await;

        rows.into_iter()
            .zip(statuses)
            .map(|(entry, status)| {
                if let Err(e) = &status {
                    tracing::debug!(stream = %entry.key, error = %e, "No status for entry");
                }
                EntryListing {
                    name: entry.key.name,
                    handle: entry.handle,
                    status: status.ok(),
                }
            })
            .collect()
    }

    /// Free-form description of `name`; empty when not running
    pub async fn info(&self, host: &str, name: impl AsRef<[u8]>) -> InfoMap {
        let Some(handle) = self.find(host, name) else {
            return InfoMap::new();
        };
        handle
            .info(self.inner.config.status_timeout)
            .await
            .unwrap_or_default()
    }

    /// Media descriptor of `name`, if it is running and knows one
    pub async fn media_info(&self, host: &str, name: impl AsRef<[u8]>) -> Option<MediaInfo> {
        let handle = self.find(host, name)?;
        handle
            .media_info(self.inner.config.status_timeout)
            .await
            .ok()
            .flatten()
    }

    /// Subscribe to stream-created / stream-stopped events
    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.inner.events.subscribe()
    }

    /// Per-handle stats table; handles write their own rows
    pub fn stats(&self) -> Arc<StatsTable> {
        Arc::clone(&self.inner.stats)
    }

    /// Watchdog over this registry's stats, using the configured period and threshold
    ///
    /// The registry already runs one of these periodically; this copy is for
    /// on-demand scans.
    pub fn watchdog(&self) -> Watchdog {
        Watchdog::new(
            self.stats(),
            self.inner.config.watchdog_interval,
            self.inner.config.watchdog_threshold,
        )
    }

    /// Number of registered names across all hosts
    pub fn len(&self) -> usize {
        self.inner.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.table.is_empty()
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<MediaRegistry> {
        self.inner.upgrade().map(|inner| MediaRegistry { inner })
    }
}

impl std::fmt::Debug for MediaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaRegistry")
            .field("entries", &self.inner.table.len())
            .field("stats", &self.inner.stats.len())
            .finish()
    }
}

impl std::fmt::Debug for WeakRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakRegistry")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

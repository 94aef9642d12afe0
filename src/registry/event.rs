//! Registry lifecycle events

use tokio::sync::broadcast;

use crate::handle::HandleId;

use super::key::RegistryKey;

/// Event emitted by the coordinator when the table changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A resource was registered under `key`
    StreamCreated { key: RegistryKey, handle: HandleId },
    /// The entry for `key` went away (explicit removal or handle exit)
    StreamStopped { key: RegistryKey, handle: HandleId },
}

/// Fan-out of registry events; slow subscribers lose the oldest events
#[derive(Debug, Clone)]
pub(crate) struct EventSender {
    tx: broadcast::Sender<RegistryEvent>,
}

impl EventSender {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn created(&self, key: RegistryKey, handle: HandleId) {
        // No subscribers is fine
        let _ = self.tx.send(RegistryEvent::StreamCreated { key, handle });
    }

    pub(crate) fn stopped(&self, key: RegistryKey, handle: HandleId) {
        let _ = self.tx.send(RegistryEvent::StreamStopped { key, handle });
    }
}

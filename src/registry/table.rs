//! Registry table
//!
//! Concurrent map from key to entry. Reads go straight to the map from any
//! task; writes are only issued by the coordinator, which makes the
//! check-then-insert sequence atomic with respect to other writers.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::handle::{Handle, HandleId};

use super::entry::RegistryEntry;
use super::key::RegistryKey;

/// Key → entry map with a handle → keys reverse index
#[derive(Debug, Default)]
pub struct RegistryTable {
    entries: DashMap<RegistryKey, RegistryEntry>,
    by_handle: DashMap<HandleId, Vec<RegistryKey>>,
}

impl RegistryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking lookup on the hot path
    pub fn find(&self, key: &RegistryKey) -> Option<Handle> {
        self.entries.get(key).map(|entry| entry.handle.clone())
    }

    /// Full entry for `key`
    pub fn get(&self, key: &RegistryKey) -> Option<RegistryEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Every entry of `host`, ordered by name
    pub fn host_entries(&self, host: &str) -> Vec<RegistryEntry> {
        let mut rows: Vec<RegistryEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.key().host == host)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| a.key.name.cmp(&b.key.name));
        rows
    }

    /// Keys currently pointing at `handle`
    pub fn keys_for(&self, handle: HandleId) -> Vec<RegistryKey> {
        self.by_handle
            .get(&handle)
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert unless the key is taken; returns the current owner otherwise
    pub(crate) fn insert_if_absent(&self, entry: RegistryEntry) -> Result<(), Handle> {
        let key = entry.key.clone();
        let id = entry.handle.id();

        match self.entries.entry(key.clone()) {
            Entry::Occupied(existing) => return Err(existing.get().handle.clone()),
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }

        self.by_handle.entry(id).or_default().push(key);
        Ok(())
    }

    pub(crate) fn remove(&self, key: &RegistryKey) -> Option<RegistryEntry> {
        let (_, entry) = self.entries.remove(key)?;
        self.unindex(entry.handle.id(), key);
        Some(entry)
    }

    /// Remove every entry pointing at `handle`
    pub(crate) fn remove_by_handle(&self, handle: HandleId) -> Vec<RegistryEntry> {
        let Some((_, keys)) = self.by_handle.remove(&handle) else {
            return Vec::new();
        };

        keys.iter()
            .filter_map(|key| {
                self.entries
                    .remove_if(key, |_, entry| entry.handle.id() == handle)
                    .map(|(_, entry)| entry)
            })
            .collect()
    }

    fn unindex(&self, handle: HandleId, key: &RegistryKey) {
        let now_empty = match self.by_handle.get_mut(&handle) {
            Some(mut keys) => {
                keys.retain(|k| k != key);
                keys.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.by_handle.remove_if(&handle, |_, keys| keys.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::handle::ExitReason;
    use crate::options::Options;
    use crate::registry::monitor::monitor;

    fn idle_handle() -> Handle {
        Handle::spawn(|mut mailbox| async move {
            while mailbox.recv().await.is_some() {}
            ExitReason::Normal
        })
    }

    fn entry(host: &str, name: &str, handle: &Handle) -> RegistryEntry {
        let (down_tx, _down_rx) = mpsc::unbounded_channel();
        RegistryEntry::new(
            RegistryKey::new(host, name),
            handle.clone(),
            monitor(handle, down_tx),
            Options::new(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let table = RegistryTable::new();
        let h1 = idle_handle();
        let key = RegistryKey::new("vhost1", "live1");

        table.insert_if_absent(entry("vhost1", "live1", &h1)).unwrap();

        assert_eq!(table.find(&key), Some(h1.clone()));
        assert_eq!(table.keys_for(h1.id()), vec![key]);
        assert!(table.find(&RegistryKey::new("vhost2", "live1")).is_none());
    }

    #[tokio::test]
    async fn test_second_insert_returns_owner() {
        let table = RegistryTable::new();
        let h1 = idle_handle();
        let h2 = idle_handle();

        table.insert_if_absent(entry("vhost1", "live1", &h1)).unwrap();
        let owner = table.insert_if_absent(entry("vhost1", "live1", &h2)).unwrap_err();

        assert_eq!(owner, h1);
        assert_eq!(table.len(), 1);
        assert!(table.keys_for(h2.id()).is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_index_consistent() {
        let table = RegistryTable::new();
        let h1 = idle_handle();

        table.insert_if_absent(entry("vhost1", "a", &h1)).unwrap();
        table.insert_if_absent(entry("vhost1", "b", &h1)).unwrap();

        assert!(table.remove(&RegistryKey::new("vhost1", "a")).is_some());
        assert_eq!(table.keys_for(h1.id()), vec![RegistryKey::new("vhost1", "b")]);

        let removed = table.remove_by_handle(h1.id());
        assert_eq!(removed.len(), 1);
        assert!(table.is_empty());
        assert!(table.keys_for(h1.id()).is_empty());
    }

    #[tokio::test]
    async fn test_host_entries_are_scoped_and_sorted() {
        let table = RegistryTable::new();
        for name in ["zeta", "alpha", "mid"] {
            table.insert_if_absent(entry("vhost1", name, &idle_handle())).unwrap();
        }
        table.insert_if_absent(entry("vhost2", "other", &idle_handle())).unwrap();

        let names: Vec<_> = table
            .host_entries("vhost1")
            .into_iter()
            .map(|e| e.key.name_lossy())
            .collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }
}

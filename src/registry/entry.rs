//! Registry entry types
//!
//! This module defines the per-resource row stored in the registry table.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::handle::{Handle, HandleStatus};
use crate::options::Options;

use super::key::RegistryKey;
use super::monitor::MonitorToken;

/// Entry for a single resource in the registry
///
/// Entries are immutable once inserted. Renaming is a remove followed by a
/// new registration.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub key: RegistryKey,

    /// Live at insertion time; may die at any point afterwards
    pub handle: Handle,

    /// Exit subscription shared by every entry of the same handle
    pub(crate) monitor: MonitorToken,

    /// Options the resource was registered with
    pub options: Options,

    pub registered_at: Instant,
}

impl RegistryEntry {
    pub(super) fn new(
        key: RegistryKey,
        handle: Handle,
        monitor: MonitorToken,
        options: Options,
    ) -> Self {
        Self {
            key,
            handle,
            monitor,
            options,
            registered_at: Instant::now(),
        }
    }

    /// How long the entry has been registered
    pub fn age(&self) -> Duration {
        self.registered_at.elapsed()
    }

    /// Whether the exit watcher for this entry's handle is still running
    pub fn is_monitored(&self) -> bool {
        self.monitor.is_active()
    }
}

/// One row of `entries(host)`
#[derive(Debug, Clone)]
pub struct EntryListing {
    pub name: Bytes,
    pub handle: Handle,
    /// `None` when the handle did not answer the status query in time
    pub status: Option<HandleStatus>,
}

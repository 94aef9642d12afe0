//! Registry configuration

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::detect::{default_chain, Detector, RewriteTable};
use crate::options::Options;
use crate::stats::{DEFAULT_PENDING_THRESHOLD, DEFAULT_WATCHDOG_INTERVAL};

/// Default bound on a remote ping or remote open
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of alias hops followed before giving up
pub const DEFAULT_MAX_ALIAS_HOPS: usize = 16;

/// Per-virtual-host detection settings
#[derive(Clone, Default)]
pub struct HostConfig {
    rewrites: RewriteTable,
    file_root: Option<PathBuf>,
    /// Replaces the default chain when set
    detectors: Option<Vec<Arc<dyn Detector>>>,
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory the file detectors look in
    pub fn file_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.file_root = Some(root.into());
        self
    }

    /// Add a static rewrite rule for a literal name
    pub fn rewrite(mut self, name: impl AsRef<[u8]>, options: Options) -> Self {
        self.rewrites.insert(name, options);
        self
    }

    /// Use a custom detector chain instead of the default one
    pub fn detectors(mut self, chain: Vec<Arc<dyn Detector>>) -> Self {
        self.detectors = Some(chain);
        self
    }

    pub fn rewrites(&self) -> &RewriteTable {
        &self.rewrites
    }

    pub fn root(&self) -> Option<&Path> {
        self.file_root.as_deref()
    }

    /// Detector chain in the order it runs
    pub fn chain(&self) -> Vec<Arc<dyn Detector>> {
        match &self.detectors {
            Some(chain) => chain.clone(),
            None => default_chain(&self.rewrites, self.root()),
        }
    }
}

impl fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<String> = self.chain().iter().map(|d| d.name().to_string()).collect();
        f.debug_struct("HostConfig")
            .field("rewrites", &self.rewrites.len())
            .field("file_root", &self.file_root)
            .field("detectors", &chain)
            .finish()
    }
}

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Settings for named virtual hosts
    pub hosts: HashMap<String, HostConfig>,

    /// Settings for hosts without an entry in `hosts`
    pub default_host: HostConfig,

    /// Watchdog scan period
    pub watchdog_interval: Duration,

    /// Pending-message depth above which the watchdog flags a handle
    pub watchdog_threshold: usize,

    /// Bound on each remote ping and remote open
    pub remote_timeout: Duration,

    /// Alias hops followed before an open fails
    pub max_alias_hops: usize,

    /// Bound on status/info queries sent to handles
    pub status_timeout: Duration,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            hosts: HashMap::new(),
            default_host: HostConfig::default(),
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            watchdog_threshold: DEFAULT_PENDING_THRESHOLD,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            max_alias_hops: DEFAULT_MAX_ALIAS_HOPS,
            status_timeout: Duration::from_secs(1),
            event_capacity: 256,
        }
    }
}

impl RegistryConfig {
    /// Configure a virtual host
    pub fn host(mut self, host: impl Into<String>, config: HostConfig) -> Self {
        self.hosts.insert(host.into(), config);
        self
    }

    /// Configure hosts that have no explicit entry
    pub fn default_host(mut self, config: HostConfig) -> Self {
        self.default_host = config;
        self
    }

    /// Set the watchdog scan period
    pub fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Set the watchdog pending-message threshold
    pub fn watchdog_threshold(mut self, threshold: usize) -> Self {
        self.watchdog_threshold = threshold;
        self
    }

    /// Set the remote delegation timeout
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Set the alias hop limit
    pub fn max_alias_hops(mut self, hops: usize) -> Self {
        self.max_alias_hops = hops;
        self
    }

    /// Set the handle query timeout
    pub fn status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Set the event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Settings for `host`
    pub fn host_config(&self, host: &str) -> &HostConfig {
        self.hosts.get(host).unwrap_or(&self.default_host)
    }
}

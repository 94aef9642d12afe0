//! Find-or-create orchestration
//!
//! One `open` call runs this loop:
//!
//! ```text
//!   find ──hit──────────────────────────────────────────► handle
//!    │miss
//!    ▼
//!   resolve options (caller > detected > defaults)
//!    │
//!    ├── notfound / undefined ──────────────────────────► NotFound
//!    ├── alias ──► next name, back to `find` (bounded hops)
//!    ├── remote ─► ping + forward to node (bounded time) ► node's answer
//!    └── other ──► start ──► register ──┬── created ────► new handle
//!                                       └── taken ──► shut down ours,
//!                                                     return the winner
//! ```

use std::sync::Arc;

use crate::detect;
use crate::error::{Error, NotFoundCause, Result};
use crate::handle::{Handle, HandleStarter};
use crate::options::{MediaType, Options};
use crate::remote::{self, RemoteOpener};

use super::config::RegistryConfig;
use super::coordinator::CoordinatorClient;
use super::error::RegistryError;
use super::key::RegistryKey;
use super::table::RegistryTable;

pub(crate) struct Opener {
    config: Arc<RegistryConfig>,
    table: Arc<RegistryTable>,
    coordinator: CoordinatorClient,
    starter: Arc<dyn HandleStarter>,
    remote: Option<Arc<dyn RemoteOpener>>,
}

impl Opener {
    pub(crate) fn new(
        config: Arc<RegistryConfig>,
        table: Arc<RegistryTable>,
        coordinator: CoordinatorClient,
        starter: Arc<dyn HandleStarter>,
        remote: Option<Arc<dyn RemoteOpener>>,
    ) -> Self {
        Self {
            config,
            table,
            coordinator,
            starter,
            remote,
        }
    }

    /// Return the single live handle for `key`, creating it if needed
    pub(crate) async fn open(&self, requested: RegistryKey, options: Options) -> Result<Handle> {
        let mut key = requested.clone();
        let mut caller = options;
        let mut hops = 0usize;

        loop {
            if let Some(handle) = self.table.find(&key) {
                return Ok(handle);
            }

            let resolved = self.resolve(&key, caller).await;

            match resolved.media_type.clone() {
                None => {
                    tracing::debug!(stream = %key, "Resolved type is undefined");
                    return Err(Error::not_found(&key, NotFoundCause::Undefined));
                }
                Some(MediaType::NotFound) => {
                    return Err(Error::not_found(&key, NotFoundCause::NoMatch));
                }
                Some(MediaType::Alias) => {
                    // Defaults always fill `url`; a rule without one aliases itself
                    let target = resolved.url.clone().unwrap_or_else(|| key.name.clone());

                    hops += 1;
                    if hops > self.config.max_alias_hops {
                        tracing::warn!(
                            stream = %requested,
                            hops = hops - 1,
                            last = %key,
                            "Alias chain too long, giving up"
                        );
                        return Err(Error::not_found(&requested, NotFoundCause::AliasLimit));
                    }

                    let next = RegistryKey::from_bytes(key.host.clone(), target);
                    tracing::debug!(from = %key, to = %next, hop = hops, "Following alias");
                    key = next;
                    caller = resolved.for_next_hop();
                }
                Some(MediaType::Remote) => {
                    return remote::delegate(
                        self.remote.as_deref(),
                        self.config.remote_timeout,
                        &key,
                        resolved,
                    )
                    .await;
                }
                Some(_) => return self.start(key, resolved).await,
            }
        }
    }

    /// Layer caller, detected and default options for `key`
    async fn resolve(&self, key: &RegistryKey, caller: Options) -> Options {
        let host = self.config.host_config(&key.host);
        let defaults = Options::defaults(&key.host, &key.name);

        let merged = if caller.media_type.is_none() {
            let so_far = caller.clone().merged_over(&defaults);
            let detected = detect::resolve(&host.chain(), key, &so_far).await;
            caller.merged_over(&detected)
        } else {
            match host.rewrites().get(&key.name) {
                Some(rule) => {
                    tracing::debug!(stream = %key, "Applying rewrite rule to typed open");
                    caller.merged_over(rule)
                }
                None => caller,
            }
        };

        merged.merged_over(&defaults)
    }

    async fn start(&self, key: RegistryKey, resolved: Options) -> Result<Handle> {
        let handle = match self.starter.start(&key, &resolved).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(
                    stream = %key,
                    media_type = ?resolved.media_type,
                    url = ?resolved.url_lossy(),
                    error = %e,
                    "Failed to start media handle"
                );
                return Err(Error::not_found(&key, NotFoundCause::StartFailed));
            }
        };

        tracing::debug!(
            stream = %key,
            handle = %handle.id(),
            media_type = ?resolved.media_type,
            public = resolved.is_public(),
            "Media handle started"
        );

        if !resolved.is_public() {
            if let Err(e) = self.coordinator.watch(handle.clone()) {
                let _ = handle.shutdown();
                return Err(e.into());
            }
            return Ok(handle);
        }

        match self
            .coordinator
            .register(key.clone(), handle.clone(), resolved)
            .await
        {
            Ok(registered) => Ok(registered),
            Err(RegistryError::AlreadyRegistered { existing, .. }) => {
                tracing::info!(
                    stream = %key,
                    kept = %existing.id(),
                    discarded = %handle.id(),
                    "Lost creation race, discarding duplicate handle"
                );
                let _ = handle.shutdown();
                Ok(existing)
            }
            Err(RegistryError::HandleExited { .. }) => {
                tracing::warn!(
                    stream = %key,
                    handle = %handle.id(),
                    reason = ?handle.exit_reason(),
                    "Media handle exited before registration"
                );
                Err(Error::not_found(&key, NotFoundCause::StartFailed))
            }
            Err(e) => {
                let _ = handle.shutdown();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::handle::{ExitReason, HandleCommand, StartError};
    use crate::registry::config::HostConfig;
    use crate::registry::coordinator::Coordinator;
    use crate::registry::event::EventSender;
    use crate::stats::StatsTable;

    /// Records the options every start was asked for
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<Options>>,
    }

    #[async_trait]
    impl HandleStarter for Recording {
        async fn start(&self, _key: &RegistryKey, options: &Options) -> std::result::Result<Handle, StartError> {
            self.seen.lock().unwrap().push(options.clone());
            Ok(Handle::spawn(|mut mailbox| async move {
                while let Some(cmd) = mailbox.recv().await {
                    if matches!(cmd, HandleCommand::Shutdown) {
                        return ExitReason::Shutdown;
                    }
                }
                ExitReason::Normal
            }))
        }
    }

    fn opener(config: RegistryConfig, starter: Arc<Recording>) -> Opener {
        let table = Arc::new(RegistryTable::new());
        let (client, _task) = Coordinator::spawn(
            Arc::clone(&table),
            Arc::new(StatsTable::new()),
            EventSender::new(8),
        );
        Opener::new(Arc::new(config), table, client, starter, None)
    }

    #[tokio::test]
    async fn test_typed_open_skips_detection() {
        let starter = Arc::new(Recording::default());
        let config = RegistryConfig::default()
            .default_host(HostConfig::new().detectors(Vec::new()));
        let opener = opener(config, Arc::clone(&starter));

        // An empty chain would yield notfound if it ran
        let key = RegistryKey::new("vhost1", "cam1");
        opener
            .open(key, Options::new().media_type(MediaType::Live))
            .await
            .unwrap();

        let seen = starter.seen.lock().unwrap();
        assert_eq!(seen[0].media_type, Some(MediaType::Live));
        assert_eq!(seen[0].url.as_deref(), Some(&b"cam1"[..]));
        assert_eq!(seen[0].host.as_deref(), Some("vhost1"));
    }

    #[tokio::test]
    async fn test_rewrite_rule_applies_under_typed_open() {
        let starter = Arc::new(Recording::default());
        let rule = Options::new()
            .media_type(MediaType::Http)
            .url("http://origin/tv")
            .set("codec", "h264");
        let config = RegistryConfig::default()
            .host("vhost1", HostConfig::new().rewrite("tv", rule));
        let opener = opener(config, Arc::clone(&starter));

        opener
            .open(
                RegistryKey::new("vhost1", "tv"),
                Options::new().media_type(MediaType::Live),
            )
            .await
            .unwrap();

        let seen = starter.seen.lock().unwrap();
        // Caller keeps its type; the rule fills in the rest
        assert_eq!(seen[0].media_type, Some(MediaType::Live));
        assert_eq!(seen[0].url.as_deref(), Some(&b"http://origin/tv"[..]));
        assert_eq!(seen[0].get("codec"), Some("h264"));
    }

    /// Matches everything but never says which type
    struct Untyped;

    #[async_trait]
    impl detect::Detector for Untyped {
        fn name(&self) -> &str {
            "untyped"
        }

        async fn detect(
            &self,
            _key: &RegistryKey,
            _options: &Options,
        ) -> std::result::Result<detect::Detection, detect::DetectError> {
            Ok(detect::Detection::Matched(Options::new().set("x", "y")))
        }
    }

    #[tokio::test]
    async fn test_untyped_match_is_undefined() {
        let starter = Arc::new(Recording::default());
        let config = RegistryConfig::default()
            .default_host(HostConfig::new().detectors(vec![Arc::new(Untyped)]));
        let opener = opener(config, Arc::clone(&starter));

        let err = opener
            .open(RegistryKey::new("vhost1", "cam"), Options::new())
            .await
            .unwrap_err();

        assert_eq!(err.not_found_cause(), Some(NotFoundCause::Undefined));
        assert_eq!(err.to_string(), "error cam");
        assert!(starter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_self_alias_hits_hop_limit() {
        let starter = Arc::new(Recording::default());
        let config = RegistryConfig::default().max_alias_hops(3).host(
            "vhost1",
            HostConfig::new().rewrite("loop", Options::new().media_type(MediaType::Alias)),
        );
        let opener = opener(config, Arc::clone(&starter));

        let err = opener
            .open(RegistryKey::new("vhost1", "loop"), Options::new())
            .await
            .unwrap_err();

        assert_eq!(err.not_found_cause(), Some(NotFoundCause::AliasLimit));
        assert_eq!(err.to_string(), "alias loop loop");
        assert!(starter.seen.lock().unwrap().is_empty());
    }
}

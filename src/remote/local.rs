//! In-process cluster
//!
//! Maps node ids to registries living in the same process. Registries are
//! held weakly, so a dropped registry simply becomes unreachable.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::{Error, NotFoundCause, Result};
use crate::handle::Handle;
use crate::options::Options;
use crate::registry::{MediaRegistry, RegistryKey, WeakRegistry};

use super::RemoteOpener;

/// Node id → registry directory for single-process deployments
#[derive(Default)]
pub struct LocalCluster {
    nodes: DashMap<String, WeakRegistry>,
}

impl LocalCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `registry` reachable as `node`
    pub fn join(&self, node: impl Into<String>, registry: &MediaRegistry) {
        let node = node.into();
        tracing::debug!(node = %node, "Node joined local cluster");
        self.nodes.insert(node, registry.downgrade());
    }

    pub fn leave(&self, node: &str) {
        self.nodes.remove(node);
    }

    fn lookup(&self, node: &str) -> Option<MediaRegistry> {
        self.nodes.get(node).and_then(|weak| weak.upgrade())
    }
}

#[async_trait]
impl RemoteOpener for LocalCluster {
    async fn ping(&self, node: &str) -> bool {
        self.lookup(node).is_some()
    }

    async fn open(&self, node: &str, host: &str, name: Bytes, options: Options) -> Result<Handle> {
        match self.lookup(node) {
            Some(registry) => registry.open(host, &name, options).await,
            None => Err(Error::not_found(
                &RegistryKey::from_bytes(host, name),
                NotFoundCause::RemoteUnreachable,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::handle::{ExitReason, HandleStarter, StartError};
    use crate::options::MediaType;
    use crate::registry::{HostConfig, RegistryConfig};

    /// Starts idle handles, optionally after a pause
    #[derive(Default)]
    struct Node {
        started: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl HandleStarter for Node {
        async fn start(
            &self,
            _key: &RegistryKey,
            _options: &Options,
        ) -> std::result::Result<Handle, StartError> {
            tokio::time::sleep(self.delay).await;
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(Handle::spawn(|mut mailbox| async move {
                while mailbox.recv().await.is_some() {}
                ExitReason::Normal
            }))
        }
    }

    fn remote_rule(node: &str) -> Options {
        Options::new().media_type(MediaType::Remote).node(node)
    }

    #[tokio::test]
    async fn test_remote_open_lands_on_origin() {
        let cluster = Arc::new(LocalCluster::new());

        let origin_node = Arc::new(Node::default());
        let origin = MediaRegistry::new(origin_node.clone());
        cluster.join("origin", &origin);

        let host = HostConfig::new()
            .rewrite("edge-cam", remote_rule("origin").url("cam1"))
            .rewrite("lost-cam", remote_rule("nowhere"));
        let edge_node = Arc::new(Node::default());
        let edge = MediaRegistry::with_remote(
            RegistryConfig::default().host("vhost1", host),
            edge_node.clone(),
            cluster.clone(),
        );

        let handle = assert_ok!(edge.open("vhost1", "edge-cam", Options::new()).await);
        assert_eq!(origin.find("vhost1", "cam1"), Some(handle));
        assert!(edge.find("vhost1", "edge-cam").is_none());
        assert_eq!(edge_node.started.load(Ordering::SeqCst), 0);
        assert_eq!(origin_node.started.load(Ordering::SeqCst), 1);

        let err = assert_err!(edge.open("vhost1", "lost-cam", Options::new()).await);
        assert_eq!(err.not_found_cause(), Some(NotFoundCause::RemoteUnreachable));

        cluster.leave("origin");
        let err = assert_err!(edge.open("vhost1", "edge-cam", Options::new()).await);
        assert_eq!(err.not_found_cause(), Some(NotFoundCause::RemoteUnreachable));
    }

    #[tokio::test]
    async fn test_dropped_registry_is_unreachable() {
        let cluster = LocalCluster::new();
        let origin = MediaRegistry::new(Arc::new(Node::default()));
        cluster.join("origin", &origin);
        assert!(cluster.ping("origin").await);

        drop(origin);
        assert!(!cluster.ping("origin").await);
        let err = assert_err!(
            cluster
                .open("origin", "vhost1", Bytes::from_static(b"cam1"), Options::new())
                .await
        );
        assert_eq!(err.to_string(), "remote node unreachable for cam1");
    }

    #[tokio::test]
    async fn test_slow_remote_times_out() {
        let cluster = Arc::new(LocalCluster::new());
        let origin = MediaRegistry::new(Arc::new(Node {
            delay: Duration::from_secs(5),
            ..Node::default()
        }));
        cluster.join("origin", &origin);

        let config = RegistryConfig::default()
            .remote_timeout(Duration::from_millis(50))
            .host("vhost1", HostConfig::new().rewrite("cam1", remote_rule("origin")));
        let edge = MediaRegistry::with_remote(config, Arc::new(Node::default()), cluster);

        let err = assert_err!(edge.open("vhost1", "cam1", Options::new()).await);
        assert_eq!(err.not_found_cause(), Some(NotFoundCause::RemoteTimeout));
        assert_eq!(err.to_string(), "remote open timed out for cam1");
    }
}

//! Cross-node delegation
//!
//! When detection says a resource lives on another node (`type = remote`),
//! the opener checks that the node is reachable and forwards the whole open
//! call to it. Both steps are bounded by the remote timeout; nothing is
//! retried.

pub mod local;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, NotFoundCause, Result};
use crate::handle::Handle;
use crate::options::Options;
use crate::registry::RegistryKey;

pub use local::LocalCluster;

/// Client used to open resources on other nodes
#[async_trait]
pub trait RemoteOpener: Send + Sync {
    /// Reachability check
    async fn ping(&self, node: &str) -> bool;

    /// Equivalent of `open(host, name, options)` executed on `node`
    async fn open(&self, node: &str, host: &str, name: Bytes, options: Options) -> Result<Handle>;
}

/// Forward an open whose resolved type is `remote`
pub(crate) async fn delegate(
    remote: Option<&dyn RemoteOpener>,
    limit: Duration,
    key: &RegistryKey,
    resolved: Options,
) -> Result<Handle> {
    let Some(node) = resolved.node.clone() else {
        tracing::warn!(stream = %key, "Remote resource has no node");
        return Err(Error::not_found(key, NotFoundCause::Undefined));
    };
    let Some(remote) = remote else {
        tracing::warn!(stream = %key, node = %node, "No remote opener configured");
        return Err(Error::not_found(key, NotFoundCause::RemoteUnreachable));
    };

    match tokio::time::timeout(limit, remote.ping(&node)).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(stream = %key, node = %node, "Remote node unreachable");
            return Err(Error::not_found(key, NotFoundCause::RemoteUnreachable));
        }
        Err(_) => {
            tracing::warn!(stream = %key, node = %node, "Remote ping timed out");
            return Err(Error::not_found(key, NotFoundCause::RemoteTimeout));
        }
    }

    let target = resolved.url.clone().unwrap_or_else(|| key.name.clone());
    let forwarded = resolved.for_remote();

    tracing::debug!(
        stream = %key,
        node = %node,
        target = %String::from_utf8_lossy(&target),
        "Delegating open to remote node"
    );

    match tokio::time::timeout(limit, remote.open(&node, &key.host, target, forwarded)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                stream = %key,
                node = %node,
                timeout_ms = limit.as_millis() as u64,
                "Remote open timed out"
            );
            Err(Error::not_found(key, NotFoundCause::RemoteTimeout))
        }
    }
}

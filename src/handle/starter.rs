//! Supervisor contract used by the opener to start new handles

use async_trait::async_trait;

use crate::options::Options;
use crate::registry::RegistryKey;

use super::actor::Handle;
use super::error::StartError;

/// Starts media actors on behalf of the registry
///
/// `options` is fully resolved: it always carries `type`, `url`, `host` and
/// `name`. The returned handle belongs to the starter; the registry only
/// references it.
#[async_trait]
pub trait HandleStarter: Send + Sync {
    async fn start(&self, key: &RegistryKey, options: &Options) -> Result<Handle, StartError>;
}

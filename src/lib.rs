//! Single-flight registry for media resources
//!
//! Given a virtual host and a resource name, the registry returns the one
//! running handle for that resource: a live stream, an opened file or a
//! proxied remote stream. The first access starts it; concurrent first
//! accesses never leave two competing handles behind.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use media_registry::{
//!     ExitReason, Handle, HandleStarter, MediaRegistry, Options, RegistryKey, StartError,
//! };
//!
//! struct Starter;
//!
//! #[async_trait]
//! impl HandleStarter for Starter {
//!     async fn start(&self, _key: &RegistryKey, _options: &Options) -> Result<Handle, StartError> {
//!         Ok(Handle::spawn(|mut mailbox| async move {
//!             while mailbox.recv().await.is_some() {}
//!             ExitReason::Normal
//!         }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> media_registry::Result<()> {
//!     let registry = MediaRegistry::new(Arc::new(Starter));
//!     let handle = registry.open("vhost1", "cam1", Options::new()).await?;
//!     assert_eq!(registry.find("vhost1", "cam1"), Some(handle));
//!     Ok(())
//! }
//! ```

pub mod detect;
pub mod error;
pub mod handle;
pub mod options;
pub mod registry;
pub mod remote;
pub mod stats;

pub use detect::{Detection, DetectError, Detector, RewriteTable};
pub use error::{Error, NotFoundCause, Result};
pub use handle::{
    ExitReason, Handle, HandleCommand, HandleId, HandleMailbox, HandleStarter, HandleStatus,
    StartError,
};
pub use options::{MediaType, Options};
pub use registry::{
    HostConfig, MediaRegistry, RegistryConfig, RegistryError, RegistryEvent, RegistryKey,
};
pub use remote::{LocalCluster, RemoteOpener};
pub use stats::{HandleStats, StatsTable, Watchdog};

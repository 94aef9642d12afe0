//! Registry error types
//!
//! Errors produced by the coordinator when mutating the table.

use crate::handle::{Handle, HandleId};

use super::key::RegistryKey;

/// Error type for registry mutations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Another handle already owns the key. Not a failure: the caller lost a
    /// creation race and should use `existing` instead.
    #[error("{key} is already registered to {}", .existing.id())]
    AlreadyRegistered { key: RegistryKey, existing: Handle },
    /// The handle had already exited when registration was processed
    #[error("handle {handle} exited before {key} could be registered")]
    HandleExited { key: RegistryKey, handle: HandleId },
    /// The coordinator task is no longer running
    #[error("registry coordinator has stopped")]
    CoordinatorClosed,
}

//! Handle error types

use super::actor::HandleId;

/// Error talking to a running handle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    /// The actor has exited and its mailbox is closed
    #[error("handle {0} is gone")]
    Gone(HandleId),
    /// The actor did not answer a query in time
    #[error("handle {0} did not reply in time")]
    Timeout(HandleId),
}

/// Error reported by a [`HandleStarter`](super::HandleStarter)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StartError(pub String);

impl StartError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

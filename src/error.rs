//! Error types for registry operations

use crate::handle::HandleError;
use crate::registry::{RegistryError, RegistryKey};

/// Why an open ended in NotFound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundCause {
    /// Every detector declined
    NoMatch,
    /// A detector matched but left `type` undefined
    Undefined,
    /// The supervisor could not start a handle
    StartFailed,
    /// Alias chain longer than the configured hop limit
    AliasLimit,
    /// Remote node did not answer the reachability check
    RemoteUnreachable,
    /// Remote ping or open exceeded the remote timeout
    RemoteTimeout,
    /// Nothing is registered under the name
    NotRunning,
}

/// Error type for caller-facing operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The resource cannot be opened; `reason` echoes the requested name
    #[error("{reason}")]
    NotFound {
        key: RegistryKey,
        cause: NotFoundCause,
        reason: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Handle(#[from] HandleError),

    /// A required option was not supplied
    #[error("missing option `{0}`")]
    MissingOption(&'static str),
}

impl Error {
    pub(crate) fn not_found(key: &RegistryKey, cause: NotFoundCause) -> Self {
        let name = key.name_lossy();
        let reason = match cause {
            NotFoundCause::NoMatch => format!("no file {}", name),
            NotFoundCause::Undefined => format!("error {}", name),
            NotFoundCause::StartFailed => format!("failed to open {}", name),
            NotFoundCause::AliasLimit => format!("alias loop {}", name),
            NotFoundCause::RemoteUnreachable => format!("remote node unreachable for {}", name),
            NotFoundCause::RemoteTimeout => format!("remote open timed out for {}", name),
            NotFoundCause::NotRunning => format!("not running {}", name),
        };
        Error::NotFound {
            key: key.clone(),
            cause,
            reason,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// NotFound cause, if this is a NotFound
    pub fn not_found_cause(&self) -> Option<NotFoundCause> {
        match self {
            Error::NotFound { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons_echo_the_name() {
        let key = RegistryKey::new("vhost1", "cam1.flv");

        assert_eq!(Error::not_found(&key, NotFoundCause::NoMatch).to_string(), "no file cam1.flv");
        assert_eq!(Error::not_found(&key, NotFoundCause::Undefined).to_string(), "error cam1.flv");
        assert_eq!(
            Error::not_found(&key, NotFoundCause::StartFailed).to_string(),
            "failed to open cam1.flv"
        );
    }

    #[test]
    fn test_cause_accessors() {
        let key = RegistryKey::new("vhost1", "x");
        let err = Error::not_found(&key, NotFoundCause::RemoteTimeout);
        assert!(err.is_not_found());
        assert_eq!(err.not_found_cause(), Some(NotFoundCause::RemoteTimeout));

        let other = Error::MissingOption("stream_id");
        assert!(!other.is_not_found());
        assert_eq!(other.to_string(), "missing option `stream_id`");
    }
}

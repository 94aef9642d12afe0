//! Type detection
//!
//! Decides how an unopened name should be realized. Detectors run in a
//! per-host order; the first one that matches wins and the chain stops.
//! Nothing is merged across detectors.
//!
//! ```text
//!   rewrite ─► http ─► rtsp ─► mpegts_file ─► file ─► live
//!      │         │       │          │           │       │
//!      └─────────┴───────┴──── first match ─────┴───────┘
//! ```

pub mod builtin;
pub mod rewrite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::options::{MediaType, Options};
use crate::registry::RegistryKey;

pub use builtin::{default_chain, FileDetector, LiveDetector, RewriteDetector, SchemeDetector};
pub use rewrite::RewriteTable;

/// Outcome of a single detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Not mine, ask the next detector
    NoMatch,
    /// Options for the resource; should carry `type`
    Matched(Options),
}

/// Detector failure. The chain treats it like [`Detection::NoMatch`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{detector}: {message}")]
pub struct DetectError {
    pub detector: String,
    pub message: String,
}

impl DetectError {
    pub fn new(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            detector: detector.into(),
            message: message.into(),
        }
    }
}

/// A pluggable type detector
#[async_trait]
pub trait Detector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn detect(&self, key: &RegistryKey, options: &Options) -> Result<Detection, DetectError>;
}

/// Run `chain` in order and return the first match
///
/// Returns `type = notfound` when every detector declines. A detector error
/// is logged and the chain moves on.
pub async fn resolve(chain: &[Arc<dyn Detector>], key: &RegistryKey, options: &Options) -> Options {
    for detector in chain {
        match detector.detect(key, options).await {
            Ok(Detection::Matched(found)) => {
                tracing::debug!(
                    stream = %key,
                    detector = detector.name(),
                    media_type = ?found.media_type,
                    "Detector matched"
                );
                return found;
            }
            Ok(Detection::NoMatch) => {}
            Err(e) => {
                tracing::warn!(
                    stream = %key,
                    detector = detector.name(),
                    error = %e,
                    "Detector failed, trying next"
                );
            }
        }
    }

    tracing::debug!(stream = %key, "No detector matched");
    Options::new().media_type(MediaType::NotFound)
}

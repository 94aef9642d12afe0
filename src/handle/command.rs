//! Messages understood by media handles and the data they reply with

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::options::Options;

/// Free-form key/value description of a handle, as returned by `info`
pub type InfoMap = BTreeMap<String, String>;

/// Why a handle's actor stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The actor finished on its own
    Normal,
    /// The actor honoured a `Shutdown` request
    Shutdown,
    /// The actor task was aborted
    Killed,
    /// The actor panicked
    Panic(String),
    /// Any other failure reported by the actor
    Other(String),
}

impl ExitReason {
    /// Clean stops are `Normal` and `Shutdown`; anything else deserves a log line
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, ExitReason::Normal | ExitReason::Shutdown)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::Shutdown => write!(f, "shutdown"),
            ExitReason::Killed => write!(f, "killed"),
            ExitReason::Panic(msg) => write!(f, "panic: {}", msg),
            ExitReason::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Consumer description passed to a handle by `play`
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    /// Message stream the consumer expects media on
    pub stream_id: u32,
    /// Client-side buffer length, if the consumer announced one
    pub client_buffer: Option<Duration>,
    /// Options the consumer passed to `play`
    pub options: Options,
}

/// Runtime status of a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleStatus {
    pub client_count: u32,
    /// Who feeds the handle (set by `create`)
    pub source: Option<String>,
    pub pending_messages: usize,
}

/// Media descriptor returned by `media_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// Live resources have no fixed duration
    pub live: bool,
    pub duration: Option<Duration>,
    /// Codec names (e.g., "h264", "aac")
    pub codecs: Vec<String>,
}

/// Message sent to a handle's mailbox
#[derive(Debug)]
pub enum HandleCommand {
    /// Start delivering media to a consumer
    Play(PlayRequest),
    /// Mark the caller as the media source
    SetSource(String),
    /// Stop the resource
    Stop,
    /// Discard the handle (used for losers of a creation race)
    Shutdown,
    Status(oneshot::Sender<HandleStatus>),
    Info(oneshot::Sender<InfoMap>),
    MediaInfo(oneshot::Sender<Option<MediaInfo>>),
}

//! Open options
//!
//! Options travel through every open request. They are built from three
//! layers with a fixed precedence: caller-supplied options win over detector
//! options, which win over the `{host, name, url}` defaults. Every key is
//! unique; merging never produces two values for one key.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;

/// How a resource name is realized
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Live stream fed by a publisher
    Live,
    /// Plain media file
    File,
    /// MPEG-TS file
    MpegTsFile,
    /// Proxied HTTP stream
    Http,
    /// Proxied RTSP stream
    Rtsp,
    /// The name is another name; `url` holds the target
    Alias,
    /// The resource lives on another node; `node` holds its id
    Remote,
    /// No detector matched
    NotFound,
    /// Anything a custom detector returns
    Custom(String),
}

impl MediaType {
    pub fn as_str(&self) -> &str {
        match self {
            MediaType::Live => "live",
            MediaType::File => "file",
            MediaType::MpegTsFile => "mpegts_file",
            MediaType::Http => "http",
            MediaType::Rtsp => "rtsp",
            MediaType::Alias => "alias",
            MediaType::Remote => "remote",
            MediaType::NotFound => "notfound",
            MediaType::Custom(s) => s,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "live" => MediaType::Live,
            "file" => MediaType::File,
            "mpegts_file" => MediaType::MpegTsFile,
            "http" => MediaType::Http,
            "rtsp" => MediaType::Rtsp,
            "alias" => MediaType::Alias,
            "remote" => MediaType::Remote,
            "notfound" => MediaType::NotFound,
            other => MediaType::Custom(other.to_string()),
        })
    }
}

/// Key-unique option set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// `type`; absent means "not decided yet" before resolution and
    /// "undefined" after it
    pub media_type: Option<MediaType>,
    pub host: Option<String>,
    pub name: Option<Bytes>,
    pub url: Option<Bytes>,
    /// Target node for `type = remote`
    pub node: Option<String>,
    /// Register by name (`true`, default) or only watch for exit
    pub public: Option<bool>,
    /// Consumer stream id for `play`
    pub stream_id: Option<u32>,
    pub client_buffer: Option<Duration>,
    /// Detector- or handle-specific keys
    pub extra: BTreeMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn url(mut self, url: impl AsRef<[u8]>) -> Self {
        self.url = Some(Bytes::copy_from_slice(url.as_ref()));
        self
    }

    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = Some(public);
        self
    }

    pub fn stream_id(mut self, stream_id: u32) -> Self {
        self.stream_id = Some(stream_id);
        self
    }

    pub fn client_buffer(mut self, buffer: Duration) -> Self {
        self.client_buffer = Some(buffer);
        self
    }

    /// Set a free-form key
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Defaults to public
    pub fn is_public(&self) -> bool {
        self.public.unwrap_or(true)
    }

    /// `url` rendered for logs and paths
    pub fn url_lossy(&self) -> Option<String> {
        self.url
            .as_ref()
            .map(|u| String::from_utf8_lossy(u).into_owned())
    }

    /// Overlay `self` on `lower`: every key set in `self` wins
    pub fn merged_over(self, lower: &Options) -> Options {
        let mut extra = lower.extra.clone();
        extra.extend(self.extra);

        Options {
            media_type: self.media_type.or_else(|| lower.media_type.clone()),
            host: self.host.or_else(|| lower.host.clone()),
            name: self.name.or_else(|| lower.name.clone()),
            url: self.url.or_else(|| lower.url.clone()),
            node: self.node.or_else(|| lower.node.clone()),
            public: self.public.or(lower.public),
            stream_id: self.stream_id.or(lower.stream_id),
            client_buffer: self.client_buffer.or(lower.client_buffer),
            extra,
        }
    }

    /// `{host, name, url = name}`, the lowest precedence layer
    pub fn defaults(host: &str, name: &Bytes) -> Options {
        Options {
            host: Some(host.to_string()),
            name: Some(name.clone()),
            url: Some(name.clone()),
            ..Options::default()
        }
    }

    /// Options carried to the next alias hop: the target re-derives its own
    /// type, identity and url
    pub(crate) fn for_next_hop(mut self) -> Options {
        self.media_type = None;
        self.url = None;
        self.name = None;
        self.host = None;
        self
    }

    /// Options forwarded to a remote node
    pub(crate) fn for_remote(mut self) -> Options {
        self.node = None;
        self.for_next_hop()
    }
}

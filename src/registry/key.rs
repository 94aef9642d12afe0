//! Registry key types
//!
//! A resource is identified by its virtual host plus an opaque byte-string
//! name. Names are unique per host only.

use std::fmt;

use bytes::Bytes;

/// Unique identifier for a media resource (host + name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryKey {
    /// Virtual host (e.g., "vhost1")
    pub host: String,
    /// Resource name (e.g., "cam1.flv"); not required to be UTF-8
    pub name: Bytes,
}

impl RegistryKey {
    /// Create a new registry key
    pub fn new(host: impl Into<String>, name: impl AsRef<[u8]>) -> Self {
        Self {
            host: host.into(),
            name: Bytes::copy_from_slice(name.as_ref()),
        }
    }

    /// Create a key from an already shared name
    pub fn from_bytes(host: impl Into<String>, name: Bytes) -> Self {
        Self {
            host: host.into(),
            name,
        }
    }

    /// Name rendered for logs and error reasons
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, String::from_utf8_lossy(&self.name))
    }
}

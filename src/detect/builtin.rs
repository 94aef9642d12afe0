//! Built-in detectors
//!
//! The default chain is: rewrite, http, rtsp, mpegts_file, file, live.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::options::{MediaType, Options};
use crate::registry::RegistryKey;

use super::rewrite::RewriteTable;
use super::{DetectError, Detection, Detector};

/// Build the default detector chain for a host
pub fn default_chain(rewrites: &RewriteTable, file_root: Option<&Path>) -> Vec<Arc<dyn Detector>> {
    let root = file_root.map(Path::to_path_buf);
    vec![
        Arc::new(RewriteDetector::new(rewrites.clone())),
        Arc::new(SchemeDetector::http()),
        Arc::new(SchemeDetector::rtsp()),
        Arc::new(FileDetector::mpegts(root.clone())),
        Arc::new(FileDetector::plain(root)),
        Arc::new(LiveDetector),
    ]
}

/// Looks the literal name up in the host's rewrite table
#[derive(Debug, Clone)]
pub struct RewriteDetector {
    table: RewriteTable,
}

impl RewriteDetector {
    pub fn new(table: RewriteTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Detector for RewriteDetector {
    fn name(&self) -> &str {
        "rewrite"
    }

    async fn detect(&self, key: &RegistryKey, _options: &Options) -> Result<Detection, DetectError> {
        Ok(match self.table.get(&key.name) {
            Some(rule) => Detection::Matched(rule.clone()),
            None => Detection::NoMatch,
        })
    }
}

/// Matches names that are URLs with a known scheme
#[derive(Debug, Clone)]
pub struct SchemeDetector {
    name: &'static str,
    prefixes: &'static [&'static str],
    media_type: MediaType,
}

impl SchemeDetector {
    pub fn http() -> Self {
        Self {
            name: "http",
            prefixes: &["http://", "https://"],
            media_type: MediaType::Http,
        }
    }

    pub fn rtsp() -> Self {
        Self {
            name: "rtsp",
            prefixes: &["rtsp://"],
            media_type: MediaType::Rtsp,
        }
    }
}

#[async_trait]
impl Detector for SchemeDetector {
    fn name(&self) -> &str {
        self.name
    }

    async fn detect(&self, key: &RegistryKey, _options: &Options) -> Result<Detection, DetectError> {
        let matched = self
            .prefixes
            .iter()
            .any(|prefix| key.name.starts_with(prefix.as_bytes()));

        Ok(if matched {
            Detection::Matched(
                Options::new()
                    .media_type(self.media_type.clone())
                    .url(&key.name),
            )
        } else {
            Detection::NoMatch
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Plain,
    MpegTs,
}

/// Matches regular files below a root directory
#[derive(Debug, Clone)]
pub struct FileDetector {
    root: Option<PathBuf>,
    kind: FileKind,
}

impl FileDetector {
    /// Any regular file
    pub fn plain(root: Option<PathBuf>) -> Self {
        Self {
            root,
            kind: FileKind::Plain,
        }
    }

    /// `.ts` files only
    pub fn mpegts(root: Option<PathBuf>) -> Self {
        Self {
            root,
            kind: FileKind::MpegTs,
        }
    }

    /// Path below `root`, refusing names that would escape it
    fn local_path(root: &Path, name: &[u8]) -> Option<PathBuf> {
        let name = std::str::from_utf8(name).ok()?;
        let relative = Path::new(name);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || !safe {
            return None;
        }
        Some(root.join(relative))
    }
}

#[async_trait]
impl Detector for FileDetector {
    fn name(&self) -> &str {
        match self.kind {
            FileKind::Plain => "file",
            FileKind::MpegTs => "mpegts_file",
        }
    }

    async fn detect(&self, key: &RegistryKey, _options: &Options) -> Result<Detection, DetectError> {
        let Some(root) = self.root.as_deref() else {
            return Ok(Detection::NoMatch);
        };
        if self.kind == FileKind::MpegTs && !key.name.ends_with(b".ts") {
            return Ok(Detection::NoMatch);
        }
        let Some(path) = Self::local_path(root, &key.name) else {
            return Ok(Detection::NoMatch);
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let media_type = match self.kind {
                    FileKind::Plain => MediaType::File,
                    FileKind::MpegTs => MediaType::MpegTsFile,
                };
                Ok(Detection::Matched(
                    Options::new()
                        .media_type(media_type)
                        .url(path.to_string_lossy().as_bytes()),
                ))
            }
            Ok(_) => Ok(Detection::NoMatch),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Detection::NoMatch),
            Err(e) => Err(DetectError::new(self.name(), format!("{}: {}", path.display(), e))),
        }
    }
}

/// Placeholder for live streams; matches every name
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveDetector;

#[async_trait]
impl Detector for LiveDetector {
    fn name(&self) -> &str {
        "live"
    }

    async fn detect(&self, _key: &RegistryKey, _options: &Options) -> Result<Detection, DetectError> {
        Ok(Detection::Matched(Options::new().media_type(MediaType::Live)))
    }
}

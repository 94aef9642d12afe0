//! Static per-host rewrite rules
//!
//! Maps a literal resource name to the options it should open with. Used
//! both by the `rewrite` detector and as an override when the caller already
//! fixed `type`.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::options::Options;

/// Immutable, cheaply shared rewrite table
#[derive(Debug, Clone, Default)]
pub struct RewriteTable {
    rules: Arc<HashMap<Bytes, Options>>,
}

impl RewriteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for `name`
    pub fn insert(&mut self, name: impl AsRef<[u8]>, options: Options) {
        Arc::make_mut(&mut self.rules).insert(Bytes::copy_from_slice(name.as_ref()), options);
    }

    pub fn get(&self, name: &[u8]) -> Option<&Options> {
        self.rules.get(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MediaType;

    #[test]
    fn test_clones_share_rules_until_modified() {
        let mut table = RewriteTable::new();
        table.insert("tv1", Options::new().media_type(MediaType::Http).url("http://origin/tv1"));

        let snapshot = table.clone();
        table.insert("tv2", Options::new().media_type(MediaType::Rtsp));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(b"tv1").and_then(|o| o.media_type.clone()),
            Some(MediaType::Http)
        );
        assert!(table.get(b"tv3").is_none());
    }
}

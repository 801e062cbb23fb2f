//! # Storage Backends
//!
//! Where a topic map lives between process runs.
//!
//! Two backends share the [`TopicMapStore`] trait: a flat file holding one
//! framed snapshot, and a redb embedded database with one row per
//! construct. Both store only authoritative state; identity and index
//! data are rebuilt on load.

use crate::formats::{topic_map_from_bytes, topic_map_to_bytes};
use crate::graph::TopicMap;
use crate::types::TopicMapError;
use std::path::{Path, PathBuf};

pub mod redb_store;

pub use redb_store::RedbStore;

/// A place a whole topic map can be saved to and loaded from.
pub trait TopicMapStore {
    /// Load the stored map, rebuilding derived state.
    fn load(&mut self) -> Result<TopicMap, TopicMapError>;

    /// Persist the map, replacing whatever was stored before.
    fn save(&mut self, map: &TopicMap) -> Result<(), TopicMapError>;
}

// =============================================================================
// FILE STORE
// =============================================================================

/// Stores the map as a single framed snapshot file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for the given path. Nothing is touched until the
    /// first `load` or `save`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TopicMapStore for FileStore {
    fn load(&mut self) -> Result<TopicMap, TopicMapError> {
        let bytes = std::fs::read(&self.path).map_err(|e| TopicMapError::Io(e.to_string()))?;
        topic_map_from_bytes(&bytes)
    }

    fn save(&mut self, map: &TopicMap) -> Result<(), TopicMapError> {
        let bytes = topic_map_to_bytes(map)?;
        std::fs::write(&self.path, bytes).map_err(|e| TopicMapError::Io(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConstructOps, TopicMapView};
    use crate::identity::IdentityOps;
    use crate::types::Locator;
    use tempfile::tempdir;

    #[test]
    fn file_store_roundtrip() {
        let temp = tempdir().expect("temp dir");
        let mut store = FileStore::new(temp.path().join("map.tmap"));

        let mut map = TopicMap::new();
        let si = Locator::new("http://ex/alice");
        let alice = map.ensure_topic_by_subject_identifier(si.clone()).expect("ensure topic by subject identifier");
        store.save(&map).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.topic_by_subject_identifier(&si), Some(alice));
    }

    #[test]
    fn file_store_missing_file_reports_io() {
        let temp = tempdir().expect("temp dir");
        let mut store = FileStore::new(temp.path().join("absent.tmap"));
        assert!(matches!(store.load(), Err(TopicMapError::Io(_))));
    }

    #[test]
    fn file_store_save_overwrites() {
        let temp = tempdir().expect("temp dir");
        let mut store = FileStore::new(temp.path().join("map.tmap"));

        let mut map = TopicMap::new();
        let a = map.create_topic();
        store.save(&map).expect("save");
        map.remove_topic(a).expect("remove topic");
        store.save(&map).expect("save again");

        let loaded = store.load().expect("load");
        assert!(!loaded.is_live(a));
    }
}

//! # redb-backed Topic Map Storage
//!
//! A disk-backed store using the redb embedded database, providing ACID
//! writes and crash safety without configuration.
//!
//! One row per construct (postcard-encoded), plus tables for retired ids,
//! interned scopes, and watermark metadata. `save` replaces the stored
//! state wholesale inside a single write transaction, so a crash mid-save
//! leaves the previous state intact. Derived registries are rebuilt on
//! `load`, never stored.

use crate::formats::TopicMapSnapshot;
use crate::graph::TopicMap;
use crate::storage::TopicMapStore;
use crate::types::{Construct, ConstructId, ScopeId, TopicMapError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for constructs: ConstructId(u64) -> serialized Construct bytes.
const CONSTRUCTS: TableDefinition<u64, &[u8]> = TableDefinition::new("constructs");

/// Table for retired ids: ConstructId(u64) -> ().
const RETIRED: TableDefinition<u64, ()> = TableDefinition::new("retired");

/// Table for interned scopes: ScopeId(u64) -> serialized theme-id list.
const SCOPES: TableDefinition<u64, &[u8]> = TableDefinition::new("scopes");

/// Table for metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// A disk-backed topic map store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TopicMapError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| TopicMapError::Io(e.to_string()))?;

        // Initialize tables if they don't exist.
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(CONSTRUCTS)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(RETIRED)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(SCOPES)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(METADATA)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), TopicMapError> {
        self.db
            .compact()
            .map_err(|e| TopicMapError::Io(e.to_string()))?;
        Ok(())
    }
}

impl TopicMapStore for RedbStore {
    /// Load the stored map. A store that has never been saved to loads as
    /// a fresh empty map.
    fn load(&mut self) -> Result<TopicMap, TopicMapError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| TopicMapError::Io(e.to_string()))?;

        let meta_table = read_txn
            .open_table(METADATA)
            .map_err(|e| TopicMapError::Io(e.to_string()))?;
        let map_id = meta_table
            .get("map_id")
            .map_err(|e| TopicMapError::Io(e.to_string()))?
            .map(|v| v.value());
        let Some(map_id) = map_id else {
            return Ok(TopicMap::new());
        };
        let next_id = meta_table
            .get("next_id")
            .map_err(|e| TopicMapError::Io(e.to_string()))?
            .map(|v| v.value())
            .unwrap_or(0);
        let auto_merge = meta_table
            .get("auto_merge")
            .map_err(|e| TopicMapError::Io(e.to_string()))?
            .map(|v| v.value() != 0)
            .unwrap_or(true);

        let constructs_table = read_txn
            .open_table(CONSTRUCTS)
            .map_err(|e| TopicMapError::Io(e.to_string()))?;
        let mut constructs = Vec::new();
        for entry in constructs_table
            .iter()
            .map_err(|e| TopicMapError::Io(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| TopicMapError::Io(e.to_string()))?;
            let construct: Construct = postcard::from_bytes(value.value())
                .map_err(|e| TopicMapError::Serialization(e.to_string()))?;
            constructs.push((ConstructId(key.value()), construct));
        }

        let retired_table = read_txn
            .open_table(RETIRED)
            .map_err(|e| TopicMapError::Io(e.to_string()))?;
        let mut retired = Vec::new();
        for entry in retired_table
            .iter()
            .map_err(|e| TopicMapError::Io(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| TopicMapError::Io(e.to_string()))?;
            retired.push(ConstructId(key.value()));
        }

        let scopes_table = read_txn
            .open_table(SCOPES)
            .map_err(|e| TopicMapError::Io(e.to_string()))?;
        let mut scopes = Vec::new();
        for entry in scopes_table
            .iter()
            .map_err(|e| TopicMapError::Io(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| TopicMapError::Io(e.to_string()))?;
            let themes: Vec<ConstructId> = postcard::from_bytes(value.value())
                .map_err(|e| TopicMapError::Serialization(e.to_string()))?;
            scopes.push((ScopeId(key.value()), themes));
        }

        TopicMapSnapshot {
            constructs,
            retired,
            scopes,
            next_id,
            map_id: ConstructId(map_id),
            auto_merge,
        }
        .restore()
    }

    /// Replace the stored state with the given map in one transaction.
    fn save(&mut self, map: &TopicMap) -> Result<(), TopicMapError> {
        let snapshot = TopicMapSnapshot::capture(map);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| TopicMapError::Io(e.to_string()))?;
        {
            // Wholesale replacement: drop and recreate each table.
            for table in [CONSTRUCTS, SCOPES] {
                let _ = write_txn
                    .delete_table(table)
                    .map_err(|e| TopicMapError::Io(e.to_string()))?;
            }
            let _ = write_txn
                .delete_table(RETIRED)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;

            let mut constructs_table = write_txn
                .open_table(CONSTRUCTS)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            for (id, construct) in &snapshot.constructs {
                let bytes = postcard::to_stdvec(construct)
                    .map_err(|e| TopicMapError::Serialization(e.to_string()))?;
                constructs_table
                    .insert(id.0, bytes.as_slice())
                    .map_err(|e| TopicMapError::Io(e.to_string()))?;
            }

            let mut retired_table = write_txn
                .open_table(RETIRED)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            for id in &snapshot.retired {
                retired_table
                    .insert(id.0, ())
                    .map_err(|e| TopicMapError::Io(e.to_string()))?;
            }

            let mut scopes_table = write_txn
                .open_table(SCOPES)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            for (scope, themes) in &snapshot.scopes {
                let bytes = postcard::to_stdvec(themes)
                    .map_err(|e| TopicMapError::Serialization(e.to_string()))?;
                scopes_table
                    .insert(scope.0, bytes.as_slice())
                    .map_err(|e| TopicMapError::Io(e.to_string()))?;
            }

            let mut meta_table = write_txn
                .open_table(METADATA)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            meta_table
                .insert("next_id", snapshot.next_id)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            meta_table
                .insert("map_id", snapshot.map_id.0)
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
            meta_table
                .insert("auto_merge", u64::from(snapshot.auto_merge))
                .map_err(|e| TopicMapError::Io(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| TopicMapError::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::graph::{ConstructOps, TopicMapView};
    use crate::identity::IdentityOps;
    use crate::index::IndexOps;
    use crate::types::Locator;
    use tempfile::tempdir;

    #[test]
    fn fresh_store_loads_an_empty_map() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("map.redb")).expect("open db");
        let map = store.load().expect("load");
        assert!(map.topics().is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("map.redb");
        let mut store = RedbStore::open(&db_path).expect("open db");

        let mut map = TopicMap::new();
        let person = map
            .ensure_topic_by_subject_identifier(Locator::new("http://ex/person"))
            .unwrap();
        let alice = map
            .ensure_topic_by_subject_identifier(Locator::new("http://ex/alice"))
            .unwrap();
        map.add_topic_type(alice, person).unwrap();
        store.save(&map).expect("save");

        let loaded = store.load().expect("load");
        let person_loaded = loaded
            .topic_by_subject_identifier(&Locator::new("http://ex/person"))
            .expect("person");
        assert_eq!(loaded.topics_by_type(person_loaded), vec![alice]);
    }

    #[test]
    fn persistence_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("map.redb");

        // Create and populate.
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let mut map = TopicMap::new();
            map.ensure_topic_by_subject_identifier(Locator::new("http://ex/alice"))
                .unwrap();
            store.save(&map).expect("save");
        }

        // Reopen and verify.
        {
            let mut store = RedbStore::open(&db_path).expect("reopen db");
            let map = store.load().expect("load");
            assert!(
                map.topic_by_subject_identifier(&Locator::new("http://ex/alice"))
                    .is_some()
            );
        }
    }

    #[test]
    fn save_replaces_previous_state() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("map.redb")).expect("open db");

        let mut map = TopicMap::new();
        let doomed = map.create_topic();
        store.save(&map).expect("save");

        map.remove_topic(doomed).unwrap();
        store.save(&map).expect("save again");

        let loaded = store.load().expect("load");
        assert!(!loaded.is_live(doomed));
        // Retired ids survive the storage cycle.
        assert!(matches!(
            loaded.construct(doomed),
            Err(TopicMapError::ConstructRemoved(_))
        ));
    }

    #[test]
    fn watermark_survives_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("map.redb");
        let last;
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let mut map = TopicMap::new();
            map.create_topic();
            last = map.create_topic();
            store.save(&map).expect("save");
        }
        {
            let mut store = RedbStore::open(&db_path).expect("reopen db");
            let mut map = store.load().expect("load");
            let fresh = map.create_topic();
            assert!(fresh.0 > last.0);
        }
    }
}

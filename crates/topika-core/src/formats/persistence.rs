//! # Persistence Format
//!
//! Framed binary snapshots of a whole topic map.
//!
//! Layout: 4 magic bytes, 1 version byte, then a postcard-encoded
//! [`TopicMapSnapshot`]. Only the authoritative state is stored (the
//! construct arena, the retired-id set, the scope table, and the
//! watermarks); the identity registry and every index are derived data
//! and are rebuilt on restore, so a snapshot can never smuggle in an
//! inconsistent index.
//!
//! The payload size is checked against
//! [`MAX_PERSISTENCE_PAYLOAD_SIZE`] before deserialization.

use crate::graph::TopicMap;
use crate::identity::IdentityRegistry;
use crate::index::{IndexManager, IndexOps};
use crate::scope::ScopeRegistry;
use crate::types::{Construct, ConstructId, ScopeId, TopicMapError};
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_PERSISTENCE_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};

/// Header length: magic bytes plus version byte.
const HEADER_LEN: usize = MAGIC_BYTES.len() + 1;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// The authoritative state of a topic map, ready for serialization.
///
/// Also usable as a JSON interchange record: every field serializes with
/// plain serde derives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMapSnapshot {
    pub constructs: Vec<(ConstructId, Construct)>,
    pub retired: Vec<ConstructId>,
    pub scopes: Vec<(ScopeId, Vec<ConstructId>)>,
    pub next_id: u64,
    pub map_id: ConstructId,
    pub auto_merge: bool,
}

impl TopicMapSnapshot {
    /// Capture the authoritative state of a map.
    #[must_use]
    pub fn capture(map: &TopicMap) -> Self {
        Self {
            constructs: map
                .constructs
                .iter()
                .map(|(&id, c)| (id, c.clone()))
                .collect(),
            retired: map.retired.iter().copied().collect(),
            scopes: map.scopes.entries(),
            next_id: map.next_id,
            map_id: map.map_id,
            auto_merge: map.auto_merge,
        }
    }

    /// Rebuild a live map: load the arena, then derive the identity
    /// registry and the indexes from it. The id watermark is clamped
    /// above every id the snapshot mentions, so a tampered watermark can
    /// never cause id reuse.
    pub fn restore(self) -> Result<TopicMap, TopicMapError> {
        let mut watermark = self.next_id;
        for (id, _) in &self.constructs {
            watermark = watermark.max(id.0 + 1);
        }
        for id in &self.retired {
            watermark = watermark.max(id.0 + 1);
        }
        let mut map = TopicMap {
            constructs: self.constructs.into_iter().collect(),
            retired: self.retired.into_iter().collect(),
            next_id: watermark,
            identity: IdentityRegistry::new(),
            scopes: ScopeRegistry::from_entries(self.scopes),
            index: IndexManager::new(),
            auto_merge: self.auto_merge,
            map_id: self.map_id,
        };
        map.reindex()?;
        Ok(map)
    }
}

// =============================================================================
// FRAMED ENCODING
// =============================================================================

/// Serialize a map into the framed binary format.
pub fn topic_map_to_bytes(map: &TopicMap) -> Result<Vec<u8>, TopicMapError> {
    let snapshot = TopicMapSnapshot::capture(map);
    let payload = postcard::to_stdvec(&snapshot)
        .map_err(|e| TopicMapError::Serialization(e.to_string()))?;
    if payload.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(TopicMapError::Serialization(format!(
            "payload size {} exceeds maximum {}",
            payload.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC_BYTES);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a map from the framed binary format.
pub fn topic_map_from_bytes(bytes: &[u8]) -> Result<TopicMap, TopicMapError> {
    if bytes.len() < HEADER_LEN {
        return Err(TopicMapError::Serialization(
            "truncated header".to_string(),
        ));
    }
    if &bytes[..MAGIC_BYTES.len()] != MAGIC_BYTES {
        return Err(TopicMapError::Serialization(
            "bad magic bytes".to_string(),
        ));
    }
    let version = bytes[MAGIC_BYTES.len()];
    if version != FORMAT_VERSION {
        return Err(TopicMapError::Serialization(format!(
            "unsupported format version {version}, expected {FORMAT_VERSION}"
        )));
    }
    let payload = &bytes[HEADER_LEN..];
    if payload.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(TopicMapError::Serialization(format!(
            "payload size {} exceeds maximum {}",
            payload.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }
    let snapshot: TopicMapSnapshot = postcard::from_bytes(payload)
        .map_err(|e| TopicMapError::Serialization(e.to_string()))?;
    snapshot.restore()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConstructOps, TopicMapView};
    use crate::identity::IdentityOps;
    use crate::types::{ConstructKind, Locator};

    fn sample_map() -> TopicMap {
        let mut map = TopicMap::new();
        let person = map
            .ensure_topic_by_subject_identifier(Locator::new("http://ex/person"))
            .expect("ensure topic by subject identifier");
        let alice = map
            .ensure_topic_by_subject_identifier(Locator::new("http://ex/alice"))
            .expect("ensure topic by subject identifier");
        map.add_topic_type(alice, person).expect("add topic type");
        let ntype = map.create_topic();
        let theme = map.create_topic();
        map.create_name(alice, ntype, "Alice", &[theme]).expect("create name");
        map.create_occurrence(alice, person, "1984", None, &[])
            .expect("create occurrence");
        map
    }

    #[test]
    fn roundtrip_preserves_state_and_rebuilds_indexes() {
        let map = sample_map();
        let bytes = topic_map_to_bytes(&map).expect("topic map to bytes");
        let restored = topic_map_from_bytes(&bytes).expect("topic map from bytes");

        assert_eq!(restored.live_ids(), map.live_ids());
        let alice = restored
            .topic_by_subject_identifier(&Locator::new("http://ex/alice"))
            .expect("topic by subject identifier");
        let person = restored
            .topic_by_subject_identifier(&Locator::new("http://ex/person"))
            .expect("topic by subject identifier");
        assert_eq!(restored.topics_by_type(person), vec![alice]);
        assert_eq!(
            restored.number_of_constructs_by_type(ConstructKind::Occurrence, person),
            1
        );
    }

    #[test]
    fn retired_ids_stay_retired_after_restore() {
        let mut map = sample_map();
        let doomed = map.create_topic();
        map.remove_topic(doomed).expect("remove topic");
        let bytes = topic_map_to_bytes(&map).expect("topic map to bytes");
        let mut restored = topic_map_from_bytes(&bytes).expect("topic map from bytes");

        assert!(matches!(
            restored.construct(doomed),
            Err(TopicMapError::ConstructRemoved(_))
        ));
        // The watermark sits above the retired id.
        let fresh = restored.create_topic();
        assert!(fresh.0 > doomed.0);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let map = TopicMap::new();
        let mut bytes = topic_map_to_bytes(&map).expect("topic map to bytes");
        bytes[0] = b'X';
        assert!(matches!(
            topic_map_from_bytes(&bytes),
            Err(TopicMapError::Serialization(_))
        ));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let map = TopicMap::new();
        let mut bytes = topic_map_to_bytes(&map).expect("topic map to bytes");
        bytes[4] = FORMAT_VERSION + 1;
        let err = topic_map_from_bytes(&bytes).expect_err("topic map from bytes should fail");
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(matches!(
            topic_map_from_bytes(b"TM"),
            Err(TopicMapError::Serialization(_))
        ));
    }

    #[test]
    fn scope_interning_survives_roundtrip() {
        let map = sample_map();
        let bytes = topic_map_to_bytes(&map).expect("topic map to bytes");
        let mut restored = topic_map_from_bytes(&bytes).expect("topic map from bytes");

        let alice = restored
            .topic_by_subject_identifier(&Locator::new("http://ex/alice"))
            .expect("topic by subject identifier");
        let name = restored.names_of(alice).expect("names of")[0];
        let scope = restored.construct(name).expect("construct").scope().expect("scope");
        let themes = restored.scope_registry().themes(scope);
        // Re-interning the same theme set resolves to the same scope id.
        let reinterned = restored.scope_registry_mut().intern(&themes);
        assert_eq!(reinterned, scope);
    }
}

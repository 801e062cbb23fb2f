//! # Transactions
//!
//! Copy-on-write transactions over a [`TopicMap`].
//!
//! A transaction borrows the map exclusively, so at most one can be open
//! per map and the borrow checker enforces it at compile time. Reads fall
//! through to the base map; the first write to a construct clones it into
//! the shadow overlay, and fresh constructs are allocated above the base
//! id watermark. The derived registries (identity, scopes, indexes) are
//! cloned at begin and mutated privately.
//!
//! `commit` applies the overlay and the cloned registries back onto the
//! base in one step; `rollback` discards them. Both move the transaction
//! into an absorbing terminal state: any later arena access fails with
//! [`TopicMapError::TransactionClosed`].

use crate::graph::{TopicMap, TopicMapView};
use crate::identity::IdentityRegistry;
use crate::index::IndexManager;
use crate::scope::ScopeRegistry;
use crate::types::{Construct, ConstructId, TopicMapError, TransactionState};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TRANSACTION
// =============================================================================

/// An open unit of work against one topic map.
#[derive(Debug)]
pub struct Transaction<'a> {
    base: &'a mut TopicMap,
    /// Constructs written (or created) inside this transaction.
    shadow: BTreeMap<ConstructId, Construct>,
    /// Ids retired inside this transaction.
    removed: BTreeSet<ConstructId>,
    next_id: u64,
    identity: IdentityRegistry,
    scopes: ScopeRegistry,
    index: IndexManager,
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(base: &'a mut TopicMap) -> Self {
        let next_id = base.next_id;
        let identity = base.identity.clone();
        let scopes = base.scopes.clone();
        let index = base.index.clone();
        Self {
            base,
            shadow: BTreeMap::new(),
            removed: BTreeSet::new(),
            next_id,
            identity,
            scopes,
            index,
            state: TransactionState::Open,
        }
    }

    /// Current life-cycle state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Apply every buffered change to the base map.
    ///
    /// The application itself cannot fail: all validation already happened
    /// when the operations ran against the overlay.
    pub fn commit(&mut self) -> Result<(), TopicMapError> {
        if self.state != TransactionState::Open {
            return Err(TopicMapError::TransactionClosed(self.state));
        }
        for id in std::mem::take(&mut self.removed) {
            self.base.constructs.remove(&id);
            self.base.retired.insert(id);
        }
        for (id, construct) in std::mem::take(&mut self.shadow) {
            self.base.constructs.insert(id, construct);
        }
        self.base.next_id = self.next_id;
        self.base.identity = std::mem::take(&mut self.identity);
        self.base.scopes = std::mem::replace(&mut self.scopes, ScopeRegistry::new());
        self.base.index = std::mem::take(&mut self.index);
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Discard every buffered change, leaving the base map untouched.
    pub fn rollback(&mut self) -> Result<(), TopicMapError> {
        if self.state != TransactionState::Open {
            return Err(TopicMapError::TransactionClosed(self.state));
        }
        self.shadow.clear();
        self.removed.clear();
        self.state = TransactionState::RolledBack;
        Ok(())
    }
}

impl TopicMapView for Transaction<'_> {
    fn construct(&self, id: ConstructId) -> Result<&Construct, TopicMapError> {
        if self.state != TransactionState::Open {
            return Err(TopicMapError::TransactionClosed(self.state));
        }
        if self.removed.contains(&id) {
            return Err(TopicMapError::ConstructRemoved(id));
        }
        if let Some(construct) = self.shadow.get(&id) {
            return Ok(construct);
        }
        self.base
            .constructs
            .get(&id)
            .ok_or(TopicMapError::ConstructRemoved(id))
    }

    fn construct_opt(&self, id: ConstructId) -> Option<&Construct> {
        if self.state != TransactionState::Open || self.removed.contains(&id) {
            return None;
        }
        self.shadow.get(&id).or_else(|| self.base.constructs.get(&id))
    }

    fn construct_mut(&mut self, id: ConstructId) -> Result<&mut Construct, TopicMapError> {
        if self.state != TransactionState::Open {
            return Err(TopicMapError::TransactionClosed(self.state));
        }
        if self.removed.contains(&id) {
            return Err(TopicMapError::ConstructRemoved(id));
        }
        if !self.shadow.contains_key(&id) {
            let cloned = self
                .base
                .constructs
                .get(&id)
                .cloned()
                .ok_or(TopicMapError::ConstructRemoved(id))?;
            self.shadow.insert(id, cloned);
        }
        self.shadow
            .get_mut(&id)
            .ok_or(TopicMapError::ConstructRemoved(id))
    }

    fn insert_construct(&mut self, construct: Construct) -> ConstructId {
        let id = ConstructId(self.next_id);
        self.next_id += 1;
        self.shadow.insert(id, construct);
        id
    }

    fn retire_construct(&mut self, id: ConstructId) {
        let live = self.shadow.remove(&id).is_some() || self.base.constructs.contains_key(&id);
        if live {
            self.removed.insert(id);
        }
    }

    fn is_live(&self, id: ConstructId) -> bool {
        if self.removed.contains(&id) {
            return false;
        }
        self.shadow.contains_key(&id) || self.base.constructs.contains_key(&id)
    }

    fn live_ids(&self) -> Vec<ConstructId> {
        let mut ids: BTreeSet<ConstructId> = self.base.constructs.keys().copied().collect();
        ids.extend(self.shadow.keys().copied());
        ids.into_iter()
            .filter(|id| !self.removed.contains(id))
            .collect()
    }

    fn identity(&self) -> &IdentityRegistry {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut IdentityRegistry {
        &mut self.identity
    }

    fn scope_registry(&self) -> &ScopeRegistry {
        &self.scopes
    }

    fn scope_registry_mut(&mut self) -> &mut ScopeRegistry {
        &mut self.scopes
    }

    fn index(&self) -> &IndexManager {
        &self.index
    }

    fn index_mut(&mut self) -> &mut IndexManager {
        &mut self.index
    }

    fn auto_merge_enabled(&self) -> bool {
        self.base.auto_merge
    }

    fn map_id(&self) -> ConstructId {
        self.base.map_id
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConstructOps;
    use crate::identity::IdentityOps;
    use crate::types::Locator;

    #[test]
    fn commit_applies_changes_to_base() {
        let mut map = TopicMap::new();
        let si = Locator::new("http://ex/person");
        let topic;
        {
            let mut tx = map.begin();
            topic = tx.create_topic();
            tx.add_subject_identifier(topic, si.clone()).expect("add subject identifier");
            tx.commit().expect("commit");
        }
        assert!(map.is_live(topic));
        assert_eq!(map.topic_by_subject_identifier(&si), Some(topic));
    }

    #[test]
    fn rollback_discards_changes() {
        let mut map = TopicMap::new();
        let existing = map.create_topic();
        let si = Locator::new("http://ex/person");
        {
            let mut tx = map.begin();
            let topic = tx.create_topic();
            tx.add_subject_identifier(topic, si.clone()).expect("add subject identifier");
            tx.remove_topic(existing).expect("remove topic");
            tx.rollback().expect("rollback");
        }
        assert!(map.is_live(existing));
        assert_eq!(map.topic_by_subject_identifier(&si), None);
        // The rolled-back creation is invisible.
        assert_eq!(map.topics(), vec![existing]);
    }

    #[test]
    fn base_is_unchanged_while_open() {
        let mut map = TopicMap::new();
        let existing = map.create_topic();
        let mut tx = map.begin();
        tx.remove_topic(existing).expect("remove topic");
        // Inside the transaction the topic is gone.
        assert!(!tx.is_live(existing));
        tx.rollback().expect("rollback");
        assert!(map.is_live(existing));
    }

    #[test]
    fn closed_transaction_rejects_operations() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let mut tx = map.begin();
        tx.commit().expect("commit");
        assert!(matches!(
            tx.construct(topic),
            Err(TopicMapError::TransactionClosed(TransactionState::Committed))
        ));
        assert!(matches!(
            tx.commit(),
            Err(TopicMapError::TransactionClosed(_))
        ));
        assert!(matches!(
            tx.rollback(),
            Err(TopicMapError::TransactionClosed(_))
        ));
    }

    #[test]
    fn writes_are_copy_on_write() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let mut tx = map.begin();
        let name = tx.create_name(topic, ntype, "draft", &[]).expect("create name");
        assert!(tx.is_live(name));
        tx.rollback().expect("rollback");
        // The parent topic in the base never saw the name.
        assert!(map.names_of(topic).expect("names of").is_empty());
    }

    #[test]
    fn rolled_back_ids_are_reallocated() {
        let mut map = TopicMap::new();
        let reserved;
        {
            let mut tx = map.begin();
            reserved = tx.create_topic();
            tx.rollback().expect("rollback");
        }
        // The watermark was not advanced, so the id is reallocated fresh.
        let next = map.create_topic();
        assert_eq!(reserved, next);
        assert!(map.is_live(next));
    }

    #[test]
    fn merge_inside_transaction_commits_atomically() {
        use crate::merge::MergeOps;
        let mut map = TopicMap::new();
        map.set_auto_merge(false);
        let a = map.create_topic();
        let b = map.create_topic();
        let si = Locator::new("http://ex/shared");
        map.add_subject_identifier(a, si.clone()).expect("add subject identifier");
        {
            let mut tx = map.begin();
            tx.merge_in(b, a).expect("merge in");
            assert!(!tx.is_live(a));
            tx.commit().expect("commit");
        }
        assert!(!map.is_live(a));
        assert_eq!(map.topic_by_subject_identifier(&si), Some(b));
    }
}

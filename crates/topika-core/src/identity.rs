//! # Identity Registry
//!
//! Owns the three identifier namespaces and collision detection.
//!
//! - item identifiers are unique across *all* constructs of a topic map;
//! - subject identifiers and subject locators are unique across *topics*;
//! - a topic's subject identifier colliding with another *topic's* item
//!   identifier (or the reverse) is a topic-vs-topic identity signal.
//!
//! Collisions on the topic namespaces either surface as
//! [`TopicMapError::IdentityConstraint`] or, when automatic merging is
//! enabled on the map, are resolved by the merge engine with the topic
//! *receiving* the identifier as the survivor.

use crate::graph::TopicMapView;
use crate::merge::MergeOps;
use crate::primitives::MAX_LOCATOR_LENGTH;
use crate::types::{ConstructId, IdentifierKind, Locator, TopicMapError};
use std::collections::BTreeMap;

// =============================================================================
// IDENTITY REGISTRY
// =============================================================================

/// Locator -> construct-id maps, one per namespace.
///
/// Lookups are single map probes, never scans. The registry stores ids,
/// not references, so merges rewrite entries without lifetime problems.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    item_identifiers: BTreeMap<Locator, ConstructId>,
    subject_identifiers: BTreeMap<Locator, ConstructId>,
    subject_locators: BTreeMap<Locator, ConstructId>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace(&self, kind: IdentifierKind) -> &BTreeMap<Locator, ConstructId> {
        match kind {
            IdentifierKind::Item => &self.item_identifiers,
            IdentifierKind::Subject => &self.subject_identifiers,
            IdentifierKind::SubjectLocator => &self.subject_locators,
        }
    }

    fn namespace_mut(&mut self, kind: IdentifierKind) -> &mut BTreeMap<Locator, ConstructId> {
        match kind {
            IdentifierKind::Item => &mut self.item_identifiers,
            IdentifierKind::Subject => &mut self.subject_identifiers,
            IdentifierKind::SubjectLocator => &mut self.subject_locators,
        }
    }

    /// Owner of a locator in the given namespace, if bound.
    #[must_use]
    pub fn owner(&self, kind: IdentifierKind, locator: &Locator) -> Option<ConstructId> {
        self.namespace(kind).get(locator).copied()
    }

    /// Bind a locator to a construct, replacing any previous binding.
    ///
    /// Constraint checking happens in [`IdentityOps`]; the merge engine
    /// uses raw rebinding when fusing two topics.
    pub fn bind(&mut self, kind: IdentifierKind, locator: Locator, id: ConstructId) {
        self.namespace_mut(kind).insert(locator, id);
    }

    /// Remove a binding. Removing an absent key is a no-op.
    pub fn unbind(&mut self, kind: IdentifierKind, locator: &Locator) {
        self.namespace_mut(kind).remove(locator);
    }

    /// All bindings of a namespace, ascending by locator.
    #[must_use]
    pub fn entries(&self, kind: IdentifierKind) -> Vec<(Locator, ConstructId)> {
        self.namespace(kind)
            .iter()
            .map(|(l, &id)| (l.clone(), id))
            .collect()
    }

    /// Number of bindings in a namespace.
    #[must_use]
    pub fn len(&self, kind: IdentifierKind) -> usize {
        self.namespace(kind).len()
    }

    /// Whether all three namespaces are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_identifiers.is_empty()
            && self.subject_identifiers.is_empty()
            && self.subject_locators.is_empty()
    }

    /// Drop every binding (used by `reindex`).
    pub fn clear(&mut self) {
        self.item_identifiers.clear();
        self.subject_identifiers.clear();
        self.subject_locators.clear();
    }
}

/// Validate a locator reference before binding it.
pub(crate) fn validate_locator(locator: &Locator) -> Result<(), TopicMapError> {
    if locator.0.is_empty() {
        return Err(TopicMapError::InvalidLocator("empty reference".to_string()));
    }
    if locator.0.len() > MAX_LOCATOR_LENGTH {
        return Err(TopicMapError::InvalidLocator(format!(
            "reference length {} exceeds maximum {}",
            locator.0.len(),
            MAX_LOCATOR_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// IDENTITY OPERATIONS
// =============================================================================

/// Identifier assignment, removal, and lookup on any topic-map view.
pub trait IdentityOps: TopicMapView + Sized {
    /// Construct owning the locator as an item identifier, if any.
    fn construct_by_item_identifier(&self, locator: &Locator) -> Option<ConstructId> {
        self.identity().owner(IdentifierKind::Item, locator)
    }

    /// Topic owning the locator as a subject identifier, if any.
    fn topic_by_subject_identifier(&self, locator: &Locator) -> Option<ConstructId> {
        self.identity().owner(IdentifierKind::Subject, locator)
    }

    /// Topic owning the locator as a subject locator, if any.
    fn topic_by_subject_locator(&self, locator: &Locator) -> Option<ConstructId> {
        self.identity().owner(IdentifierKind::SubjectLocator, locator)
    }

    /// Bind an item identifier to a construct.
    ///
    /// A collision inside the item namespace is an unconditional constraint
    /// violation. A topic whose new item identifier matches another topic's
    /// *subject identifier* is a cross-namespace identity signal: merged
    /// when automatic merging is enabled, a constraint violation otherwise.
    fn add_item_identifier(
        &mut self,
        id: ConstructId,
        locator: Locator,
    ) -> Result<(), TopicMapError> {
        validate_locator(&locator)?;
        let is_topic = self.construct(id)?.as_topic().is_some();

        if let Some(owner) = self.construct_by_item_identifier(&locator) {
            if owner == id {
                return Ok(());
            }
            return Err(TopicMapError::IdentityConstraint {
                reporter: id,
                existing: owner,
                locator,
                kind: IdentifierKind::Item,
            });
        }

        if is_topic {
            if let Some(owner) = self.topic_by_subject_identifier(&locator) {
                if owner != id {
                    self.resolve_topic_collision(id, owner, &locator, IdentifierKind::Item)?;
                }
            }
        }

        self.identity_mut()
            .bind(IdentifierKind::Item, locator.clone(), id);
        self.construct_mut(id)?.item_identifiers_mut().insert(locator);
        Ok(())
    }

    /// Unbind an item identifier. Removing an absent key always succeeds.
    fn remove_item_identifier(
        &mut self,
        id: ConstructId,
        locator: &Locator,
    ) -> Result<(), TopicMapError> {
        if self.construct_mut(id)?.item_identifiers_mut().remove(locator) {
            self.identity_mut().unbind(IdentifierKind::Item, locator);
        }
        Ok(())
    }

    /// Bind a subject identifier to a topic.
    ///
    /// Collisions with another topic's subject identifier, or with another
    /// *topic's* item identifier (cross-namespace signal), are merged when
    /// automatic merging is enabled and constraint violations otherwise.
    fn add_subject_identifier(
        &mut self,
        topic: ConstructId,
        locator: Locator,
    ) -> Result<(), TopicMapError> {
        self.add_topic_identifier(topic, locator, IdentifierKind::Subject)
    }

    /// Unbind a subject identifier. Removing an absent key always succeeds.
    fn remove_subject_identifier(
        &mut self,
        topic: ConstructId,
        locator: &Locator,
    ) -> Result<(), TopicMapError> {
        let removed = self
            .topic_mut_checked(topic)?
            .subject_identifiers
            .remove(locator);
        if removed {
            self.identity_mut().unbind(IdentifierKind::Subject, locator);
        }
        Ok(())
    }

    /// Bind a subject locator to a topic. Same collision contract as
    /// subject identifiers, without the cross-namespace signal.
    fn add_subject_locator(
        &mut self,
        topic: ConstructId,
        locator: Locator,
    ) -> Result<(), TopicMapError> {
        self.add_topic_identifier(topic, locator, IdentifierKind::SubjectLocator)
    }

    /// Unbind a subject locator. Removing an absent key always succeeds.
    fn remove_subject_locator(
        &mut self,
        topic: ConstructId,
        locator: &Locator,
    ) -> Result<(), TopicMapError> {
        let removed = self
            .topic_mut_checked(topic)?
            .subject_locators
            .remove(locator);
        if removed {
            self.identity_mut()
                .unbind(IdentifierKind::SubjectLocator, locator);
        }
        Ok(())
    }

    /// Shared assignment path for the two topic namespaces.
    #[doc(hidden)]
    fn add_topic_identifier(
        &mut self,
        topic: ConstructId,
        locator: Locator,
        kind: IdentifierKind,
    ) -> Result<(), TopicMapError> {
        validate_locator(&locator)?;
        // Kind check up front so a failed assignment mutates nothing.
        let _ = self.topic_checked(topic)?;

        if let Some(owner) = self.identity().owner(kind, &locator) {
            if owner != topic {
                self.resolve_topic_collision(topic, owner, &locator, kind)?;
            }
        } else if kind == IdentifierKind::Subject {
            // Cross-namespace signal: subject identifier equal to another
            // topic's item identifier.
            if let Some(owner) = self.construct_by_item_identifier(&locator) {
                let owner_is_topic = self
                    .construct(owner)
                    .map(|c| c.as_topic().is_some())
                    .unwrap_or(false);
                if owner != topic && owner_is_topic {
                    self.resolve_topic_collision(topic, owner, &locator, kind)?;
                }
            }
        }

        self.identity_mut().bind(kind, locator.clone(), topic);
        let data = self.topic_mut_checked(topic)?;
        match kind {
            IdentifierKind::Subject => {
                data.subject_identifiers.insert(locator);
            }
            IdentifierKind::SubjectLocator => {
                data.subject_locators.insert(locator);
            }
            IdentifierKind::Item => {
                data.item_identifiers.insert(locator);
            }
        }
        Ok(())
    }

    /// Resolve a topic-vs-topic identity collision: merge with the mutated
    /// topic as survivor when automatic merging is enabled, otherwise fail.
    #[doc(hidden)]
    fn resolve_topic_collision(
        &mut self,
        reporter: ConstructId,
        existing: ConstructId,
        locator: &Locator,
        kind: IdentifierKind,
    ) -> Result<(), TopicMapError> {
        if self.auto_merge_enabled() {
            // The topic receiving the new identifier always survives.
            self.merge_in(reporter, existing)
        } else {
            Err(TopicMapError::IdentityConstraint {
                reporter,
                existing,
                locator: locator.clone(),
                kind,
            })
        }
    }

    /// Borrow a live topic record, or fail with kind context.
    #[doc(hidden)]
    fn topic_checked(&self, id: ConstructId) -> Result<&crate::types::Topic, TopicMapError> {
        let construct = self.construct(id)?;
        construct.as_topic().ok_or(TopicMapError::WrongKind {
            id,
            expected: "topic",
            actual: construct.kind(),
        })
    }

    /// Mutably borrow a live topic record, or fail with kind context.
    #[doc(hidden)]
    fn topic_mut_checked(
        &mut self,
        id: ConstructId,
    ) -> Result<&mut crate::types::Topic, TopicMapError> {
        let kind = self.construct(id)?.kind();
        self.construct_mut(id)?
            .as_topic_mut()
            .ok_or(TopicMapError::WrongKind {
                id,
                expected: "topic",
                actual: kind,
            })
    }
}

impl<V: TopicMapView> IdentityOps for V {}

// =============================================================================
// TESTS
// =============================================================================

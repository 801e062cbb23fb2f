//! # Topic Map Graph
//!
//! The construct arena and the operation surface over it.
//!
//! [`TopicMap`] owns every construct in a `BTreeMap` arena keyed by
//! [`ConstructId`], together with the identity registry, the scope
//! registry, and the derived indexes. Ids are allocated densely and never
//! reused: a removed or merged-away construct leaves its id retired
//! forever, so stale handles fail loudly with
//! [`TopicMapError::ConstructRemoved`] instead of silently addressing a
//! newer construct.
//!
//! [`TopicMapView`] abstracts the arena access so every operation trait
//! (`ConstructOps`, `IdentityOps`, `ScopeOps`, `MergeOps`, `IndexOps`)
//! works identically against the base map and against an open
//! [`Transaction`](crate::transaction::Transaction).

use crate::identity::{IdentityOps, IdentityRegistry, validate_locator};
use crate::index::IndexManager;
use crate::primitives::{MAX_VALUE_LENGTH, XSD_STRING};
use crate::scope::{ScopeOps, ScopeRegistry};
use crate::transaction::Transaction;
use crate::types::{
    Association, Construct, ConstructId, ConstructKind, IdentifierKind, Locator, Name, Occurrence,
    Role, ScopeId, Topic, TopicMapError, TopicMapInfo, Variant,
};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// VIEW ABSTRACTION
// =============================================================================

/// Uniform access to a topic map's arena and registries.
///
/// Implemented by [`TopicMap`] (direct access) and by
/// [`Transaction`](crate::transaction::Transaction) (copy-on-write overlay
/// plus closed-state enforcement). Every operation trait in this crate is
/// blanket-implemented over this trait.
pub trait TopicMapView {
    /// Borrow a live construct. Unknown and retired ids report as
    /// [`TopicMapError::ConstructRemoved`].
    fn construct(&self, id: ConstructId) -> Result<&Construct, TopicMapError>;

    /// Borrow a live construct, `None` for unknown or retired ids.
    fn construct_opt(&self, id: ConstructId) -> Option<&Construct>;

    /// Mutably borrow a live construct.
    fn construct_mut(&mut self, id: ConstructId) -> Result<&mut Construct, TopicMapError>;

    /// Allocate a fresh id and store the construct under it.
    fn insert_construct(&mut self, construct: Construct) -> ConstructId;

    /// Drop a construct and retire its id permanently.
    fn retire_construct(&mut self, id: ConstructId);

    /// Whether the id addresses a live construct.
    fn is_live(&self, id: ConstructId) -> bool;

    /// Every live construct id, ascending.
    fn live_ids(&self) -> Vec<ConstructId>;

    /// The identity registry of this view.
    fn identity(&self) -> &IdentityRegistry;
    /// Mutable identity registry.
    fn identity_mut(&mut self) -> &mut IdentityRegistry;

    /// The scope registry of this view.
    fn scope_registry(&self) -> &ScopeRegistry;
    /// Mutable scope registry.
    fn scope_registry_mut(&mut self) -> &mut ScopeRegistry;

    /// The derived indexes of this view.
    fn index(&self) -> &IndexManager;
    /// Mutable derived indexes.
    fn index_mut(&mut self) -> &mut IndexManager;

    /// Whether identity collisions between topics resolve by merging.
    fn auto_merge_enabled(&self) -> bool;

    /// Id of the root topic-map construct.
    fn map_id(&self) -> ConstructId;
}

/// Validate a characteristic value before storing it.
pub(crate) fn validate_value(value: &str) -> Result<(), TopicMapError> {
    if value.len() > MAX_VALUE_LENGTH {
        return Err(TopicMapError::InvalidValue(format!(
            "value length {} exceeds maximum {}",
            value.len(),
            MAX_VALUE_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// TOPIC MAP
// =============================================================================

/// An in-memory topic map: construct arena plus derived registries.
#[derive(Debug, Clone)]
pub struct TopicMap {
    pub(crate) constructs: BTreeMap<ConstructId, Construct>,
    /// Ids that once addressed a construct and never will again.
    pub(crate) retired: BTreeSet<ConstructId>,
    pub(crate) next_id: u64,
    pub(crate) identity: IdentityRegistry,
    pub(crate) scopes: ScopeRegistry,
    pub(crate) index: IndexManager,
    pub(crate) auto_merge: bool,
    pub(crate) map_id: ConstructId,
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicMap {
    /// Create an empty topic map. Automatic merging starts enabled.
    #[must_use]
    pub fn new() -> Self {
        let map_id = ConstructId(1);
        let mut constructs = BTreeMap::new();
        constructs.insert(map_id, Construct::TopicMap(TopicMapInfo::default()));
        Self {
            constructs,
            retired: BTreeSet::new(),
            next_id: 2,
            identity: IdentityRegistry::new(),
            scopes: ScopeRegistry::new(),
            index: IndexManager::new(),
            auto_merge: true,
            map_id,
        }
    }

    /// Create an empty topic map recording the base locator it was
    /// created against.
    pub fn with_base_locator(locator: Locator) -> Result<Self, TopicMapError> {
        validate_locator(&locator)?;
        let mut map = Self::new();
        if let Some(Construct::TopicMap(info)) = map.constructs.get_mut(&map.map_id) {
            info.base_locator = Some(locator);
        }
        Ok(map)
    }

    /// Base locator of the map, if one was recorded.
    #[must_use]
    pub fn base_locator(&self) -> Option<&Locator> {
        match self.constructs.get(&self.map_id) {
            Some(Construct::TopicMap(info)) => info.base_locator.as_ref(),
            _ => None,
        }
    }

    /// Toggle identity-collision merging.
    pub fn set_auto_merge(&mut self, enabled: bool) {
        self.auto_merge = enabled;
    }

    /// Open a transaction. The exclusive borrow serializes transactions:
    /// at most one can be open per map, enforced at compile time.
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction::new(self)
    }
}

impl TopicMapView for TopicMap {
    fn construct(&self, id: ConstructId) -> Result<&Construct, TopicMapError> {
        self.constructs
            .get(&id)
            .ok_or(TopicMapError::ConstructRemoved(id))
    }

    fn construct_opt(&self, id: ConstructId) -> Option<&Construct> {
        self.constructs.get(&id)
    }

    fn construct_mut(&mut self, id: ConstructId) -> Result<&mut Construct, TopicMapError> {
        self.constructs
            .get_mut(&id)
            .ok_or(TopicMapError::ConstructRemoved(id))
    }

    fn insert_construct(&mut self, construct: Construct) -> ConstructId {
        let id = ConstructId(self.next_id);
        self.next_id += 1;
        self.constructs.insert(id, construct);
        id
    }

    fn retire_construct(&mut self, id: ConstructId) {
        if self.constructs.remove(&id).is_some() {
            self.retired.insert(id);
        }
    }

    fn is_live(&self, id: ConstructId) -> bool {
        self.constructs.contains_key(&id)
    }

    fn live_ids(&self) -> Vec<ConstructId> {
        self.constructs.keys().copied().collect()
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
        self.auto_merge
    }

    fn map_id(&self) -> ConstructId {
        self.map_id
    }
}

// =============================================================================
// CONSTRUCT OPERATIONS
// =============================================================================

/// Creation, removal, reification, typing, and supertype operations on any
/// topic-map view.
pub trait ConstructOps: TopicMapView + Sized {
    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create a fresh topic with no identifiers.
    fn create_topic(&mut self) -> ConstructId {
        self.insert_construct(Construct::Topic(Topic::default()))
    }

    /// Topic owning the locator as a subject identifier, creating one if
    /// absent. A match on another topic's *item identifier* resolves to
    /// that topic (cross-namespace identity signal) and binds the subject
    /// identifier to it.
    fn ensure_topic_by_subject_identifier(
        &mut self,
        locator: Locator,
    ) -> Result<ConstructId, TopicMapError> {
        if let Some(existing) = self.topic_by_subject_identifier(&locator) {
            return Ok(existing);
        }
        if let Some(owner) = self.construct_by_item_identifier(&locator) {
            if self.construct(owner)?.as_topic().is_some() {
                self.add_subject_identifier(owner, locator)?;
                return Ok(owner);
            }
        }
        let id = self.create_topic();
        self.add_subject_identifier(id, locator)?;
        Ok(id)
    }

    /// Topic owning the locator as a subject locator, creating one if
    /// absent.
    fn ensure_topic_by_subject_locator(
        &mut self,
        locator: Locator,
    ) -> Result<ConstructId, TopicMapError> {
        if let Some(existing) = self.topic_by_subject_locator(&locator) {
            return Ok(existing);
        }
        let id = self.create_topic();
        self.add_subject_locator(id, locator)?;
        Ok(id)
    }

    /// Topic owning the locator as an item identifier, creating one if
    /// absent. A match on another topic's *subject identifier* resolves to
    /// that topic; a match on a non-topic construct is a constraint
    /// violation (a topic cannot share an item identifier with a name or
    /// an association).
    fn ensure_topic_by_item_identifier(
        &mut self,
        locator: Locator,
    ) -> Result<ConstructId, TopicMapError> {
        if let Some(owner) = self.construct_by_item_identifier(&locator) {
            let construct = self.construct(owner)?;
            if construct.as_topic().is_some() {
                return Ok(owner);
            }
            return Err(TopicMapError::IdentityConstraint {
                reporter: owner,
                existing: owner,
                locator,
                kind: IdentifierKind::Item,
            });
        }
        if let Some(existing) = self.topic_by_subject_identifier(&locator) {
            self.add_item_identifier(existing, locator)?;
            return Ok(existing);
        }
        let id = self.create_topic();
        self.add_item_identifier(id, locator)?;
        Ok(id)
    }

    /// Create a name characteristic on a topic.
    fn create_name(
        &mut self,
        topic: ConstructId,
        name_type: ConstructId,
        value: &str,
        themes: &[ConstructId],
    ) -> Result<ConstructId, TopicMapError> {
        validate_value(value)?;
        self.ensure_topic(topic)?;
        self.ensure_topic(name_type)?;
        let scope = self.intern_theme_list(themes)?;
        let id = self.insert_construct(Construct::Name(Name {
            item_identifiers: BTreeSet::new(),
            parent: topic,
            name_type,
            value: value.to_string(),
            scope,
            variants: BTreeSet::new(),
            reifier: None,
        }));
        self.topic_mut_checked(topic)?.names.insert(id);
        self.index_mut().insert_typed(ConstructKind::Name, name_type, id);
        self.index_mut().insert_scoped(ConstructKind::Name, scope, id);
        Ok(id)
    }

    /// Create an occurrence characteristic on a topic. A missing datatype
    /// defaults to `xsd:string`.
    fn create_occurrence(
        &mut self,
        topic: ConstructId,
        occurrence_type: ConstructId,
        value: &str,
        datatype: Option<Locator>,
        themes: &[ConstructId],
    ) -> Result<ConstructId, TopicMapError> {
        validate_value(value)?;
        self.ensure_topic(topic)?;
        self.ensure_topic(occurrence_type)?;
        let datatype = match datatype {
            Some(locator) => {
                validate_locator(&locator)?;
                locator
            }
            None => Locator::new(XSD_STRING),
        };
        let scope = self.intern_theme_list(themes)?;
        let id = self.insert_construct(Construct::Occurrence(Occurrence {
            item_identifiers: BTreeSet::new(),
            parent: topic,
            occurrence_type,
            value: value.to_string(),
            datatype,
            scope,
            reifier: None,
        }));
        self.topic_mut_checked(topic)?.occurrences.insert(id);
        self.index_mut()
            .insert_typed(ConstructKind::Occurrence, occurrence_type, id);
        self.index_mut()
            .insert_scoped(ConstructKind::Occurrence, scope, id);
        Ok(id)
    }

    /// Create a variant of a name. The variant's scope is the union of the
    /// parent name's themes and the given ones; at least one extra theme
    /// is required, otherwise the variant would be indistinguishable from
    /// its name.
    fn create_variant(
        &mut self,
        name: ConstructId,
        value: &str,
        datatype: Option<Locator>,
        themes: &[ConstructId],
    ) -> Result<ConstructId, TopicMapError> {
        validate_value(value)?;
        if themes.is_empty() {
            return Err(TopicMapError::InvalidValue(
                "variant scope requires at least one theme beyond the name's".to_string(),
            ));
        }
        let parent_scope = {
            let construct = self.construct(name)?;
            construct
                .as_name()
                .map(|n| n.scope)
                .ok_or(TopicMapError::WrongKind {
                    id: name,
                    expected: "name",
                    actual: construct.kind(),
                })?
        };
        let datatype = match datatype {
            Some(locator) => {
                validate_locator(&locator)?;
                locator
            }
            None => Locator::new(XSD_STRING),
        };
        let mut combined = self.scope_registry().themes(parent_scope);
        for &theme in themes {
            self.ensure_topic(theme)?;
            combined.insert(theme);
        }
        let scope = self.scope_registry_mut().intern(&combined);
        let id = self.insert_construct(Construct::Variant(Variant {
            item_identifiers: BTreeSet::new(),
            parent: name,
            value: value.to_string(),
            datatype,
            scope,
            reifier: None,
        }));
        if let Some(record) = self.construct_mut(name)?.as_name_mut() {
            record.variants.insert(id);
        }
        self.index_mut().insert_scoped(ConstructKind::Variant, scope, id);
        Ok(id)
    }

    /// Create an association with no roles yet.
    fn create_association(
        &mut self,
        association_type: ConstructId,
        themes: &[ConstructId],
    ) -> Result<ConstructId, TopicMapError> {
        self.ensure_topic(association_type)?;
        let scope = self.intern_theme_list(themes)?;
        let id = self.insert_construct(Construct::Association(Association {
            item_identifiers: BTreeSet::new(),
            association_type,
            scope,
            roles: BTreeSet::new(),
            reifier: None,
        }));
        self.index_mut()
            .insert_typed(ConstructKind::Association, association_type, id);
        self.index_mut()
            .insert_scoped(ConstructKind::Association, scope, id);
        Ok(id)
    }

    /// Create a role within an association, played by a topic.
    fn create_role(
        &mut self,
        association: ConstructId,
        role_type: ConstructId,
        player: ConstructId,
    ) -> Result<ConstructId, TopicMapError> {
        {
            let construct = self.construct(association)?;
            if construct.as_association().is_none() {
                return Err(TopicMapError::WrongKind {
                    id: association,
                    expected: "association",
                    actual: construct.kind(),
                });
            }
        }
        self.ensure_topic(role_type)?;
        self.ensure_topic(player)?;
        let id = self.insert_construct(Construct::Role(Role {
            item_identifiers: BTreeSet::new(),
            parent: association,
            role_type,
            player,
            reifier: None,
        }));
        if let Some(record) = self.construct_mut(association)?.as_association_mut() {
            record.roles.insert(id);
        }
        self.topic_mut_checked(player)?.roles_played.insert(id);
        self.index_mut().insert_typed(ConstructKind::Role, role_type, id);
        Ok(id)
    }

    /// Intern a theme list after validating every theme is a live topic.
    #[doc(hidden)]
    fn intern_theme_list(&mut self, themes: &[ConstructId]) -> Result<ScopeId, TopicMapError> {
        let mut set = BTreeSet::new();
        for &theme in themes {
            self.ensure_topic(theme)?;
            set.insert(theme);
        }
        Ok(self.scope_registry_mut().intern(&set))
    }

    // -------------------------------------------------------------------------
    // Values, datatypes, players
    // -------------------------------------------------------------------------

    /// Replace the value of a name, occurrence, or variant.
    fn set_value(&mut self, id: ConstructId, value: &str) -> Result<(), TopicMapError> {
        validate_value(value)?;
        let construct = self.construct_mut(id)?;
        match construct {
            Construct::Name(c) => c.value = value.to_string(),
            Construct::Occurrence(c) => c.value = value.to_string(),
            Construct::Variant(c) => c.value = value.to_string(),
            other => {
                return Err(TopicMapError::WrongKind {
                    id,
                    expected: "valued construct",
                    actual: other.kind(),
                });
            }
        }
        Ok(())
    }

    /// Replace the datatype of an occurrence or variant.
    fn set_datatype(&mut self, id: ConstructId, datatype: Locator) -> Result<(), TopicMapError> {
        validate_locator(&datatype)?;
        let construct = self.construct_mut(id)?;
        match construct {
            Construct::Occurrence(c) => c.datatype = datatype,
            Construct::Variant(c) => c.datatype = datatype,
            other => {
                return Err(TopicMapError::WrongKind {
                    id,
                    expected: "datatyped construct",
                    actual: other.kind(),
                });
            }
        }
        Ok(())
    }

    /// Repoint a role at a new player, maintaining both backreference sets.
    fn set_role_player(
        &mut self,
        role: ConstructId,
        player: ConstructId,
    ) -> Result<(), TopicMapError> {
        self.ensure_topic(player)?;
        let old = {
            let construct = self.construct(role)?;
            construct
                .as_role()
                .map(|r| r.player)
                .ok_or(TopicMapError::WrongKind {
                    id: role,
                    expected: "role",
                    actual: construct.kind(),
                })?
        };
        if old == player {
            return Ok(());
        }
        if let Ok(construct) = self.construct_mut(old) {
            if let Some(topic) = construct.as_topic_mut() {
                topic.roles_played.remove(&role);
            }
        }
        self.topic_mut_checked(player)?.roles_played.insert(role);
        if let Construct::Role(record) = self.construct_mut(role)? {
            record.player = player;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Typing
    // -------------------------------------------------------------------------

    /// Add a type to a topic. Idempotent.
    fn add_topic_type(
        &mut self,
        topic: ConstructId,
        type_id: ConstructId,
    ) -> Result<(), TopicMapError> {
        self.ensure_topic(type_id)?;
        if self.topic_mut_checked(topic)?.types.insert(type_id) {
            self.index_mut()
                .insert_typed(ConstructKind::Topic, type_id, topic);
        }
        Ok(())
    }

    /// Remove a type from a topic. Removing an absent type is a no-op.
    fn remove_topic_type(
        &mut self,
        topic: ConstructId,
        type_id: ConstructId,
    ) -> Result<(), TopicMapError> {
        if self.topic_mut_checked(topic)?.types.remove(&type_id) {
            self.index_mut()
                .remove_typed(ConstructKind::Topic, type_id, topic);
        }
        Ok(())
    }

    /// Retype a name, occurrence, association, or role.
    fn set_type(
        &mut self,
        id: ConstructId,
        type_id: ConstructId,
    ) -> Result<(), TopicMapError> {
        self.ensure_topic(type_id)?;
        let (kind, old) = {
            let construct = self.construct(id)?;
            let old = construct.type_id().ok_or(TopicMapError::WrongKind {
                id,
                expected: "typed construct",
                actual: construct.kind(),
            })?;
            (construct.kind(), old)
        };
        if old == type_id {
            return Ok(());
        }
        self.construct_mut(id)?.set_type_id(type_id);
        self.index_mut().move_typed(kind, old, type_id, id);
        Ok(())
    }

    /// Add a direct supertype edge. Cycles are tolerated. Idempotent.
    fn add_supertype(
        &mut self,
        topic: ConstructId,
        supertype: ConstructId,
    ) -> Result<(), TopicMapError> {
        self.ensure_topic(supertype)?;
        if self.topic_mut_checked(topic)?.supertypes.insert(supertype) {
            self.index_mut().add_supertype_edge(topic, supertype);
        }
        Ok(())
    }

    /// Remove a direct supertype edge. Removing an absent edge is a no-op.
    fn remove_supertype(
        &mut self,
        topic: ConstructId,
        supertype: ConstructId,
    ) -> Result<(), TopicMapError> {
        if self.topic_mut_checked(topic)?.supertypes.remove(&supertype) {
            self.index_mut().remove_supertype_edge(topic, supertype);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reification
    // -------------------------------------------------------------------------

    /// Set or clear the reifier of a reifiable construct.
    ///
    /// Reification is strictly 1:1 in both directions, maintained by
    /// detaching before attaching: assigning a topic that already reifies
    /// a different construct unreifies that construct first, and replacing
    /// a construct's reifier detaches the previous topic. Re-assigning the
    /// same pair is a no-op.
    fn set_reifier(
        &mut self,
        id: ConstructId,
        reifier: Option<ConstructId>,
    ) -> Result<(), TopicMapError> {
        let (reifiable, current) = {
            let construct = self.construct(id)?;
            (construct.is_reifiable(), construct.reifier())
        };
        if !reifiable {
            let actual = self.construct(id)?.kind();
            return Err(TopicMapError::WrongKind {
                id,
                expected: "reifiable construct",
                actual,
            });
        }
        if let Some(topic) = reifier {
            let reified = self.topic_checked(topic)?.reified;
            match reified {
                Some(existing) if existing == id => return Ok(()),
                // The topic abandons its previous reified construct; the
                // new assignment wins.
                Some(existing) => {
                    if let Ok(construct) = self.construct_mut(existing) {
                        construct.set_reifier_slot(None);
                    }
                }
                None => {}
            }
        }
        if let Some(previous) = current {
            if let Ok(construct) = self.construct_mut(previous) {
                if let Some(topic) = construct.as_topic_mut() {
                    topic.reified = None;
                }
            }
        }
        self.construct_mut(id)?.set_reifier_slot(reifier);
        if let Some(topic) = reifier {
            self.topic_mut_checked(topic)?.reified = Some(id);
        }
        Ok(())
    }

    /// The topic reifying a construct, if any.
    fn reifier_of(&self, id: ConstructId) -> Result<Option<ConstructId>, TopicMapError> {
        Ok(self.construct(id)?.reifier())
    }

    /// The construct a topic reifies, if any.
    fn reified_by(&self, topic: ConstructId) -> Result<Option<ConstructId>, TopicMapError> {
        Ok(self.topic_checked(topic)?.reified)
    }

    // -------------------------------------------------------------------------
    // Enumeration
    // -------------------------------------------------------------------------

    /// Every live topic id, ascending.
    fn topics(&self) -> Vec<ConstructId> {
        self.live_ids()
            .into_iter()
            .filter(|&id| {
                self.construct_opt(id)
                    .is_some_and(|c| c.kind() == ConstructKind::Topic)
            })
            .collect()
    }

    /// Every live association id, ascending.
    fn associations(&self) -> Vec<ConstructId> {
        self.live_ids()
            .into_iter()
            .filter(|&id| {
                self.construct_opt(id)
                    .is_some_and(|c| c.kind() == ConstructKind::Association)
            })
            .collect()
    }

    /// Names owned by a topic.
    fn names_of(&self, topic: ConstructId) -> Result<Vec<ConstructId>, TopicMapError> {
        Ok(self.topic_checked(topic)?.names.iter().copied().collect())
    }

    /// Occurrences owned by a topic.
    fn occurrences_of(&self, topic: ConstructId) -> Result<Vec<ConstructId>, TopicMapError> {
        Ok(self
            .topic_checked(topic)?
            .occurrences
            .iter()
            .copied()
            .collect())
    }

    /// Roles in which a topic is the player.
    fn roles_played_by(&self, topic: ConstructId) -> Result<Vec<ConstructId>, TopicMapError> {
        Ok(self
            .topic_checked(topic)?
            .roles_played
            .iter()
            .copied()
            .collect())
    }

    /// Roles owned by an association.
    fn roles_of(&self, association: ConstructId) -> Result<Vec<ConstructId>, TopicMapError> {
        let construct = self.construct(association)?;
        construct
            .as_association()
            .map(|a| a.roles.iter().copied().collect())
            .ok_or(TopicMapError::WrongKind {
                id: association,
                expected: "association",
                actual: construct.kind(),
            })
    }

    /// Variants owned by a name.
    fn variants_of(&self, name: ConstructId) -> Result<Vec<ConstructId>, TopicMapError> {
        let construct = self.construct(name)?;
        construct
            .as_name()
            .map(|n| n.variants.iter().copied().collect())
            .ok_or(TopicMapError::WrongKind {
                id: name,
                expected: "name",
                actual: construct.kind(),
            })
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Remove any construct, dispatching to the kind-specific cascade.
    /// The root topic-map construct cannot be removed.
    fn remove_construct(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        match self.construct(id)?.kind() {
            ConstructKind::Topic => self.remove_topic(id),
            ConstructKind::Name => self.remove_name(id),
            ConstructKind::Occurrence => self.remove_occurrence(id),
            ConstructKind::Variant => self.remove_variant(id),
            ConstructKind::Association => self.remove_association(id),
            ConstructKind::Role => self.remove_role(id),
            ConstructKind::TopicMap => Err(TopicMapError::WrongKind {
                id,
                expected: "removable construct",
                actual: ConstructKind::TopicMap,
            }),
        }
    }

    /// Remove a name and its variants.
    fn remove_name(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        let record = {
            let construct = self.construct(id)?;
            construct
                .as_name()
                .cloned()
                .ok_or(TopicMapError::WrongKind {
                    id,
                    expected: "name",
                    actual: construct.kind(),
                })?
        };
        for variant in record.variants {
            if self.is_live(variant) {
                self.remove_variant(variant)?;
            }
        }
        self.detach_common(id)?;
        if let Ok(construct) = self.construct_mut(record.parent) {
            if let Some(topic) = construct.as_topic_mut() {
                topic.names.remove(&id);
            }
        }
        self.index_mut()
            .remove_typed(ConstructKind::Name, record.name_type, id);
        self.index_mut()
            .remove_scoped(ConstructKind::Name, record.scope, id);
        self.retire_construct(id);
        Ok(())
    }

    /// Remove a variant.
    fn remove_variant(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        let record = {
            let construct = self.construct(id)?;
            construct
                .as_variant()
                .cloned()
                .ok_or(TopicMapError::WrongKind {
                    id,
                    expected: "variant",
                    actual: construct.kind(),
                })?
        };
        self.detach_common(id)?;
        if let Ok(construct) = self.construct_mut(record.parent) {
            if let Some(name) = construct.as_name_mut() {
                name.variants.remove(&id);
            }
        }
        self.index_mut()
            .remove_scoped(ConstructKind::Variant, record.scope, id);
        self.retire_construct(id);
        Ok(())
    }

    /// Remove an occurrence.
    fn remove_occurrence(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        let record = {
            let construct = self.construct(id)?;
            construct
                .as_occurrence()
                .cloned()
                .ok_or(TopicMapError::WrongKind {
                    id,
                    expected: "occurrence",
                    actual: construct.kind(),
                })?
        };
        self.detach_common(id)?;
        if let Ok(construct) = self.construct_mut(record.parent) {
            if let Some(topic) = construct.as_topic_mut() {
                topic.occurrences.remove(&id);
            }
        }
        self.index_mut()
            .remove_typed(ConstructKind::Occurrence, record.occurrence_type, id);
        self.index_mut()
            .remove_scoped(ConstructKind::Occurrence, record.scope, id);
        self.retire_construct(id);
        Ok(())
    }

    /// Remove a role, detaching it from its association and its player.
    fn remove_role(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        let record = {
            let construct = self.construct(id)?;
            construct
                .as_role()
                .cloned()
                .ok_or(TopicMapError::WrongKind {
                    id,
                    expected: "role",
                    actual: construct.kind(),
                })?
        };
        self.detach_common(id)?;
        if let Ok(construct) = self.construct_mut(record.parent) {
            if let Some(association) = construct.as_association_mut() {
                association.roles.remove(&id);
            }
        }
        if let Ok(construct) = self.construct_mut(record.player) {
            if let Some(topic) = construct.as_topic_mut() {
                topic.roles_played.remove(&id);
            }
        }
        self.index_mut()
            .remove_typed(ConstructKind::Role, record.role_type, id);
        self.retire_construct(id);
        Ok(())
    }

    /// Remove an association and its roles.
    fn remove_association(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        let record = {
            let construct = self.construct(id)?;
            construct
                .as_association()
                .cloned()
                .ok_or(TopicMapError::WrongKind {
                    id,
                    expected: "association",
                    actual: construct.kind(),
                })?
        };
        for role in record.roles {
            if self.is_live(role) {
                self.remove_role(role)?;
            }
        }
        self.detach_common(id)?;
        self.index_mut()
            .remove_typed(ConstructKind::Association, record.association_type, id);
        self.index_mut()
            .remove_scoped(ConstructKind::Association, record.scope, id);
        self.retire_construct(id);
        Ok(())
    }

    /// Remove a topic and everything that depends on it.
    ///
    /// Cascade, in order: its reification link, its names (with variants)
    /// and occurrences, the roles it plays, every characteristic typed by
    /// it (type edges on topic instances are dropped, typed characteristics
    /// are removed), its supertype edges in both directions, every scope it
    /// appears in as a theme (the scopables are repointed without it), and
    /// finally its identifier bindings.
    fn remove_topic(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        let record = self.topic_checked(id)?.clone();

        if let Some(reified) = record.reified {
            if let Ok(construct) = self.construct_mut(reified) {
                construct.set_reifier_slot(None);
            }
        }
        for name in record.names {
            if self.is_live(name) {
                self.remove_name(name)?;
            }
        }
        for occurrence in record.occurrences {
            if self.is_live(occurrence) {
                self.remove_occurrence(occurrence)?;
            }
        }
        for role in record.roles_played {
            if self.is_live(role) {
                self.remove_role(role)?;
            }
        }

        // Constructs typed by this topic: instances lose the type edge,
        // typed characteristics are removed outright.
        for instance in self.index().typed_of(ConstructKind::Topic, id) {
            if self.is_live(instance) {
                self.remove_topic_type(instance, id)?;
            }
        }
        for name in self.index().typed_of(ConstructKind::Name, id) {
            if self.is_live(name) {
                self.remove_name(name)?;
            }
        }
        for occurrence in self.index().typed_of(ConstructKind::Occurrence, id) {
            if self.is_live(occurrence) {
                self.remove_occurrence(occurrence)?;
            }
        }
        for association in self.index().typed_of(ConstructKind::Association, id) {
            if self.is_live(association) {
                self.remove_association(association)?;
            }
        }
        for role in self.index().typed_of(ConstructKind::Role, id) {
            if self.is_live(role) {
                self.remove_role(role)?;
            }
        }

        for supertype in record.supertypes {
            self.index_mut().remove_supertype_edge(id, supertype);
        }
        for subtype in self.index().direct_subtypes(id) {
            self.index_mut().remove_supertype_edge(subtype, id);
            if let Ok(construct) = self.construct_mut(subtype) {
                if let Some(topic) = construct.as_topic_mut() {
                    topic.supertypes.remove(&id);
                }
            }
        }

        // Strip the topic out of every scope it themes, then retire the
        // now-unreferenced scopes.
        for scope in self.scope_registry().scopes_containing(id) {
            let scopables: Vec<(ConstructKind, ConstructId)> = [
                ConstructKind::Name,
                ConstructKind::Occurrence,
                ConstructKind::Variant,
                ConstructKind::Association,
            ]
            .into_iter()
            .flat_map(|kind| {
                self.index()
                    .scoped_of(kind, scope)
                    .into_iter()
                    .map(move |s| (kind, s))
            })
            .collect();
            for (_, scopable) in scopables {
                if self.is_live(scopable) {
                    self.remove_theme(scopable, id)?;
                }
            }
            self.scope_registry_mut().retire(scope);
        }

        for locator in record.subject_identifiers {
            self.identity_mut().unbind(IdentifierKind::Subject, &locator);
        }
        for locator in record.subject_locators {
            self.identity_mut()
                .unbind(IdentifierKind::SubjectLocator, &locator);
        }
        self.detach_common(id)?;
        self.retire_construct(id);
        Ok(())
    }

    /// Shared removal plumbing: unbind item identifiers and clear the
    /// reifier backreference.
    #[doc(hidden)]
    fn detach_common(&mut self, id: ConstructId) -> Result<(), TopicMapError> {
        let (locators, reifier): (Vec<Locator>, Option<ConstructId>) = {
            let construct = self.construct(id)?;
            (
                construct.item_identifiers().iter().cloned().collect(),
                construct.reifier(),
            )
        };
        for locator in locators {
            self.identity_mut().unbind(IdentifierKind::Item, &locator);
        }
        if let Some(topic) = reifier {
            if let Ok(construct) = self.construct_mut(topic) {
                if let Some(record) = construct.as_topic_mut() {
                    record.reified = None;
                }
            }
        }
        Ok(())
    }
}

impl<V: TopicMapView> ConstructOps for V {}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexOps;

    #[test]
    fn new_map_owns_only_the_root_construct() {
        let map = TopicMap::new();
        assert_eq!(map.live_ids(), vec![ConstructId(1)]);
        assert_eq!(map.map_id(), ConstructId(1));
        assert!(map.auto_merge_enabled());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut map = TopicMap::new();
        let a = map.create_topic();
        map.remove_topic(a).expect("remove topic");
        let b = map.create_topic();
        assert_ne!(a, b);
        assert!(matches!(
            map.construct(a),
            Err(TopicMapError::ConstructRemoved(_))
        ));
    }

    #[test]
    fn ensure_topic_by_subject_identifier_is_get_or_create() {
        let mut map = TopicMap::new();
        let loc = Locator::new("http://ex/person");
        let a = map.ensure_topic_by_subject_identifier(loc.clone()).expect("ensure topic by subject identifier");
        let b = map.ensure_topic_by_subject_identifier(loc).expect("ensure topic by subject identifier");
        assert_eq!(a, b);
        assert_eq!(map.topics().len(), 1);
    }

    #[test]
    fn ensure_topic_by_item_identifier_rejects_non_topic_owner() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let name = map.create_name(topic, ntype, "n", &[]).expect("create name");
        let loc = Locator::new("http://ex/ii");
        map.add_item_identifier(name, loc.clone()).expect("add item identifier");
        assert!(matches!(
            map.ensure_topic_by_item_identifier(loc),
            Err(TopicMapError::IdentityConstraint { .. })
        ));
    }

    #[test]
    fn occurrence_datatype_defaults_to_xsd_string() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let otype = map.create_topic();
        let occ = map
            .create_occurrence(topic, otype, "42", None, &[])
            .expect("create occurrence");
        let record = map.construct(occ).expect("construct").as_occurrence().expect("as occurrence").clone();
        assert_eq!(record.datatype.as_str(), XSD_STRING);
        assert!(record.scope.is_unconstrained());
    }

    #[test]
    fn variant_scope_unions_parent_themes() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let theme_a = map.create_topic();
        let theme_b = map.create_topic();
        let name = map.create_name(topic, ntype, "n", &[theme_a]).expect("create name");
        let variant = map.create_variant(name, "v", None, &[theme_b]).expect("create variant");
        let scope = map.construct(variant).expect("construct").scope().expect("scope");
        let themes = map.scope_registry().themes(scope);
        assert!(themes.contains(&theme_a));
        assert!(themes.contains(&theme_b));
    }

    #[test]
    fn variant_requires_an_extra_theme() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let name = map.create_name(topic, ntype, "n", &[]).expect("create name");
        assert!(matches!(
            map.create_variant(name, "v", None, &[]),
            Err(TopicMapError::InvalidValue(_))
        ));
    }

    #[test]
    fn reification_is_one_to_one() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let atype = map.create_topic();
        let assoc_a = map.create_association(atype, &[]).expect("association");

        map.set_reifier(assoc_a, Some(topic)).expect("set reifier");
        assert_eq!(map.reifier_of(assoc_a).expect("reifier"), Some(topic));
        assert_eq!(map.reified_by(topic).expect("reified"), Some(assoc_a));

        // Re-assigning the same pair is a no-op.
        map.set_reifier(assoc_a, Some(topic)).expect("set reifier");
        assert_eq!(map.reified_by(topic).expect("reified"), Some(assoc_a));

        // Clearing detaches both directions.
        map.set_reifier(assoc_a, None).expect("clear reifier");
        assert_eq!(map.reifier_of(assoc_a).expect("reifier"), None);
        assert_eq!(map.reified_by(topic).expect("reified"), None);
    }

    #[test]
    fn repointing_a_reifier_detaches_the_prior_reified() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let atype = map.create_topic();
        let assoc_a = map.create_association(atype, &[]).expect("association");
        let assoc_b = map.create_association(atype, &[]).expect("association");

        // The topic moves from reifying one construct to another; the
        // old pair is dissolved, the new one is 1:1 in both directions.
        map.set_reifier(assoc_a, Some(topic)).expect("set reifier");
        map.set_reifier(assoc_b, Some(topic)).expect("repoint reifier");
        assert_eq!(map.reifier_of(assoc_a).expect("reifier"), None);
        assert_eq!(map.reifier_of(assoc_b).expect("reifier"), Some(topic));
        assert_eq!(map.reified_by(topic).expect("reified"), Some(assoc_b));
    }

    #[test]
    fn replacing_a_reifier_detaches_the_prior_topic() {
        let mut map = TopicMap::new();
        let first = map.create_topic();
        let second = map.create_topic();
        let atype = map.create_topic();
        let assoc = map.create_association(atype, &[]).expect("association");

        map.set_reifier(assoc, Some(first)).expect("set reifier");
        map.set_reifier(assoc, Some(second)).expect("replace reifier");
        assert_eq!(map.reified_by(first).expect("reified"), None);
        assert_eq!(map.reified_by(second).expect("reified"), Some(assoc));
        assert_eq!(map.reifier_of(assoc).expect("reifier"), Some(second));
    }

    #[test]
    fn topics_cannot_be_reified() {
        let mut map = TopicMap::new();
        let a = map.create_topic();
        let b = map.create_topic();
        assert!(matches!(
            map.set_reifier(a, Some(b)),
            Err(TopicMapError::WrongKind { .. })
        ));
    }

    #[test]
    fn remove_name_cascades_variants() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let theme = map.create_topic();
        let name = map.create_name(topic, ntype, "n", &[]).expect("create name");
        let variant = map.create_variant(name, "v", None, &[theme]).expect("create variant");

        map.remove_name(name).expect("remove name");
        assert!(!map.is_live(name));
        assert!(!map.is_live(variant));
        assert!(map.names_of(topic).expect("names of").is_empty());
    }

    #[test]
    fn remove_association_cascades_roles() {
        let mut map = TopicMap::new();
        let atype = map.create_topic();
        let rtype = map.create_topic();
        let player = map.create_topic();
        let assoc = map.create_association(atype, &[]).expect("create association");
        let role = map.create_role(assoc, rtype, player).expect("create role");

        map.remove_association(assoc).expect("remove association");
        assert!(!map.is_live(assoc));
        assert!(!map.is_live(role));
        assert!(map.roles_played_by(player).expect("roles played by").is_empty());
    }

    #[test]
    fn remove_topic_cascades_characteristics_and_typed() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let name = map.create_name(topic, ntype, "n", &[]).expect("create name");

        // A topic typed by `topic` and an occurrence typed by `topic`.
        let instance = map.create_topic();
        map.add_topic_type(instance, topic).expect("add topic type");
        let other = map.create_topic();
        let occ = map.create_occurrence(other, topic, "x", None, &[]).expect("create occurrence");

        map.remove_topic(topic).expect("remove topic");
        assert!(!map.is_live(topic));
        assert!(!map.is_live(name));
        assert!(!map.is_live(occ));
        // The instance survives, minus the type edge.
        assert!(map.is_live(instance));
        assert!(map.topic_checked(instance).expect("topic checked").types.is_empty());
    }

    #[test]
    fn remove_topic_strips_it_as_theme() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let theme = map.create_topic();
        let name = map.create_name(topic, ntype, "n", &[theme]).expect("create name");

        map.remove_topic(theme).expect("remove topic");
        let scope = map.construct(name).expect("construct").scope().expect("scope");
        assert!(scope.is_unconstrained());
        assert!(map.constructs_by_theme(ConstructKind::Name, theme).is_empty());
    }

    #[test]
    fn remove_topic_unbinds_identifiers() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        let si = Locator::new("http://ex/si");
        let ii = Locator::new("http://ex/ii");
        map.add_subject_identifier(topic, si.clone()).expect("add subject identifier");
        map.add_item_identifier(topic, ii.clone()).expect("add item identifier");

        map.remove_topic(topic).expect("remove topic");
        assert_eq!(map.topic_by_subject_identifier(&si), None);
        assert_eq!(map.construct_by_item_identifier(&ii), None);
    }

    #[test]
    fn supertype_edges_are_dropped_both_directions() {
        let mut map = TopicMap::new();
        let sub = map.create_topic();
        let sup = map.create_topic();
        map.add_supertype(sub, sup).expect("add supertype");
        assert_eq!(map.supertypes_of(sub), vec![sup]);

        map.remove_topic(sup).expect("remove topic");
        assert!(map.supertypes_of(sub).is_empty());
        assert!(map.topic_checked(sub).expect("topic checked").supertypes.is_empty());
    }

    #[test]
    fn root_construct_cannot_be_removed() {
        let mut map = TopicMap::new();
        let root = map.map_id();
        assert!(matches!(
            map.remove_construct(root),
            Err(TopicMapError::WrongKind { .. })
        ));
    }
}

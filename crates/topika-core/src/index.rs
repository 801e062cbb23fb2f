//! # Index Manager
//!
//! Maintains the derived lookup views consistent with every mutation:
//!
//! - type → topics / names / occurrences / associations / roles
//! - scope → scopables (per kind), plus theme-keyed "any scope containing
//!   this theme" queries through the scope registry
//! - identifier → construct (enumeration and regex matching over the three
//!   namespaces owned by the identity registry)
//! - supertype/subtype adjacency with cycle-guarded transitive closure
//!
//! Multi-key queries take a `match_all` flag that selects the set-algebra
//! operator: union (match any) or intersection (match all). A dangling
//! entry pointing at a removed id is a correctness bug, not an eventual-
//! consistency window — there is no background compaction. `reindex`
//! rebuilds everything from the construct arena and is idempotent.

use crate::graph::TopicMapView;
use crate::types::{ConstructId, ConstructKind, IdentifierKind, Locator, ScopeId, TopicMapError};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

type IdSetMap<K> = BTreeMap<K, BTreeSet<ConstructId>>;

// =============================================================================
// INDEX MANAGER
// =============================================================================

/// Derived lookup tables. All maps are `BTreeMap` for deterministic order.
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    topics_by_type: IdSetMap<ConstructId>,
    names_by_type: IdSetMap<ConstructId>,
    occurrences_by_type: IdSetMap<ConstructId>,
    associations_by_type: IdSetMap<ConstructId>,
    roles_by_type: IdSetMap<ConstructId>,
    names_by_scope: IdSetMap<ScopeId>,
    occurrences_by_scope: IdSetMap<ScopeId>,
    variants_by_scope: IdSetMap<ScopeId>,
    associations_by_scope: IdSetMap<ScopeId>,
    /// topic -> direct supertypes.
    supertypes: IdSetMap<ConstructId>,
    /// topic -> direct subtypes (inverse of `supertypes`).
    subtypes: IdSetMap<ConstructId>,
}

fn insert_entry<K: Ord>(map: &mut IdSetMap<K>, key: K, id: ConstructId) {
    map.entry(key).or_default().insert(id);
}

fn remove_entry<K: Ord>(map: &mut IdSetMap<K>, key: &K, id: ConstructId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(&id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

impl IndexManager {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn typed_map(&self, kind: ConstructKind) -> Option<&IdSetMap<ConstructId>> {
        match kind {
            ConstructKind::Topic => Some(&self.topics_by_type),
            ConstructKind::Name => Some(&self.names_by_type),
            ConstructKind::Occurrence => Some(&self.occurrences_by_type),
            ConstructKind::Association => Some(&self.associations_by_type),
            ConstructKind::Role => Some(&self.roles_by_type),
            _ => None,
        }
    }

    fn typed_map_mut(&mut self, kind: ConstructKind) -> Option<&mut IdSetMap<ConstructId>> {
        match kind {
            ConstructKind::Topic => Some(&mut self.topics_by_type),
            ConstructKind::Name => Some(&mut self.names_by_type),
            ConstructKind::Occurrence => Some(&mut self.occurrences_by_type),
            ConstructKind::Association => Some(&mut self.associations_by_type),
            ConstructKind::Role => Some(&mut self.roles_by_type),
            _ => None,
        }
    }

    fn scoped_map(&self, kind: ConstructKind) -> Option<&IdSetMap<ScopeId>> {
        match kind {
            ConstructKind::Name => Some(&self.names_by_scope),
            ConstructKind::Occurrence => Some(&self.occurrences_by_scope),
            ConstructKind::Variant => Some(&self.variants_by_scope),
            ConstructKind::Association => Some(&self.associations_by_scope),
            _ => None,
        }
    }

    fn scoped_map_mut(&mut self, kind: ConstructKind) -> Option<&mut IdSetMap<ScopeId>> {
        match kind {
            ConstructKind::Name => Some(&mut self.names_by_scope),
            ConstructKind::Occurrence => Some(&mut self.occurrences_by_scope),
            ConstructKind::Variant => Some(&mut self.variants_by_scope),
            ConstructKind::Association => Some(&mut self.associations_by_scope),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Mutation hooks (called by the operation layer)
    // -------------------------------------------------------------------------

    /// Record `id` (of the given kind) as an instance of `type_id`.
    pub fn insert_typed(&mut self, kind: ConstructKind, type_id: ConstructId, id: ConstructId) {
        if let Some(map) = self.typed_map_mut(kind) {
            insert_entry(map, type_id, id);
        }
    }

    /// Forget `id` as an instance of `type_id`.
    pub fn remove_typed(&mut self, kind: ConstructKind, type_id: ConstructId, id: ConstructId) {
        if let Some(map) = self.typed_map_mut(kind) {
            remove_entry(map, &type_id, id);
        }
    }

    /// Retype `id` from `old` to `new`.
    pub fn move_typed(
        &mut self,
        kind: ConstructKind,
        old: ConstructId,
        new: ConstructId,
        id: ConstructId,
    ) {
        self.remove_typed(kind, old, id);
        self.insert_typed(kind, new, id);
    }

    /// Record a scopable under its scope.
    pub fn insert_scoped(&mut self, kind: ConstructKind, scope: ScopeId, id: ConstructId) {
        if let Some(map) = self.scoped_map_mut(kind) {
            insert_entry(map, scope, id);
        }
    }

    /// Forget a scopable under its scope.
    pub fn remove_scoped(&mut self, kind: ConstructKind, scope: ScopeId, id: ConstructId) {
        if let Some(map) = self.scoped_map_mut(kind) {
            remove_entry(map, &scope, id);
        }
    }

    /// Repoint a scopable from one scope to another.
    pub fn move_scoped(
        &mut self,
        kind: ConstructKind,
        old: ScopeId,
        new: ScopeId,
        id: ConstructId,
    ) {
        self.remove_scoped(kind, old, id);
        self.insert_scoped(kind, new, id);
    }

    /// Record a direct supertype edge `sub -> sup`.
    pub fn add_supertype_edge(&mut self, sub: ConstructId, sup: ConstructId) {
        insert_entry(&mut self.supertypes, sub, sup);
        insert_entry(&mut self.subtypes, sup, sub);
    }

    /// Forget a direct supertype edge `sub -> sup`.
    pub fn remove_supertype_edge(&mut self, sub: ConstructId, sup: ConstructId) {
        remove_entry(&mut self.supertypes, &sub, sup);
        remove_entry(&mut self.subtypes, &sup, sub);
    }

    /// Drop everything (used by `reindex`).
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // -------------------------------------------------------------------------
    // Read side
    // -------------------------------------------------------------------------

    /// Instances of `type_id` among the given kind.
    #[must_use]
    pub fn typed_of(&self, kind: ConstructKind, type_id: ConstructId) -> BTreeSet<ConstructId> {
        self.typed_map(kind)
            .and_then(|m| m.get(&type_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Scopables of the given kind under exactly `scope`.
    #[must_use]
    pub fn scoped_of(&self, kind: ConstructKind, scope: ScopeId) -> BTreeSet<ConstructId> {
        self.scoped_map(kind)
            .and_then(|m| m.get(&scope))
            .cloned()
            .unwrap_or_default()
    }

    /// Direct supertypes of a topic.
    #[must_use]
    pub fn direct_supertypes(&self, topic: ConstructId) -> BTreeSet<ConstructId> {
        self.supertypes.get(&topic).cloned().unwrap_or_default()
    }

    /// Direct subtypes of a topic.
    #[must_use]
    pub fn direct_subtypes(&self, topic: ConstructId) -> BTreeSet<ConstructId> {
        self.subtypes.get(&topic).cloned().unwrap_or_default()
    }

    /// Every type topic that currently has at least one instance of `kind`.
    #[must_use]
    pub fn types_in_use(&self, kind: ConstructKind) -> Vec<ConstructId> {
        self.typed_map(kind)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// SET ALGEBRA & PAGING
// =============================================================================

/// Combine per-key result sets: union for match-any, intersection for
/// match-all. An empty key list yields an empty result in both modes.
#[must_use]
pub fn combine(sets: Vec<BTreeSet<ConstructId>>, match_all: bool) -> BTreeSet<ConstructId> {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return BTreeSet::new();
    };
    if match_all {
        iter.fold(first, |acc, s| acc.intersection(&s).copied().collect())
    } else {
        iter.fold(first, |mut acc, s| {
            acc.extend(s);
            acc
        })
    }
}

/// Deterministic offset/limit paging over a caller-supplied ordering.
#[must_use]
pub fn paged<T, F>(mut items: Vec<T>, offset: usize, limit: usize, mut cmp: F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    items.sort_by(&mut cmp);
    items.into_iter().skip(offset).take(limit).collect()
}

// =============================================================================
// INDEX QUERIES
// =============================================================================

/// Read-side index queries plus `reindex`, available on any view.
pub trait IndexOps: TopicMapView + Sized {
    /// Topics with the exact type `type_id`.
    fn topics_by_type(&self, type_id: ConstructId) -> Vec<ConstructId> {
        self.index()
            .typed_of(ConstructKind::Topic, type_id)
            .into_iter()
            .collect()
    }

    /// Topics matching several type keys (union or intersection).
    fn topics_by_types(&self, types: &[ConstructId], match_all: bool) -> Vec<ConstructId> {
        let sets = types
            .iter()
            .map(|&t| self.index().typed_of(ConstructKind::Topic, t))
            .collect();
        combine(sets, match_all).into_iter().collect()
    }

    /// Count variant of [`IndexOps::topics_by_type`].
    fn number_of_topics_by_type(&self, type_id: ConstructId) -> usize {
        self.index().typed_of(ConstructKind::Topic, type_id).len()
    }

    /// Typed constructs of one kind with the exact type `type_id`.
    fn constructs_by_type(&self, kind: ConstructKind, type_id: ConstructId) -> Vec<ConstructId> {
        self.index().typed_of(kind, type_id).into_iter().collect()
    }

    /// Typed constructs of one kind matching several type keys.
    fn constructs_by_types(
        &self,
        kind: ConstructKind,
        types: &[ConstructId],
        match_all: bool,
    ) -> Vec<ConstructId> {
        let sets = types.iter().map(|&t| self.index().typed_of(kind, t)).collect();
        combine(sets, match_all).into_iter().collect()
    }

    /// Count variant of [`IndexOps::constructs_by_type`].
    fn number_of_constructs_by_type(&self, kind: ConstructKind, type_id: ConstructId) -> usize {
        self.index().typed_of(kind, type_id).len()
    }

    /// Scopables of one kind under exactly the given scope.
    fn constructs_by_scope(&self, kind: ConstructKind, scope: ScopeId) -> Vec<ConstructId> {
        self.index().scoped_of(kind, scope).into_iter().collect()
    }

    /// Scopables of one kind whose scope contains the given theme.
    fn constructs_by_theme(&self, kind: ConstructKind, theme: ConstructId) -> Vec<ConstructId> {
        let scopes = self.scope_registry().scopes_containing(theme);
        let sets = scopes
            .into_iter()
            .map(|s| self.index().scoped_of(kind, s))
            .collect();
        combine(sets, false).into_iter().collect()
    }

    /// Scopables of one kind matching several theme keys (union or
    /// intersection over the per-theme result sets).
    fn constructs_by_themes(
        &self,
        kind: ConstructKind,
        themes: &[ConstructId],
        match_all: bool,
    ) -> Vec<ConstructId> {
        let sets = themes
            .iter()
            .map(|&theme| {
                self.constructs_by_theme(kind, theme)
                    .into_iter()
                    .collect::<BTreeSet<_>>()
            })
            .collect();
        combine(sets, match_all).into_iter().collect()
    }

    /// Count variant of [`IndexOps::constructs_by_scope`].
    fn number_of_constructs_by_scope(&self, kind: ConstructKind, scope: ScopeId) -> usize {
        self.index().scoped_of(kind, scope).len()
    }

    /// All item-identifier bindings, ascending by locator.
    fn item_identifier_entries(&self) -> Vec<(Locator, ConstructId)> {
        self.identity().entries(IdentifierKind::Item)
    }

    /// All subject-identifier bindings, ascending by locator.
    fn subject_identifier_entries(&self) -> Vec<(Locator, ConstructId)> {
        self.identity().entries(IdentifierKind::Subject)
    }

    /// All subject-locator bindings, ascending by locator.
    fn subject_locator_entries(&self) -> Vec<(Locator, ConstructId)> {
        self.identity().entries(IdentifierKind::SubjectLocator)
    }

    /// Bindings of one namespace whose locator matches a regex pattern.
    fn identifiers_matching(
        &self,
        kind: IdentifierKind,
        pattern: &str,
    ) -> Result<Vec<(Locator, ConstructId)>, TopicMapError> {
        let re = Regex::new(pattern).map_err(|e| TopicMapError::InvalidPattern(e.to_string()))?;
        Ok(self
            .identity()
            .entries(kind)
            .into_iter()
            .filter(|(locator, _)| re.is_match(locator.as_str()))
            .collect())
    }

    /// Direct supertypes of a topic.
    fn supertypes_of(&self, topic: ConstructId) -> Vec<ConstructId> {
        self.index().direct_supertypes(topic).into_iter().collect()
    }

    /// Direct subtypes of a topic.
    fn subtypes_of(&self, topic: ConstructId) -> Vec<ConstructId> {
        self.index().direct_subtypes(topic).into_iter().collect()
    }

    /// Transitive supertype closure. The supertype graph may contain
    /// cycles, so reachability carries a visited set; a topic is never
    /// revisited, and the start topic appears in its own closure only when
    /// a cycle leads back to it.
    fn supertypes_closure_of(&self, topic: ConstructId) -> BTreeSet<ConstructId> {
        closure(topic, |id| self.index().direct_supertypes(id))
    }

    /// Transitive subtype closure, with the same cycle protection.
    fn subtypes_closure_of(&self, topic: ConstructId) -> BTreeSet<ConstructId> {
        closure(topic, |id| self.index().direct_subtypes(id))
    }

    /// Rebuild the identity registry and every index table from the
    /// construct arena. Safe to call when the index is already consistent
    /// (idempotent); intended for out-of-band maintenance and for
    /// snapshot restore.
    fn reindex(&mut self) -> Result<(), TopicMapError> {
        use crate::types::Construct;

        self.identity_mut().clear();
        self.index_mut().clear();

        for id in self.live_ids() {
            let construct = self.construct(id)?.clone();
            for locator in construct.item_identifiers() {
                self.identity_mut()
                    .bind(IdentifierKind::Item, locator.clone(), id);
            }
            match &construct {
                Construct::Topic(topic) => {
                    for locator in &topic.subject_identifiers {
                        self.identity_mut()
                            .bind(IdentifierKind::Subject, locator.clone(), id);
                    }
                    for locator in &topic.subject_locators {
                        self.identity_mut()
                            .bind(IdentifierKind::SubjectLocator, locator.clone(), id);
                    }
                    for &type_id in &topic.types {
                        self.index_mut()
                            .insert_typed(ConstructKind::Topic, type_id, id);
                    }
                    for &sup in &topic.supertypes {
                        self.index_mut().add_supertype_edge(id, sup);
                    }
                }
                Construct::Name(name) => {
                    self.index_mut()
                        .insert_typed(ConstructKind::Name, name.name_type, id);
                    self.index_mut()
                        .insert_scoped(ConstructKind::Name, name.scope, id);
                }
                Construct::Occurrence(occurrence) => {
                    self.index_mut().insert_typed(
                        ConstructKind::Occurrence,
                        occurrence.occurrence_type,
                        id,
                    );
                    self.index_mut()
                        .insert_scoped(ConstructKind::Occurrence, occurrence.scope, id);
                }
                Construct::Variant(variant) => {
                    self.index_mut()
                        .insert_scoped(ConstructKind::Variant, variant.scope, id);
                }
                Construct::Association(association) => {
                    self.index_mut().insert_typed(
                        ConstructKind::Association,
                        association.association_type,
                        id,
                    );
                    self.index_mut().insert_scoped(
                        ConstructKind::Association,
                        association.scope,
                        id,
                    );
                }
                Construct::Role(role) => {
                    self.index_mut()
                        .insert_typed(ConstructKind::Role, role.role_type, id);
                }
                Construct::TopicMap(_) => {}
            }
        }
        Ok(())
    }
}

impl<V: TopicMapView> IndexOps for V {}

/// Cycle-guarded reachability over a neighbor function.
fn closure<F>(start: ConstructId, mut neighbors: F) -> BTreeSet<ConstructId>
where
    F: FnMut(ConstructId) -> BTreeSet<ConstructId>,
{
    let mut visited: BTreeSet<ConstructId> = BTreeSet::new();
    let mut stack: Vec<ConstructId> = neighbors(start).into_iter().collect();
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        for next in neighbors(current) {
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }
    visited
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u64]) -> BTreeSet<ConstructId> {
        ids.iter().map(|&i| ConstructId(i)).collect()
    }

    #[test]
    fn combine_union_and_intersection() {
        let sets = vec![set(&[1, 2, 3]), set(&[2, 3, 4])];
        assert_eq!(combine(sets.clone(), false), set(&[1, 2, 3, 4]));
        assert_eq!(combine(sets, true), set(&[2, 3]));
    }

    #[test]
    fn combine_empty_input_is_empty() {
        assert_eq!(combine(Vec::new(), false), BTreeSet::new());
        assert_eq!(combine(Vec::new(), true), BTreeSet::new());
    }

    #[test]
    fn paged_applies_ordering_then_window() {
        let items = vec![ConstructId(3), ConstructId(1), ConstructId(2), ConstructId(4)];
        let page = paged(items, 1, 2, |a, b| a.cmp(b));
        assert_eq!(page, vec![ConstructId(2), ConstructId(3)]);
    }

    #[test]
    fn typed_entries_insert_and_remove() {
        let mut index = IndexManager::new();
        index.insert_typed(ConstructKind::Topic, ConstructId(10), ConstructId(1));
        index.insert_typed(ConstructKind::Topic, ConstructId(10), ConstructId(2));
        assert_eq!(index.typed_of(ConstructKind::Topic, ConstructId(10)), set(&[1, 2]));

        index.remove_typed(ConstructKind::Topic, ConstructId(10), ConstructId(1));
        assert_eq!(index.typed_of(ConstructKind::Topic, ConstructId(10)), set(&[2]));

        // Kinds without a type index are no-ops.
        index.insert_typed(ConstructKind::Variant, ConstructId(10), ConstructId(3));
        assert_eq!(index.typed_of(ConstructKind::Variant, ConstructId(10)), set(&[]));
    }

    #[test]
    fn supertype_edges_maintain_inverse() {
        let mut index = IndexManager::new();
        index.add_supertype_edge(ConstructId(1), ConstructId(2));
        assert_eq!(index.direct_supertypes(ConstructId(1)), set(&[2]));
        assert_eq!(index.direct_subtypes(ConstructId(2)), set(&[1]));

        index.remove_supertype_edge(ConstructId(1), ConstructId(2));
        assert!(index.direct_supertypes(ConstructId(1)).is_empty());
        assert!(index.direct_subtypes(ConstructId(2)).is_empty());
    }

    #[test]
    fn closure_survives_cycles() {
        let mut index = IndexManager::new();
        // 1 -> 2 -> 3 -> 1 (cycle)
        index.add_supertype_edge(ConstructId(1), ConstructId(2));
        index.add_supertype_edge(ConstructId(2), ConstructId(3));
        index.add_supertype_edge(ConstructId(3), ConstructId(1));

        let reachable = closure(ConstructId(1), |id| index.direct_supertypes(id));
        // The cycle leads back to the start, so it appears in its own closure.
        assert_eq!(reachable, set(&[1, 2, 3]));
    }
}

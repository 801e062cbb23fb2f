//! # Scope Registry
//!
//! Interns theme sets into canonical scope identities.
//!
//! A scope is an immutable set of topic ids ("themes"). Two requests with
//! equal membership (order irrelevant) resolve to the same [`ScopeId`];
//! the empty set is the distinguished unconstrained singleton and is never
//! otherwise created. Adding or removing a theme on a scopable never
//! mutates a scope object: the resulting set is re-interned and the
//! scopable is repointed.

use crate::graph::TopicMapView;
use crate::types::{ConstructId, ScopeId, TopicMapError};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SCOPE REGISTRY
// =============================================================================

/// Owns the canonical scope table: theme sets keyed both ways.
///
/// Uses `BTreeMap` exclusively for deterministic enumeration. The canonical
/// key of a scope is its sorted theme-id sequence, so exact-membership
/// lookup is a single map probe, never a scan.
#[derive(Debug, Clone)]
pub struct ScopeRegistry {
    /// ScopeId -> member themes. Authoritative.
    themes_by_scope: BTreeMap<ScopeId, BTreeSet<ConstructId>>,
    /// Sorted theme ids -> ScopeId. Derived, kept in lockstep.
    scope_by_key: BTreeMap<Vec<ConstructId>, ScopeId>,
    /// Next scope id to allocate.
    next_scope_id: u64,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry {
    /// Create a registry holding only the unconstrained scope.
    #[must_use]
    pub fn new() -> Self {
        let mut themes_by_scope = BTreeMap::new();
        themes_by_scope.insert(ScopeId::UNCONSTRAINED, BTreeSet::new());
        let mut scope_by_key = BTreeMap::new();
        scope_by_key.insert(Vec::new(), ScopeId::UNCONSTRAINED);
        Self {
            themes_by_scope,
            scope_by_key,
            next_scope_id: 1,
        }
    }

    /// Return the canonical scope for an unordered theme set, creating it
    /// if no scope with exactly that membership exists.
    pub fn intern(&mut self, themes: &BTreeSet<ConstructId>) -> ScopeId {
        if themes.is_empty() {
            return ScopeId::UNCONSTRAINED;
        }
        // BTreeSet iteration is already ascending, so the collected key is
        // the canonical sorted form.
        let key: Vec<ConstructId> = themes.iter().copied().collect();
        if let Some(&existing) = self.scope_by_key.get(&key) {
            return existing;
        }
        let id = ScopeId(self.next_scope_id);
        self.next_scope_id += 1;
        self.themes_by_scope.insert(id, themes.clone());
        self.scope_by_key.insert(key, id);
        id
    }

    /// Member themes of a scope. Unknown ids report as empty.
    #[must_use]
    pub fn themes(&self, scope: ScopeId) -> BTreeSet<ConstructId> {
        self.themes_by_scope.get(&scope).cloned().unwrap_or_default()
    }

    /// Whether a scope contains the given theme.
    #[must_use]
    pub fn contains_theme(&self, scope: ScopeId, theme: ConstructId) -> bool {
        self.themes_by_scope
            .get(&scope)
            .is_some_and(|s| s.contains(&theme))
    }

    /// Every scope containing the given theme, ascending by id.
    #[must_use]
    pub fn scopes_containing(&self, theme: ConstructId) -> Vec<ScopeId> {
        self.themes_by_scope
            .iter()
            .filter(|(_, themes)| themes.contains(&theme))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Drop a scope whose referents have all been repointed elsewhere.
    ///
    /// The unconstrained singleton is never dropped.
    pub fn retire(&mut self, scope: ScopeId) {
        if scope.is_unconstrained() {
            return;
        }
        if let Some(themes) = self.themes_by_scope.remove(&scope) {
            let key: Vec<ConstructId> = themes.iter().copied().collect();
            self.scope_by_key.remove(&key);
        }
    }

    /// Number of interned scopes (including the unconstrained singleton).
    #[must_use]
    pub fn len(&self) -> usize {
        self.themes_by_scope.len()
    }

    /// Whether only the unconstrained singleton exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.themes_by_scope.len() <= 1
    }

    /// Snapshot rows for the persistence layer.
    #[must_use]
    pub fn entries(&self) -> Vec<(ScopeId, Vec<ConstructId>)> {
        self.themes_by_scope
            .iter()
            .map(|(&id, themes)| (id, themes.iter().copied().collect()))
            .collect()
    }

    /// Rebuild a registry from snapshot rows.
    ///
    /// The derived key map and the id watermark are recomputed; the
    /// unconstrained singleton is restored even if absent from the rows.
    #[must_use]
    pub fn from_entries(entries: Vec<(ScopeId, Vec<ConstructId>)>) -> Self {
        let mut registry = Self::new();
        for (id, themes) in entries {
            if id.is_unconstrained() {
                continue;
            }
            let set: BTreeSet<ConstructId> = themes.into_iter().collect();
            let key: Vec<ConstructId> = set.iter().copied().collect();
            registry.scope_by_key.insert(key, id);
            registry.themes_by_scope.insert(id, set);
            if id.0 >= registry.next_scope_id {
                registry.next_scope_id = id.0 + 1;
            }
        }
        registry
    }
}

// =============================================================================
// SCOPE OPERATIONS
// =============================================================================

/// Scope operations available on any topic-map view (base or transaction).
pub trait ScopeOps: TopicMapView + Sized {
    /// Canonical scope id of a scoped construct.
    fn scope_of(&self, id: ConstructId) -> Result<ScopeId, TopicMapError> {
        let construct = self.construct(id)?;
        construct.scope().ok_or(TopicMapError::WrongKind {
            id,
            expected: "scoped construct",
            actual: construct.kind(),
        })
    }

    /// Member themes of a scoped construct's scope.
    fn themes_of(&self, id: ConstructId) -> Result<BTreeSet<ConstructId>, TopicMapError> {
        let scope = self.scope_of(id)?;
        Ok(self.scope_registry().themes(scope))
    }

    /// Add a theme to a scopable, repointing it at the canonical scope for
    /// the enlarged set. Adding a theme already present is a no-op that
    /// returns the unchanged scope.
    fn add_theme(
        &mut self,
        scopable: ConstructId,
        theme: ConstructId,
    ) -> Result<ScopeId, TopicMapError> {
        self.ensure_topic(theme)?;
        let old = self.scope_of(scopable)?;
        let mut themes = self.scope_registry().themes(old);
        if !themes.insert(theme) {
            return Ok(old);
        }
        let new = self.scope_registry_mut().intern(&themes);
        self.repoint_scope(scopable, old, new)?;
        Ok(new)
    }

    /// Remove a theme from a scopable, repointing it at the canonical scope
    /// for the shrunken set. Removing a theme not present is a no-op that
    /// returns the unchanged scope; removing the last theme yields the
    /// unconstrained singleton.
    fn remove_theme(
        &mut self,
        scopable: ConstructId,
        theme: ConstructId,
    ) -> Result<ScopeId, TopicMapError> {
        let old = self.scope_of(scopable)?;
        let mut themes = self.scope_registry().themes(old);
        if !themes.remove(&theme) {
            return Ok(old);
        }
        let new = self.scope_registry_mut().intern(&themes);
        self.repoint_scope(scopable, old, new)?;
        Ok(new)
    }

    /// Repoint a scopable from one canonical scope to another, keeping the
    /// scope index in lockstep.
    #[doc(hidden)]
    fn repoint_scope(
        &mut self,
        scopable: ConstructId,
        old: ScopeId,
        new: ScopeId,
    ) -> Result<(), TopicMapError> {
        let kind = self.construct(scopable)?.kind();
        self.construct_mut(scopable)?.set_scope(new);
        self.index_mut().move_scoped(kind, old, new, scopable);
        Ok(())
    }

    /// Validate that an id addresses a live topic.
    #[doc(hidden)]
    fn ensure_topic(&self, id: ConstructId) -> Result<(), TopicMapError> {
        let construct = self.construct(id)?;
        if construct.as_topic().is_some() {
            Ok(())
        } else {
            Err(TopicMapError::WrongKind {
                id,
                expected: "topic",
                actual: construct.kind(),
            })
        }
    }
}

impl<V: TopicMapView> ScopeOps for V {}

// =============================================================================
// TESTS
// =============================================================================

//! # Merge Engine
//!
//! Fuses two topics that have been determined to represent the same
//! subject. The target absorbs the source: identifiers, types, supertype
//! edges, theme usages, played roles, characteristics, and reification all
//! move to the target, and the source id is retired forever.
//!
//! Equal characteristics (same type, value, datatype, and scope after the
//! source is rewritten to the target) are fused into one, never
//! duplicated. Irreconcilable singleton properties are detected *before*
//! any mutation: if both topics reify constructs, or two characteristics
//! that would fuse are reified by different topics, the merge fails with
//! [`TopicMapError::MergeConflict`] and the graph is untouched.

use crate::graph::{ConstructOps, TopicMapView};
use crate::identity::IdentityOps;
use crate::scope::ScopeOps;
use crate::types::{
    Construct, ConstructId, ConstructKind, IdentifierKind, Locator, Name, Occurrence, ScopeId,
    TopicMapError, Variant,
};
use std::collections::BTreeMap;

/// Post-rewrite fusion key of a name: type, value, scope.
type NameSig = (ConstructId, String, ScopeId);
/// Post-rewrite fusion key of an occurrence: type, value, datatype, scope.
type OccSig = (ConstructId, String, Locator, ScopeId);
/// Fusion key of a variant: value, datatype, scope.
type VarSig = (String, Locator, ScopeId);

/// Pre-mutation fusion key: scope expressed as a substituted theme list so
/// it can be compared before any scope is re-interned.
type PreSig = (ConstructId, String, Option<Locator>, Vec<ConstructId>);

// =============================================================================
// MERGE OPERATIONS
// =============================================================================

/// Topic merging on any topic-map view.
pub trait MergeOps: TopicMapView + Sized {
    /// Merge `source` into `target`. Merging a topic with itself is a
    /// no-op. On success the source id reports
    /// [`TopicMapError::ConstructRemoved`] forever; on failure nothing
    /// has changed.
    fn merge_in(
        &mut self,
        target: ConstructId,
        source: ConstructId,
    ) -> Result<(), TopicMapError> {
        if target == source {
            return Ok(());
        }
        let source_rec = self.topic_checked(source)?.clone();
        let target_rec = self.topic_checked(target)?.clone();

        // ---- conflict detection, strictly before mutation ----
        if target_rec.reified.is_some() && source_rec.reified.is_some() {
            return Err(TopicMapError::MergeConflict {
                first: target,
                second: source,
            });
        }
        self.check_fusion_conflicts(target, source)?;

        // ---- identifiers ----
        for locator in &source_rec.item_identifiers {
            self.identity_mut()
                .bind(IdentifierKind::Item, locator.clone(), target);
        }
        for locator in &source_rec.subject_identifiers {
            self.identity_mut()
                .bind(IdentifierKind::Subject, locator.clone(), target);
        }
        for locator in &source_rec.subject_locators {
            self.identity_mut()
                .bind(IdentifierKind::SubjectLocator, locator.clone(), target);
        }
        {
            let record = self.topic_mut_checked(target)?;
            record
                .item_identifiers
                .extend(source_rec.item_identifiers.iter().cloned());
            record
                .subject_identifiers
                .extend(source_rec.subject_identifiers.iter().cloned());
            record
                .subject_locators
                .extend(source_rec.subject_locators.iter().cloned());
        }

        // ---- types the source carries ----
        for &type_id in &source_rec.types {
            self.index_mut()
                .remove_typed(ConstructKind::Topic, type_id, source);
            let mapped = if type_id == source { target } else { type_id };
            if self.topic_mut_checked(target)?.types.insert(mapped) {
                self.index_mut()
                    .insert_typed(ConstructKind::Topic, mapped, target);
            }
        }

        // ---- constructs typed by the source ----
        for instance in self.index().typed_of(ConstructKind::Topic, source) {
            if instance != source && self.is_live(instance) {
                self.remove_topic_type(instance, source)?;
                self.add_topic_type(instance, target)?;
            }
        }
        for kind in [
            ConstructKind::Name,
            ConstructKind::Occurrence,
            ConstructKind::Association,
            ConstructKind::Role,
        ] {
            for typed in self.index().typed_of(kind, source) {
                if self.is_live(typed) {
                    self.set_type(typed, target)?;
                }
            }
        }

        // ---- supertype edges, both directions ----
        for &sup in &source_rec.supertypes {
            self.index_mut().remove_supertype_edge(source, sup);
            let mapped = if sup == source { target } else { sup };
            if mapped != target {
                self.add_supertype(target, mapped)?;
            }
        }
        for sub in self.index().direct_subtypes(source) {
            self.index_mut().remove_supertype_edge(sub, source);
            if sub == source || !self.is_live(sub) {
                continue;
            }
            if let Ok(construct) = self.construct_mut(sub) {
                if let Some(topic) = construct.as_topic_mut() {
                    topic.supertypes.remove(&source);
                }
            }
            if sub != target {
                self.add_supertype(sub, target)?;
            }
        }

        // ---- the source as a theme ----
        for scope in self.scope_registry().scopes_containing(source) {
            let mut themes = self.scope_registry().themes(scope);
            themes.remove(&source);
            themes.insert(target);
            let new_scope = self.scope_registry_mut().intern(&themes);
            for kind in [
                ConstructKind::Name,
                ConstructKind::Occurrence,
                ConstructKind::Variant,
                ConstructKind::Association,
            ] {
                for scopable in self.index().scoped_of(kind, scope) {
                    self.repoint_scope(scopable, scope, new_scope)?;
                }
            }
            self.scope_registry_mut().retire(scope);
        }

        // ---- roles the source plays ----
        for &role in &source_rec.roles_played {
            if !self.is_live(role) {
                continue;
            }
            if let Construct::Role(record) = self.construct_mut(role)? {
                record.player = target;
            }
            self.topic_mut_checked(target)?.roles_played.insert(role);
        }

        // ---- characteristics, fusing duplicates ----
        // Signatures are computed after the rewrites above, so equal scope
        // ids mean equal (rewritten) theme sets.
        let mut names_by_sig: BTreeMap<NameSig, ConstructId> = BTreeMap::new();
        for name in self.topic_checked(target)?.names.clone() {
            if let Some(record) = self.construct(name)?.as_name() {
                names_by_sig.insert(
                    (record.name_type, record.value.clone(), record.scope),
                    name,
                );
            }
        }
        for name in source_rec.names.iter().copied() {
            if !self.is_live(name) {
                continue;
            }
            let record = match self.construct(name)?.as_name() {
                Some(r) => r.clone(),
                None => continue,
            };
            let sig = (record.name_type, record.value.clone(), record.scope);
            if let Some(&keep) = names_by_sig.get(&sig) {
                self.fuse_name(keep, name, &record)?;
            } else {
                if let Some(mutable) = self.construct_mut(name)?.as_name_mut() {
                    mutable.parent = target;
                }
                self.topic_mut_checked(target)?.names.insert(name);
                names_by_sig.insert(sig, name);
            }
        }

        let mut occs_by_sig: BTreeMap<OccSig, ConstructId> = BTreeMap::new();
        for occ in self.topic_checked(target)?.occurrences.clone() {
            if let Some(record) = self.construct(occ)?.as_occurrence() {
                occs_by_sig.insert(
                    (
                        record.occurrence_type,
                        record.value.clone(),
                        record.datatype.clone(),
                        record.scope,
                    ),
                    occ,
                );
            }
        }
        for occ in source_rec.occurrences.iter().copied() {
            if !self.is_live(occ) {
                continue;
            }
            let record = match self.construct(occ)?.as_occurrence() {
                Some(r) => r.clone(),
                None => continue,
            };
            let sig = (
                record.occurrence_type,
                record.value.clone(),
                record.datatype.clone(),
                record.scope,
            );
            if let Some(&keep) = occs_by_sig.get(&sig) {
                self.fuse_occurrence(keep, occ, &record)?;
            } else {
                if let Construct::Occurrence(mutable) = self.construct_mut(occ)? {
                    mutable.parent = target;
                }
                self.topic_mut_checked(target)?.occurrences.insert(occ);
                occs_by_sig.insert(sig, occ);
            }
        }

        // ---- reification ----
        // Read the live record, not the pre-merge clone: if the source
        // reified one of its own characteristics and that characteristic
        // just fused into a target duplicate, the fusion repointed the
        // reference to the survivor.
        if let Some(reified) = self.topic_checked(source)?.reified {
            self.topic_mut_checked(target)?.reified = Some(reified);
            if let Ok(construct) = self.construct_mut(reified) {
                construct.set_reifier_slot(Some(target));
            }
        }

        self.retire_construct(source);
        Ok(())
    }

    /// Detect reifier conflicts between characteristics that would fuse.
    /// Runs before any mutation; errors here leave the graph untouched.
    #[doc(hidden)]
    fn check_fusion_conflicts(
        &self,
        target: ConstructId,
        source: ConstructId,
    ) -> Result<(), TopicMapError> {
        let target_rec = self.topic_checked(target)?;
        let source_rec = self.topic_checked(source)?;

        let mut target_names: BTreeMap<PreSig, &Name> = BTreeMap::new();
        for &name in &target_rec.names {
            if let Some(record) = self.construct(name)?.as_name() {
                target_names.insert(self.pre_sig_name(record, source, target), record);
            }
        }
        for &name in &source_rec.names {
            let Some(record) = self.construct(name)?.as_name() else {
                continue;
            };
            let sig = self.pre_sig_name(record, source, target);
            let Some(kept) = target_names.get(&sig) else {
                continue;
            };
            if kept.reifier.is_some() && record.reifier.is_some() && kept.reifier != record.reifier
            {
                return Err(TopicMapError::MergeConflict {
                    first: target,
                    second: source,
                });
            }
            // Variants of fusing names can collide too.
            let mut kept_variants: BTreeMap<PreSig, &Variant> = BTreeMap::new();
            for &variant in &kept.variants {
                if let Some(v) = self.construct(variant)?.as_variant() {
                    kept_variants.insert(self.pre_sig_variant(v, source, target), v);
                }
            }
            for &variant in &record.variants {
                let Some(v) = self.construct(variant)?.as_variant() else {
                    continue;
                };
                if let Some(kv) = kept_variants.get(&self.pre_sig_variant(v, source, target)) {
                    if kv.reifier.is_some() && v.reifier.is_some() && kv.reifier != v.reifier {
                        return Err(TopicMapError::MergeConflict {
                            first: target,
                            second: source,
                        });
                    }
                }
            }
        }

        let mut target_occs: BTreeMap<PreSig, &Occurrence> = BTreeMap::new();
        for &occ in &target_rec.occurrences {
            if let Some(record) = self.construct(occ)?.as_occurrence() {
                target_occs.insert(self.pre_sig_occurrence(record, source, target), record);
            }
        }
        for &occ in &source_rec.occurrences {
            let Some(record) = self.construct(occ)?.as_occurrence() else {
                continue;
            };
            if let Some(kept) = target_occs.get(&self.pre_sig_occurrence(record, source, target)) {
                if kept.reifier.is_some()
                    && record.reifier.is_some()
                    && kept.reifier != record.reifier
                {
                    return Err(TopicMapError::MergeConflict {
                        first: target,
                        second: source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Theme list of a scope with `from` substituted by `to`, for
    /// pre-mutation signature comparison.
    #[doc(hidden)]
    fn substituted_themes(
        &self,
        scope: ScopeId,
        from: ConstructId,
        to: ConstructId,
    ) -> Vec<ConstructId> {
        let mut themes = self.scope_registry().themes(scope);
        if themes.remove(&from) {
            themes.insert(to);
        }
        themes.into_iter().collect()
    }

    #[doc(hidden)]
    fn pre_sig_name(&self, record: &Name, from: ConstructId, to: ConstructId) -> PreSig {
        let type_id = if record.name_type == from { to } else { record.name_type };
        (
            type_id,
            record.value.clone(),
            None,
            self.substituted_themes(record.scope, from, to),
        )
    }

    #[doc(hidden)]
    fn pre_sig_occurrence(&self, record: &Occurrence, from: ConstructId, to: ConstructId) -> PreSig {
        let type_id = if record.occurrence_type == from {
            to
        } else {
            record.occurrence_type
        };
        (
            type_id,
            record.value.clone(),
            Some(record.datatype.clone()),
            self.substituted_themes(record.scope, from, to),
        )
    }

    #[doc(hidden)]
    fn pre_sig_variant(&self, record: &Variant, from: ConstructId, to: ConstructId) -> PreSig {
        (
            ConstructId(0),
            record.value.clone(),
            Some(record.datatype.clone()),
            self.substituted_themes(record.scope, from, to),
        )
    }

    /// Fuse a duplicate name into the kept one: union item identifiers,
    /// merge variants, transfer reification, retire the duplicate.
    #[doc(hidden)]
    fn fuse_name(
        &mut self,
        keep: ConstructId,
        dup: ConstructId,
        dup_rec: &Name,
    ) -> Result<(), TopicMapError> {
        for locator in &dup_rec.item_identifiers {
            self.identity_mut()
                .bind(IdentifierKind::Item, locator.clone(), keep);
            if let Some(record) = self.construct_mut(keep)?.as_name_mut() {
                record.item_identifiers.insert(locator.clone());
            }
        }

        let mut variants_by_sig: BTreeMap<VarSig, ConstructId> = BTreeMap::new();
        let keep_variants = self
            .construct(keep)?
            .as_name()
            .map(|n| n.variants.clone())
            .unwrap_or_default();
        for variant in keep_variants {
            if let Some(record) = self.construct(variant)?.as_variant() {
                variants_by_sig.insert(
                    (record.value.clone(), record.datatype.clone(), record.scope),
                    variant,
                );
            }
        }
        for variant in dup_rec.variants.iter().copied() {
            if !self.is_live(variant) {
                continue;
            }
            let record = match self.construct(variant)?.as_variant() {
                Some(r) => r.clone(),
                None => continue,
            };
            let sig = (record.value.clone(), record.datatype.clone(), record.scope);
            if let Some(&kept) = variants_by_sig.get(&sig) {
                self.fuse_variant(kept, variant, &record)?;
            } else {
                if let Construct::Variant(mutable) = self.construct_mut(variant)? {
                    mutable.parent = keep;
                }
                if let Some(record) = self.construct_mut(keep)?.as_name_mut() {
                    record.variants.insert(variant);
                }
                variants_by_sig.insert(sig, variant);
            }
        }

        self.transfer_reifier(keep, dup_rec.reifier)?;
        self.index_mut()
            .remove_typed(ConstructKind::Name, dup_rec.name_type, dup);
        self.index_mut()
            .remove_scoped(ConstructKind::Name, dup_rec.scope, dup);
        self.retire_construct(dup);
        Ok(())
    }

    /// Fuse a duplicate occurrence into the kept one.
    #[doc(hidden)]
    fn fuse_occurrence(
        &mut self,
        keep: ConstructId,
        dup: ConstructId,
        dup_rec: &Occurrence,
    ) -> Result<(), TopicMapError> {
        for locator in &dup_rec.item_identifiers {
            self.identity_mut()
                .bind(IdentifierKind::Item, locator.clone(), keep);
            self.construct_mut(keep)?
                .item_identifiers_mut()
                .insert(locator.clone());
        }
        self.transfer_reifier(keep, dup_rec.reifier)?;
        self.index_mut()
            .remove_typed(ConstructKind::Occurrence, dup_rec.occurrence_type, dup);
        self.index_mut()
            .remove_scoped(ConstructKind::Occurrence, dup_rec.scope, dup);
        self.retire_construct(dup);
        Ok(())
    }

    /// Fuse a duplicate variant into the kept one.
    #[doc(hidden)]
    fn fuse_variant(
        &mut self,
        keep: ConstructId,
        dup: ConstructId,
        dup_rec: &Variant,
    ) -> Result<(), TopicMapError> {
        for locator in &dup_rec.item_identifiers {
            self.identity_mut()
                .bind(IdentifierKind::Item, locator.clone(), keep);
            self.construct_mut(keep)?
                .item_identifiers_mut()
                .insert(locator.clone());
        }
        self.transfer_reifier(keep, dup_rec.reifier)?;
        self.index_mut()
            .remove_scoped(ConstructKind::Variant, dup_rec.scope, dup);
        self.retire_construct(dup);
        Ok(())
    }

    /// Move a duplicate's reifier onto the survivor. Conflicts were ruled
    /// out before mutation started, so either slot is free here.
    #[doc(hidden)]
    fn transfer_reifier(
        &mut self,
        keep: ConstructId,
        reifier: Option<ConstructId>,
    ) -> Result<(), TopicMapError> {
        let Some(topic) = reifier else {
            return Ok(());
        };
        if self.construct(keep)?.reifier().is_none() {
            self.construct_mut(keep)?.set_reifier_slot(Some(topic));
            if let Ok(construct) = self.construct_mut(topic) {
                if let Some(record) = construct.as_topic_mut() {
                    record.reified = Some(keep);
                }
            }
        }
        Ok(())
    }
}

impl<V: TopicMapView> MergeOps for V {}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TopicMap;
    use crate::index::IndexOps;

    #[test]
    fn merge_with_self_is_noop() {
        let mut map = TopicMap::new();
        let topic = map.create_topic();
        map.merge_in(topic, topic).expect("merge in");
        assert!(map.is_live(topic));
    }

    #[test]
    fn merge_unions_identifiers_and_retires_source() {
        let mut map = TopicMap::new();
        map.set_auto_merge(false);
        let target = map.create_topic();
        let source = map.create_topic();
        let si_t = Locator::new("http://ex/t");
        let si_s = Locator::new("http://ex/s");
        map.add_subject_identifier(target, si_t.clone()).expect("add subject identifier");
        map.add_subject_identifier(source, si_s.clone()).expect("add subject identifier");

        map.merge_in(target, source).expect("merge in");
        assert!(!map.is_live(source));
        assert!(matches!(
            map.construct(source),
            Err(TopicMapError::ConstructRemoved(_))
        ));
        // Both identifiers now resolve to the survivor.
        assert_eq!(map.topic_by_subject_identifier(&si_t), Some(target));
        assert_eq!(map.topic_by_subject_identifier(&si_s), Some(target));
    }

    #[test]
    fn equal_names_fuse_into_one() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let ntype = map.create_topic();
        let kept = map.create_name(target, ntype, "Alice", &[]).expect("create name");
        let dup = map.create_name(source, ntype, "Alice", &[]).expect("create name");
        let ii = Locator::new("http://ex/name-ii");
        map.add_item_identifier(dup, ii.clone()).expect("add item identifier");

        map.merge_in(target, source).expect("merge in");
        let names = map.names_of(target).expect("names of");
        assert_eq!(names, vec![kept]);
        assert!(!map.is_live(dup));
        // The duplicate's item identifier moved to the survivor.
        assert_eq!(map.construct_by_item_identifier(&ii), Some(kept));
    }

    #[test]
    fn distinct_names_are_both_kept() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let ntype = map.create_topic();
        map.create_name(target, ntype, "Alice", &[]).expect("create name");
        map.create_name(source, ntype, "Alicia", &[]).expect("create name");

        map.merge_in(target, source).expect("merge in");
        assert_eq!(map.names_of(target).expect("names of").len(), 2);
    }

    #[test]
    fn reifier_conflict_aborts_without_mutation() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let atype = map.create_topic();
        let assoc_a = map.create_association(atype, &[]).expect("create association");
        let assoc_b = map.create_association(atype, &[]).expect("create association");
        map.set_reifier(assoc_a, Some(target)).expect("set reifier");
        map.set_reifier(assoc_b, Some(source)).expect("set reifier");
        let si = Locator::new("http://ex/s");
        map.add_subject_identifier(source, si.clone()).expect("add subject identifier");

        assert!(matches!(
            map.merge_in(target, source),
            Err(TopicMapError::MergeConflict { .. })
        ));
        // Nothing moved: the source is intact with its identifier.
        assert!(map.is_live(source));
        assert_eq!(map.topic_by_subject_identifier(&si), Some(source));
        assert_eq!(map.reified_by(source).expect("reified by"), Some(assoc_b));
    }

    #[test]
    fn duplicate_characteristic_reifier_conflict_aborts() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let ntype = map.create_topic();
        let r1 = map.create_topic();
        let r2 = map.create_topic();
        let n1 = map.create_name(target, ntype, "Alice", &[]).expect("create name");
        let n2 = map.create_name(source, ntype, "Alice", &[]).expect("create name");
        map.set_reifier(n1, Some(r1)).expect("set reifier");
        map.set_reifier(n2, Some(r2)).expect("set reifier");

        assert!(matches!(
            map.merge_in(target, source),
            Err(TopicMapError::MergeConflict { .. })
        ));
        assert!(map.is_live(source));
        assert!(map.is_live(n2));
    }

    #[test]
    fn merge_rewrites_source_as_theme() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let topic = map.create_topic();
        let ntype = map.create_topic();
        let name = map.create_name(topic, ntype, "n", &[source]).expect("create name");

        map.merge_in(target, source).expect("merge in");
        let scope = map.construct(name).expect("construct").scope().expect("scope");
        let themes = map.scope_registry().themes(scope);
        assert!(themes.contains(&target));
        assert!(!themes.contains(&source));
    }

    #[test]
    fn merge_rewrites_source_as_type_and_player() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let other = map.create_topic();
        let occ = map.create_occurrence(other, source, "x", None, &[]).expect("create occurrence");
        let atype = map.create_topic();
        let rtype = map.create_topic();
        let assoc = map.create_association(atype, &[]).expect("create association");
        let role = map.create_role(assoc, rtype, source).expect("create role");

        map.merge_in(target, source).expect("merge in");
        let occ_rec = map.construct(occ).expect("construct").as_occurrence().expect("as occurrence").clone();
        assert_eq!(occ_rec.occurrence_type, target);
        let role_rec = map.construct(role).expect("construct").as_role().expect("as role").clone();
        assert_eq!(role_rec.player, target);
        assert!(map.roles_played_by(target).expect("roles played by").contains(&role));
    }

    #[test]
    fn merge_transfers_reification() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let atype = map.create_topic();
        let assoc = map.create_association(atype, &[]).expect("create association");
        map.set_reifier(assoc, Some(source)).expect("set reifier");

        map.merge_in(target, source).expect("merge in");
        assert_eq!(map.reifier_of(assoc).expect("reifier of"), Some(target));
        assert_eq!(map.reified_by(target).expect("reified by"), Some(assoc));
    }

    #[test]
    fn merge_repoints_reification_onto_the_fused_survivor() {
        let mut map = TopicMap::new();
        map.set_auto_merge(false);
        let ntype = map.create_topic();
        let target = map.create_topic();
        let source = map.create_topic();
        let kept = map.create_name(target, ntype, "shared", &[]).expect("name");
        let doomed = map.create_name(source, ntype, "shared", &[]).expect("name");
        // The source reifies its own name, which fuses into the target's
        // duplicate during the merge.
        map.set_reifier(doomed, Some(source)).expect("set reifier");

        map.merge_in(target, source).expect("merge");

        assert!(!map.is_live(doomed));
        assert!(!map.is_live(source));
        // The link survived the fusion and names only live constructs.
        assert_eq!(map.reifier_of(kept).expect("reifier"), Some(target));
        assert_eq!(map.reified_by(target).expect("reified"), Some(kept));
    }

    #[test]
    fn merge_repoints_reification_of_a_moved_characteristic() {
        let mut map = TopicMap::new();
        map.set_auto_merge(false);
        let ntype = map.create_topic();
        let target = map.create_topic();
        let source = map.create_topic();
        let moved = map.create_name(source, ntype, "only", &[]).expect("name");
        map.set_reifier(moved, Some(source)).expect("set reifier");

        map.merge_in(target, source).expect("merge");

        assert!(map.is_live(moved));
        assert_eq!(map.reifier_of(moved).expect("reifier"), Some(target));
        assert_eq!(map.reified_by(target).expect("reified"), Some(moved));
    }

    #[test]
    fn merge_moves_supertype_edges() {
        let mut map = TopicMap::new();
        let target = map.create_topic();
        let source = map.create_topic();
        let sup = map.create_topic();
        let sub = map.create_topic();
        map.add_supertype(source, sup).expect("add supertype");
        map.add_supertype(sub, source).expect("add supertype");

        map.merge_in(target, source).expect("merge in");
        assert!(map.supertypes_of(target).contains(&sup));
        assert!(map.supertypes_of(sub).contains(&target));
        assert!(!map.supertypes_of(sub).contains(&source));
    }

    #[test]
    fn auto_merge_triggers_on_subject_identifier_collision() {
        let mut map = TopicMap::new();
        let a = map.create_topic();
        let b = map.create_topic();
        let si = Locator::new("http://ex/shared");
        map.add_subject_identifier(a, si.clone()).expect("add subject identifier");
        // The topic receiving the identifier survives.
        map.add_subject_identifier(b, si.clone()).expect("add subject identifier");
        assert!(map.is_live(b));
        assert!(!map.is_live(a));
        assert_eq!(map.topic_by_subject_identifier(&si), Some(b));
    }

    #[test]
    fn disabled_auto_merge_reports_identity_constraint() {
        let mut map = TopicMap::new();
        map.set_auto_merge(false);
        let a = map.create_topic();
        let b = map.create_topic();
        let si = Locator::new("http://ex/shared");
        map.add_subject_identifier(a, si.clone()).expect("add subject identifier");
        let err = map.add_subject_identifier(b, si).expect_err("add subject identifier should fail");
        assert!(matches!(
            err,
            TopicMapError::IdentityConstraint {
                reporter,
                existing,
                ..
            } if reporter == b && existing == a
        ));
        assert!(map.is_live(a));
        assert!(map.is_live(b));
    }
}

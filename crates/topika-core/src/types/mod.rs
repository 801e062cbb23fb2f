//! # Core Type Definitions
//!
//! This module contains all model types for the Topika topic-map engine:
//! - Arena identifiers (`ConstructId`, `ScopeId`)
//! - Identifier references (`Locator`, `IdentifierKind`)
//! - Construct records (`Topic`, `Name`, `Occurrence`, `Variant`,
//!   `Association`, `Role`, `TopicMapInfo`) and the `Construct` tagged enum
//! - Error types (`TopicMapError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where used as keys, for deterministic ordering in
//!   `BTreeMap`/`BTreeSet`
//! - Carry `serde` derives for the persistence layer
//!
//! ## Capability split
//!
//! Constructs share narrow capabilities rather than a kind hierarchy:
//! every kind is identifiable (item identifiers), some kinds are scoped
//! (names, occurrences, variants, associations), and every non-topic kind
//! is reifiable. The accessors on [`Construct`] expose exactly these
//! capabilities; a `None` return means the kind does not carry the
//! capability at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ARENA IDENTIFIERS
// =============================================================================

/// Process-stable internal identifier of a construct within one topic map.
///
/// Ids are allocated densely from an arena and are never reassigned: once a
/// construct is removed or absorbed by a merge, its id is retired forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstructId(pub u64);

impl fmt::Display for ConstructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Canonical identity of an interned scope (a set of themes).
///
/// Two equal theme sets always resolve to the same `ScopeId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ScopeId(pub u64);

impl ScopeId {
    /// The distinguished unconstrained scope (the empty theme set).
    pub const UNCONSTRAINED: ScopeId = ScopeId(0);

    /// Whether this is the unconstrained scope singleton.
    #[must_use]
    pub const fn is_unconstrained(self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// LOCATORS
// =============================================================================

/// An identifier reference (IRI-shaped string), compared byte-wise.
///
/// Locators populate the three identifier namespaces: item identifiers,
/// subject identifiers, and subject locators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Locator(pub String);

impl Locator {
    /// Create a new locator from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three identifier namespaces a construct may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentifierKind {
    /// Unique across all constructs of a topic map.
    Item,
    /// Unique across topics only.
    Subject,
    /// Unique across topics only.
    SubjectLocator,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => f.write_str("item identifier"),
            Self::Subject => f.write_str("subject identifier"),
            Self::SubjectLocator => f.write_str("subject locator"),
        }
    }
}

// =============================================================================
// CONSTRUCT RECORDS
// =============================================================================

/// The root construct: owns every other construct transitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TopicMapInfo {
    /// Item identifiers addressing the map itself.
    pub item_identifiers: BTreeSet<Locator>,
    /// The base locator the map was created against, if any.
    pub base_locator: Option<Locator>,
    /// Topic reifying the map, if any.
    pub reifier: Option<ConstructId>,
}

/// A topic: a construct representing a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Topic {
    pub item_identifiers: BTreeSet<Locator>,
    pub subject_identifiers: BTreeSet<Locator>,
    pub subject_locators: BTreeSet<Locator>,
    /// Types of this topic (topic references).
    pub types: BTreeSet<ConstructId>,
    /// Direct supertypes. Cycles are tolerated, never rejected; traversals
    /// must carry a visited set.
    pub supertypes: BTreeSet<ConstructId>,
    /// Names owned by this topic.
    pub names: BTreeSet<ConstructId>,
    /// Occurrences owned by this topic.
    pub occurrences: BTreeSet<ConstructId>,
    /// Roles in which this topic is the player.
    pub roles_played: BTreeSet<ConstructId>,
    /// The construct this topic reifies, if any.
    pub reified: Option<ConstructId>,
}

/// A name characteristic of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub item_identifiers: BTreeSet<Locator>,
    /// Owning topic.
    pub parent: ConstructId,
    /// Name type (a topic).
    pub name_type: ConstructId,
    pub value: String,
    pub scope: ScopeId,
    /// Variants of this name.
    pub variants: BTreeSet<ConstructId>,
    pub reifier: Option<ConstructId>,
}

/// An occurrence characteristic of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub item_identifiers: BTreeSet<Locator>,
    /// Owning topic.
    pub parent: ConstructId,
    /// Occurrence type (a topic).
    pub occurrence_type: ConstructId,
    pub value: String,
    /// Datatype locator of the value.
    pub datatype: Locator,
    pub scope: ScopeId,
    pub reifier: Option<ConstructId>,
}

/// A variant of a name. Typed by convention of its parent name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub item_identifiers: BTreeSet<Locator>,
    /// Owning name.
    pub parent: ConstructId,
    pub value: String,
    pub datatype: Locator,
    pub scope: ScopeId,
    pub reifier: Option<ConstructId>,
}

/// An association between topics, owning its roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub item_identifiers: BTreeSet<Locator>,
    /// Association type (a topic).
    pub association_type: ConstructId,
    pub scope: ScopeId,
    /// Roles owned by this association.
    pub roles: BTreeSet<ConstructId>,
    pub reifier: Option<ConstructId>,
}

/// A role within an association, played by a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub item_identifiers: BTreeSet<Locator>,
    /// Owning association.
    pub parent: ConstructId,
    /// Role type (a topic).
    pub role_type: ConstructId,
    /// The topic playing this role.
    pub player: ConstructId,
    pub reifier: Option<ConstructId>,
}

// =============================================================================
// CONSTRUCT (TAGGED VARIANT)
// =============================================================================

/// Construct kind discriminant, used for error context and index routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstructKind {
    TopicMap,
    Topic,
    Name,
    Occurrence,
    Variant,
    Association,
    Role,
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TopicMap => "topic map",
            Self::Topic => "topic",
            Self::Name => "name",
            Self::Occurrence => "occurrence",
            Self::Variant => "variant",
            Self::Association => "association",
            Self::Role => "role",
        };
        f.write_str(s)
    }
}

/// Any identity-bearing node in the topic-map graph.
///
/// The enum is the storage representation; the accessor methods below are
/// the capability surface (identifiable / scoped / reifiable / typed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Construct {
    TopicMap(TopicMapInfo),
    Topic(Topic),
    Name(Name),
    Occurrence(Occurrence),
    Variant(Variant),
    Association(Association),
    Role(Role),
}

impl Construct {
    /// The kind discriminant of this construct.
    #[must_use]
    pub fn kind(&self) -> ConstructKind {
        match self {
            Self::TopicMap(_) => ConstructKind::TopicMap,
            Self::Topic(_) => ConstructKind::Topic,
            Self::Name(_) => ConstructKind::Name,
            Self::Occurrence(_) => ConstructKind::Occurrence,
            Self::Variant(_) => ConstructKind::Variant,
            Self::Association(_) => ConstructKind::Association,
            Self::Role(_) => ConstructKind::Role,
        }
    }

    /// Item identifiers (every kind is identifiable).
    #[must_use]
    pub fn item_identifiers(&self) -> &BTreeSet<Locator> {
        match self {
            Self::TopicMap(c) => &c.item_identifiers,
            Self::Topic(c) => &c.item_identifiers,
            Self::Name(c) => &c.item_identifiers,
            Self::Occurrence(c) => &c.item_identifiers,
            Self::Variant(c) => &c.item_identifiers,
            Self::Association(c) => &c.item_identifiers,
            Self::Role(c) => &c.item_identifiers,
        }
    }

    /// Mutable access to the item-identifier set.
    pub fn item_identifiers_mut(&mut self) -> &mut BTreeSet<Locator> {
        match self {
            Self::TopicMap(c) => &mut c.item_identifiers,
            Self::Topic(c) => &mut c.item_identifiers,
            Self::Name(c) => &mut c.item_identifiers,
            Self::Occurrence(c) => &mut c.item_identifiers,
            Self::Variant(c) => &mut c.item_identifiers,
            Self::Association(c) => &mut c.item_identifiers,
            Self::Role(c) => &mut c.item_identifiers,
        }
    }

    /// Scope of this construct, if the kind is scoped.
    #[must_use]
    pub fn scope(&self) -> Option<ScopeId> {
        match self {
            Self::Name(c) => Some(c.scope),
            Self::Occurrence(c) => Some(c.scope),
            Self::Variant(c) => Some(c.scope),
            Self::Association(c) => Some(c.scope),
            _ => None,
        }
    }

    /// Repoint a scoped construct at a new canonical scope.
    ///
    /// No-op for unscoped kinds; index maintenance is the caller's job.
    pub fn set_scope(&mut self, scope: ScopeId) {
        match self {
            Self::Name(c) => c.scope = scope,
            Self::Occurrence(c) => c.scope = scope,
            Self::Variant(c) => c.scope = scope,
            Self::Association(c) => c.scope = scope,
            _ => {}
        }
    }

    /// The reifying topic, if the kind is reifiable and reified.
    #[must_use]
    pub fn reifier(&self) -> Option<ConstructId> {
        match self {
            Self::TopicMap(c) => c.reifier,
            Self::Name(c) => c.reifier,
            Self::Occurrence(c) => c.reifier,
            Self::Variant(c) => c.reifier,
            Self::Association(c) => c.reifier,
            Self::Role(c) => c.reifier,
            Self::Topic(_) => None,
        }
    }

    /// Whether this kind can carry a reifier (everything except topics).
    #[must_use]
    pub fn is_reifiable(&self) -> bool {
        !matches!(self, Self::Topic(_))
    }

    /// Set or clear the reifier slot. Backreference upkeep is the caller's job.
    pub fn set_reifier_slot(&mut self, reifier: Option<ConstructId>) {
        match self {
            Self::TopicMap(c) => c.reifier = reifier,
            Self::Name(c) => c.reifier = reifier,
            Self::Occurrence(c) => c.reifier = reifier,
            Self::Variant(c) => c.reifier = reifier,
            Self::Association(c) => c.reifier = reifier,
            Self::Role(c) => c.reifier = reifier,
            Self::Topic(_) => {}
        }
    }

    /// The single required type of this construct, if the kind is typed.
    ///
    /// Topics carry a *set* of types instead and return `None` here;
    /// variants are typed by their parent name and return `None` too.
    #[must_use]
    pub fn type_id(&self) -> Option<ConstructId> {
        match self {
            Self::Name(c) => Some(c.name_type),
            Self::Occurrence(c) => Some(c.occurrence_type),
            Self::Association(c) => Some(c.association_type),
            Self::Role(c) => Some(c.role_type),
            _ => None,
        }
    }

    /// Retype a typed construct. No-op for untyped kinds.
    pub fn set_type_id(&mut self, type_id: ConstructId) {
        match self {
            Self::Name(c) => c.name_type = type_id,
            Self::Occurrence(c) => c.occurrence_type = type_id,
            Self::Association(c) => c.association_type = type_id,
            Self::Role(c) => c.role_type = type_id,
            _ => {}
        }
    }

    /// The owning parent construct, if any.
    #[must_use]
    pub fn parent(&self) -> Option<ConstructId> {
        match self {
            Self::Name(c) => Some(c.parent),
            Self::Occurrence(c) => Some(c.parent),
            Self::Variant(c) => Some(c.parent),
            Self::Role(c) => Some(c.parent),
            _ => None,
        }
    }

    /// Borrow as a topic record.
    #[must_use]
    pub fn as_topic(&self) -> Option<&Topic> {
        match self {
            Self::Topic(t) => Some(t),
            _ => None,
        }
    }

    /// Mutably borrow as a topic record.
    pub fn as_topic_mut(&mut self) -> Option<&mut Topic> {
        match self {
            Self::Topic(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as a name record.
    #[must_use]
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Mutably borrow as a name record.
    pub fn as_name_mut(&mut self) -> Option<&mut Name> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow as an occurrence record.
    #[must_use]
    pub fn as_occurrence(&self) -> Option<&Occurrence> {
        match self {
            Self::Occurrence(o) => Some(o),
            _ => None,
        }
    }

    /// Borrow as a variant record.
    #[must_use]
    pub fn as_variant(&self) -> Option<&Variant> {
        match self {
            Self::Variant(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as an association record.
    #[must_use]
    pub fn as_association(&self) -> Option<&Association> {
        match self {
            Self::Association(a) => Some(a),
            _ => None,
        }
    }

    /// Mutably borrow as an association record.
    pub fn as_association_mut(&mut self) -> Option<&mut Association> {
        match self {
            Self::Association(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as a role record.
    #[must_use]
    pub fn as_role(&self) -> Option<&Role> {
        match self {
            Self::Role(r) => Some(r),
            _ => None,
        }
    }
}

// =============================================================================
// TRANSACTION STATE
// =============================================================================

/// Life cycle of a transaction: open, then exactly one terminal outcome.
///
/// Terminal states are absorbing: any further call against the transaction
/// fails with [`TopicMapError::TransactionClosed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Committed => f.write_str("committed"),
            Self::RolledBack => f.write_str("rolled back"),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Topika engine.
///
/// All failures are local and synchronous; none are swallowed or retried
/// internally, and a failed operation leaves the graph unmodified.
#[derive(Debug, Error)]
pub enum TopicMapError {
    /// A unique-identifier namespace would be violated and automatic merging
    /// is disabled (or not applicable). Recoverable: pick a different
    /// identifier, enable merging, or merge explicitly.
    #[error("{kind} {locator} on {reporter} already owned by {existing}")]
    IdentityConstraint {
        /// The construct the identifier was being assigned to.
        reporter: ConstructId,
        /// The construct that already owns the identifier.
        existing: ConstructId,
        locator: Locator,
        kind: IdentifierKind,
    },

    /// Two constructs being merged both hold an irreconcilable singleton
    /// property (e.g. both reify different constructs). Never silently
    /// resolved by guessing; the merge is aborted as a whole.
    #[error("merge conflict between {first} and {second}: both reify different constructs")]
    MergeConflict {
        first: ConstructId,
        second: ConstructId,
    },

    /// The construct id has been absorbed by a merge or explicitly removed
    /// (ids never seen by this map report the same way). The caller must
    /// re-resolve identity through a still-valid identifier.
    #[error("construct {0} has been removed or merged away")]
    ConstructRemoved(ConstructId),

    /// A call against a transaction after commit or rollback.
    /// A programming-error signal, not retryable.
    #[error("transaction is already {0}")]
    TransactionClosed(TransactionState),

    /// A construct of the wrong kind was addressed by an operation.
    #[error("construct {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: ConstructId,
        expected: &'static str,
        actual: ConstructKind,
    },

    /// A locator failed validation (empty or oversized).
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    /// A value string failed validation (oversized).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A malformed identifier-query pattern.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// An I/O error from the storage layer.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// TESTS
// =============================================================================

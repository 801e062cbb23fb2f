//! # topika-core
//!
//! The deterministic topic-map engine for Topika - THE MODEL.
//!
//! This crate implements the core data engine: a construct arena with
//! three identifier namespaces, interned scopes, a merge engine that
//! fuses topics representing the same subject, derived indexes, and
//! copy-on-write transactions.
//!
//! ## Architectural Constraints
//!
//! The core:
//! - Is the ONLY place where topic-map state exists (stateful)
//! - Is deterministic: `BTreeMap`/`BTreeSet` everywhere, no iteration
//!   order surprises
//! - Has NO async, NO network dependencies (pure Rust)
//! - Reports every failure as a [`TopicMapError`]; a failed operation
//!   leaves the graph unmodified

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod identity;
pub mod index;
pub mod merge;
pub mod primitives;
pub mod scope;
pub mod storage;
pub mod transaction;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Association, Construct, ConstructId, ConstructKind, IdentifierKind, Locator, Name, Occurrence,
    Role, ScopeId, Topic, TopicMapError, TopicMapInfo, TransactionState, Variant,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use graph::{ConstructOps, TopicMap, TopicMapView};
pub use identity::{IdentityOps, IdentityRegistry};
pub use index::{IndexManager, IndexOps};
pub use merge::MergeOps;
pub use scope::{ScopeOps, ScopeRegistry};
pub use transaction::Transaction;

// =============================================================================
// RE-EXPORTS: Formats & Storage
// =============================================================================

pub use formats::{TopicMapSnapshot, topic_map_from_bytes, topic_map_to_bytes};
pub use storage::{FileStore, RedbStore, TopicMapStore};

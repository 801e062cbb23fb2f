//! # Serialization Formats
//!
//! Snapshot capture/restore and the framed binary encoding.

pub mod persistence;

pub use persistence::{TopicMapSnapshot, topic_map_from_bytes, topic_map_to_bytes};

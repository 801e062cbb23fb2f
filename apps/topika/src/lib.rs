//! # Topika - Topic Map Engine
//!
//! The main binary for the Topika deterministic topic-map engine.
//!
//! This application provides:
//! - CLI interface for topic-map operations
//! - Storage backend selection (file snapshot or redb database)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              apps/topika (THE BINARY)         │
//! │                                               │
//! │  ┌─────────────┐         ┌────────────────┐  │
//! │  │   CLI       │         │  Storage I/O   │  │
//! │  │  (clap)     │         │  (file / redb) │  │
//! │  └──────┬──────┘         └───────┬────────┘  │
//! │         │                        │           │
//! │         └────────────┬───────────┘           │
//! │                      ▼                       │
//! │              ┌───────────────┐               │
//! │              │  topika-core  │               │
//! │              │  (THE ENGINE) │               │
//! │              └───────────────┘               │
//! └───────────────────────────────────────────────┘
//! ```

pub mod cli;

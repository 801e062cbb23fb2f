//! # Topika CLI Module
//!
//! This module implements the CLI interface for Topika.
//!
//! ## Available Commands
//!
//! - `status` - Show topic-map statistics
//! - `init` - Initialize a new database
//! - `topic` - Create or look up a topic by identifier
//! - `name` - Attach a name to a topic
//! - `occurrence` - Attach an occurrence to a topic
//! - `assoc` - Create an association with roles
//! - `merge` - Merge one topic into another
//! - `query` - Run index queries (types, scopes, identifiers, hierarchy)
//! - `export` - Export the map to a file
//! - `import` - Import a map from a file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use topika_core::TopicMapError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Topika - Topic Map Engine
///
/// A deterministic topic-map database with automatic subject-based
/// merging, canonical scopes, and consistent indexes.
#[derive(Parser, Debug)]
#[command(name = "topika")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the topic-map database
    #[arg(short = 'D', long, global = true, default_value = "topika.db")]
    pub database: PathBuf,

    /// Storage backend: "file" (framed snapshot) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show topic-map statistics
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Create or look up a topic by identifier
    Topic {
        /// Subject identifier URI
        #[arg(short = 's', long)]
        subject_identifier: Option<String>,

        /// Subject locator URI (the topic IS this resource)
        #[arg(short = 'l', long)]
        subject_locator: Option<String>,

        /// Item identifier URI
        #[arg(short = 'i', long)]
        item_identifier: Option<String>,
    },

    /// Attach a name to a topic
    Name {
        /// Identifier of the topic to name
        #[arg(short, long)]
        topic: String,

        /// Subject identifier of the name type
        #[arg(
            short = 'T',
            long,
            default_value = "http://psi.topicmaps.org/iso13250/model/topic-name"
        )]
        name_type: String,

        /// Name value
        #[arg(long)]
        value: String,

        /// Scope theme subject identifiers (repeatable)
        #[arg(long = "theme")]
        themes: Vec<String>,
    },

    /// Attach an occurrence to a topic
    Occurrence {
        /// Identifier of the topic
        #[arg(short, long)]
        topic: String,

        /// Subject identifier of the occurrence type
        #[arg(short = 'T', long)]
        occurrence_type: String,

        /// Occurrence value
        #[arg(long)]
        value: String,

        /// Datatype locator (defaults to xsd:string)
        #[arg(short = 'd', long)]
        datatype: Option<String>,

        /// Scope theme subject identifiers (repeatable)
        #[arg(long = "theme")]
        themes: Vec<String>,
    },

    /// Create an association with roles
    Assoc {
        /// Subject identifier of the association type
        #[arg(short = 'T', long)]
        assoc_type: String,

        /// Role specifications as "type-uri=player-uri" (repeatable)
        #[arg(short = 'r', long = "role")]
        roles: Vec<String>,

        /// Scope theme subject identifiers (repeatable)
        #[arg(long = "theme")]
        themes: Vec<String>,
    },

    /// Merge one topic into another
    Merge {
        /// Identifier of the surviving topic
        #[arg(long)]
        target: String,

        /// Identifier of the topic to absorb
        #[arg(long)]
        source: String,
    },

    /// Run a query against the indexes
    Query {
        /// Query type (instances, typed, scoped, identifiers, supertypes, subtypes)
        #[arg(short = 't', long)]
        query_type: String,

        /// Type topic identifier (for instances/typed queries)
        #[arg(long = "type")]
        type_ref: Option<String>,

        /// Theme topic identifiers (for scoped queries, repeatable)
        #[arg(long = "theme")]
        themes: Vec<String>,

        /// Require all themes instead of any
        #[arg(long)]
        match_all: bool,

        /// Construct kind filter (name, occurrence, variant, association, role)
        #[arg(short = 'k', long, default_value = "occurrence")]
        kind: String,

        /// Identifier regex pattern (for identifiers queries)
        #[arg(short = 'p', long)]
        pattern: Option<String>,

        /// Identifier namespace (item, subject, locator)
        #[arg(short = 'n', long, default_value = "subject")]
        namespace: String,

        /// Topic identifier (for supertypes/subtypes queries)
        #[arg(long)]
        topic: Option<String>,
    },

    /// Export the map to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (snapshot, json)
        #[arg(short = 't', long, default_value = "snapshot")]
        format: String,
    },

    /// Import a map from a snapshot file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), TopicMapError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Status) => cmd_status(&cli.database, backend, json_mode),
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, force),
        Some(Commands::Topic {
            subject_identifier,
            subject_locator,
            item_identifier,
        }) => cmd_topic(
            &cli.database,
            backend,
            json_mode,
            subject_identifier.as_deref(),
            subject_locator.as_deref(),
            item_identifier.as_deref(),
        ),
        Some(Commands::Name {
            topic,
            name_type,
            value,
            themes,
        }) => cmd_name(
            &cli.database,
            backend,
            json_mode,
            &topic,
            &name_type,
            &value,
            &themes,
        ),
        Some(Commands::Occurrence {
            topic,
            occurrence_type,
            value,
            datatype,
            themes,
        }) => cmd_occurrence(
            &cli.database,
            backend,
            json_mode,
            &topic,
            &occurrence_type,
            &value,
            datatype.as_deref(),
            &themes,
        ),
        Some(Commands::Assoc {
            assoc_type,
            roles,
            themes,
        }) => cmd_assoc(
            &cli.database,
            backend,
            json_mode,
            &assoc_type,
            &roles,
            &themes,
        ),
        Some(Commands::Merge { target, source }) => {
            cmd_merge(&cli.database, backend, json_mode, &target, &source)
        }
        Some(Commands::Query {
            query_type,
            type_ref,
            themes,
            match_all,
            kind,
            pattern,
            namespace,
            topic,
        }) => cmd_query(
            &cli.database,
            backend,
            json_mode,
            &query_type,
            type_ref.as_deref(),
            &themes,
            match_all,
            &kind,
            pattern.as_deref(),
            &namespace,
            topic.as_deref(),
        ),
        Some(Commands::Export { output, format }) => {
            cmd_export(&cli.database, backend, &output, &format)
        }
        Some(Commands::Import { input }) => cmd_import(&cli.database, backend, &input),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, backend, json_mode)
        }
    }
}

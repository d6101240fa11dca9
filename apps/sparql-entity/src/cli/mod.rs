//! # sparql-entity CLI Module
//!
//! Command-line interface over a sparql-entity configuration file.
//!
//! ## Available Commands
//!
//! - `check` - Validate the configuration and build every mapping
//! - `mapping` - Show the full mapping of an entity type
//! - `predicates` - Predicates of a field column
//! - `format` - Declared value formats of a field column
//! - `bundle` - Bundle to type URI lookups, in both directions
//! - `field-for` - The field a predicate holds in a bundle
//! - `encode` - Encode a value into an RDF term
//! - `graphs` - Enabled graphs and graph URIs of an entity type
//! - `target-graph` - The graph a save would write to
//! - `generate-id` - Generate an identifier for a new entity
//! - `cache` - Manage the mapping snapshot cache
//! - `hash` - BLAKE3 fingerprint of an entity type declaration

mod commands;

use clap::{Parser, Subcommand};
use sparql_entity_core::MappingError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// sparql-entity - entity to triplestore mapping inspector
///
/// Loads a TOML engine configuration and answers mapping, codec, graph and
/// identifier questions without touching a triplestore.
#[derive(Parser, Debug)]
#[command(name = "sparql-entity")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the engine configuration
    #[arg(short, long, global = true, default_value = "sparql-entity.toml")]
    pub config: PathBuf,

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
    /// Validate the configuration and build every mapping
    Check,

    /// Show the full mapping of an entity type
    Mapping {
        /// Entity type id
        #[arg(short, long)]
        entity_type: String,
    },

    /// Predicates of a field column
    Predicates {
        #[arg(short, long)]
        entity_type: String,

        #[arg(short, long)]
        field: String,

        /// Column (defaults to the field's main property)
        #[arg(long)]
        column: Option<String>,

        /// Restrict to one bundle
        #[arg(short, long)]
        bundle: Option<String>,
    },

    /// Declared value formats of a field column
    Format {
        #[arg(short, long)]
        entity_type: String,

        #[arg(short, long)]
        field: String,

        #[arg(long)]
        column: Option<String>,

        #[arg(short, long)]
        bundle: Option<String>,
    },

    /// Bundle to type URI, or type URI to bundles
    Bundle {
        #[arg(short, long)]
        entity_type: String,

        /// Bundle to look up
        #[arg(short, long, conflicts_with = "type_uri")]
        bundle: Option<String>,

        /// Type URI to look up
        #[arg(short, long)]
        type_uri: Option<String>,
    },

    /// The field a predicate holds in a bundle
    FieldFor {
        #[arg(short, long)]
        entity_type: String,

        #[arg(short, long)]
        predicate: String,

        #[arg(short, long)]
        bundle: String,
    },

    /// Encode a value into an RDF term
    Encode {
        #[arg(short, long)]
        entity_type: String,

        #[arg(short, long)]
        field: String,

        /// Lexical value (JSON for serialized columns)
        #[arg(long)]
        value: String,

        #[arg(long)]
        column: Option<String>,

        #[arg(short, long)]
        bundle: Option<String>,

        /// Language tag for translatable literals
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Enabled graphs and graph URIs of an entity type
    Graphs {
        #[arg(short, long)]
        entity_type: String,

        /// Request graphs for a read (comma-separated), shown as URIs
        #[arg(short, long, requires = "bundle")]
        request: Option<String>,

        /// Bundle of the entity being read
        #[arg(short, long)]
        bundle: Option<String>,
    },

    /// The graph a save would write to
    TargetGraph {
        #[arg(short, long)]
        entity_type: String,

        #[arg(short, long)]
        bundle: String,

        /// Graph the entity was loaded from
        #[arg(short, long)]
        graph: Option<String>,

        /// Explicit write target
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Generate an identifier for a new entity
    GenerateId {
        #[arg(short, long)]
        entity_type: String,

        #[arg(short, long)]
        bundle: String,

        /// Entity label (used by label-based strategies)
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Manage the mapping snapshot cache
    Cache {
        /// Cache file (defaults to `snapshot_cache` of the configuration)
        #[arg(short, long)]
        path: Option<PathBuf>,

        #[command(subcommand)]
        action: CacheAction,
    },

    /// Compute BLAKE3 fingerprint of an entity type declaration
    Hash {
        #[arg(short, long)]
        entity_type: String,
    },
}

/// Snapshot cache operations.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Build every mapping and store its snapshot
    Warm,
    /// List stored snapshots and whether they are fresh
    List,
    /// Remove every snapshot
    Clear,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), MappingError> {
    let json_mode = cli.json_mode;
    let config = load_config(&cli.config)?;

    if cli.verbose {
        tracing::info!(
            config = %cli.config.display(),
            entity_types = config.entity_types.len(),
            "configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Check) | None => cmd_check(&cli.config, &config, json_mode),
        Some(Commands::Mapping { entity_type }) => cmd_mapping(&config, json_mode, &entity_type),
        Some(Commands::Predicates {
            entity_type,
            field,
            column,
            bundle,
        }) => cmd_predicates(
            &config,
            json_mode,
            &entity_type,
            &field,
            column.as_deref(),
            bundle.as_deref(),
        ),
        Some(Commands::Format {
            entity_type,
            field,
            column,
            bundle,
        }) => cmd_format(
            &config,
            json_mode,
            &entity_type,
            &field,
            column.as_deref(),
            bundle.as_deref(),
        ),
        Some(Commands::Bundle {
            entity_type,
            bundle,
            type_uri,
        }) => cmd_bundle(
            &config,
            json_mode,
            &entity_type,
            bundle.as_deref(),
            type_uri.as_deref(),
        ),
        Some(Commands::FieldFor {
            entity_type,
            predicate,
            bundle,
        }) => cmd_field_for(&config, json_mode, &entity_type, &predicate, &bundle),
        Some(Commands::Encode {
            entity_type,
            field,
            value,
            column,
            bundle,
            language,
        }) => cmd_encode(
            &config,
            json_mode,
            &EncodeArgs {
                entity_type: &entity_type,
                field: &field,
                value: &value,
                column: column.as_deref(),
                bundle: bundle.as_deref(),
                language: language.as_deref(),
            },
        ),
        Some(Commands::Graphs {
            entity_type,
            request,
            bundle,
        }) => cmd_graphs(
            &config,
            json_mode,
            &entity_type,
            request.as_deref(),
            bundle.as_deref(),
        ),
        Some(Commands::TargetGraph {
            entity_type,
            bundle,
            graph,
            target,
        }) => cmd_target_graph(
            &config,
            json_mode,
            &entity_type,
            &bundle,
            graph.as_deref(),
            target.as_deref(),
        ),
        Some(Commands::GenerateId {
            entity_type,
            bundle,
            label,
        }) => cmd_generate_id(&config, json_mode, &entity_type, &bundle, label.as_deref()),
        Some(Commands::Cache { path, action }) => {
            cmd_cache(&config, json_mode, path.as_deref(), action)
        }
        Some(Commands::Hash { entity_type }) => cmd_hash(&config, json_mode, &entity_type),
    }
}

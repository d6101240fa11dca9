//! # sparql-entity
//!
//! Command-line inspector for the sparql-entity mapping engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 apps/sparql-entity (THE BINARY)           │
//! │                                                           │
//! │   ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │   │    CLI      │   │   Reports    │   │ TOML config  │   │
//! │   │   (clap)    │   │ (serde_json) │   │   loading    │   │
//! │   └──────┬──────┘   └──────┬───────┘   └──────┬───────┘   │
//! │          └─────────────────┼──────────────────┘           │
//! │                            ▼                              │
//! │                 ┌─────────────────────┐                   │
//! │                 │ sparql-entity-core  │                   │
//! │                 └─────────────────────┘                   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! sparql-entity -c site.toml check
//! sparql-entity mapping -e content
//! sparql-entity encode -e content -f title --value "Hello" -b article -l en
//! sparql-entity target-graph -e content -b article -g draft
//! sparql-entity graphs -e content -b article -r draft,default
//! ```

use clap::Parser;
use sparql_entity::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // SPARQL_ENTITY_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("SPARQL_ENTITY_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sparql_entity=info,sparql_entity_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        "sparql-entity v{}  (entity to triplestore mapping)\n",
        env!("CARGO_PKG_VERSION")
    );
}

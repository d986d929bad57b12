mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kb")]
#[command(about = "Knowledge-base retrieval pipeline: index, version, and search entities", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the index database
    #[arg(long, global = true, default_value = "kb_index.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index entities from a JSON file
    Index {
        /// JSON array of entities
        entities: PathBuf,
        #[arg(long, help = "Program scope for the indexed chunks")]
        program: String,
        #[arg(long, help = "KB version label to tag new chunks with")]
        kb_version: String,
        #[arg(long, help = "Skip embedding, store lexical-only rows")]
        no_embed: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Hybrid semantic + keyword search
    Search {
        query: String,
        #[arg(long, help = "Filter by program")]
        program: Option<String>,
        #[arg(long, help = "Filter by entity type")]
        entity_type: Option<String>,
        #[arg(long, help = "Filter by module")]
        module: Option<String>,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "Semantic ranking weight")]
        semantic_weight: Option<f32>,
        #[arg(long, help = "Keyword ranking weight")]
        keyword_weight: Option<f32>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Manage KB versions
    Version {
        #[command(subcommand)]
        command: VersionCommands,
    },
    /// Show index statistics
    Stats {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// List entities needing re-indexing
    Stale {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

#[derive(Subcommand)]
enum VersionCommands {
    /// Create a version in building state
    Create { label: String, #[arg(long)] json: bool },
    /// Activate a version, archiving the previously active one
    Activate { label: String, #[arg(long)] json: bool },
    /// Archive a non-active version
    Archive { label: String, #[arg(long)] json: bool },
    /// List all versions
    List { #[arg(long)] json: bool },
    /// Compare entity sets between two versions
    Diff { a: String, b: String, #[arg(long)] json: bool },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            entities,
            program,
            kb_version,
            no_embed,
            json,
        } => commands::index::run(&cli.db, &entities, &program, &kb_version, no_embed, json),
        Commands::Search {
            query,
            program,
            entity_type,
            module,
            limit,
            semantic_weight,
            keyword_weight,
            json,
        } => commands::search::run(
            &cli.db,
            &query,
            program,
            entity_type,
            module,
            limit,
            semantic_weight,
            keyword_weight,
            json,
        ),
        Commands::Version { command } => match command {
            VersionCommands::Create { label, json } => {
                commands::version::create(&cli.db, &label, json)
            }
            VersionCommands::Activate { label, json } => {
                commands::version::activate(&cli.db, &label, json)
            }
            VersionCommands::Archive { label, json } => {
                commands::version::archive(&cli.db, &label, json)
            }
            VersionCommands::List { json } => commands::version::list(&cli.db, json),
            VersionCommands::Diff { a, b, json } => commands::version::diff(&cli.db, &a, &b, json),
        },
        Commands::Stats { json } => commands::stats::stats(&cli.db, json),
        Commands::Stale { json } => commands::stats::stale(&cli.db, json),
    }
}

//! Index command - batch-index entities from a JSON file

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use kb_retrieval::{ChunkStore, ChunkingEngine, EntityDoc, HtpEmbedder, Indexer};

/// Run index command
pub fn run(
    db_path: &Path,
    entities_path: &Path,
    program: &str,
    kb_version: &str,
    no_embed: bool,
    json: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(entities_path)
        .with_context(|| format!("failed to read {}", entities_path.display()))?;
    let entities: Vec<EntityDoc> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of entities", entities_path.display()))?;

    let store = ChunkStore::open(db_path)?;
    let embedder = HtpEmbedder::new();
    let provider = if no_embed {
        None
    } else {
        Some(&embedder as &dyn kb_retrieval::EmbeddingProvider)
    };

    if !json {
        println!(
            "{} Indexing {} entities at version {}...",
            "→".dimmed(),
            entities.len().to_string().cyan(),
            kb_version.cyan()
        );
    }

    let start = std::time::Instant::now();
    let indexer = Indexer::new(ChunkingEngine::with_defaults(), provider, &store);
    let report = indexer.batch_index(&entities, program, kb_version);
    let duration_ms = start.elapsed().as_millis();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "indexed": report.indexed,
                "skipped": report.skipped,
                "chunks_written": report.chunks_written,
                "failures": report.failures,
                "duration_ms": duration_ms,
            })
        );
    } else {
        println!(
            "{} Indexed {} entities ({} chunks) in {:.2}s",
            "✓".green().bold(),
            report.indexed.to_string().cyan(),
            report.chunks_written,
            duration_ms as f64 / 1000.0
        );
        if report.skipped > 0 {
            println!(
                "  {} {} entities skipped (content unchanged)",
                "→".dimmed(),
                report.skipped
            );
        }
        for failure in &report.failures {
            println!(
                "  {} {}/{}: {}",
                "✗".red(),
                failure.entity_type,
                failure.entity_id,
                failure.error
            );
        }
    }

    if !report.failures.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

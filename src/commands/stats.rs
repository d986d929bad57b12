//! Stats and stale commands - index health reporting

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use kb_retrieval::{ChunkStore, VersionManager};

/// Show index statistics
pub fn stats(db_path: &Path, json: bool) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let stats = store.get_stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "Index Stats".bold());
    println!();
    println!(
        "  {} {} chunks ({} active, {} inactive)",
        "→".dimmed(),
        stats.total_chunks.to_string().cyan(),
        stats.active_chunks,
        stats.inactive_chunks
    );
    for (entity_type, count) in &stats.by_entity_type {
        println!("  {} {}: {}", "→".dimmed(), entity_type, count);
    }
    for (version, count) in &stats.by_version {
        println!("  {} v{}: {} chunks", "→".dimmed(), version, count);
    }
    Ok(())
}

/// List entities needing re-indexing (no content hash)
pub fn stale(db_path: &Path, json: bool) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let stale = VersionManager::new(&store).find_stale()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stale)?);
        return Ok(());
    }

    if stale.is_empty() {
        println!("{} No stale entities", "✓".green().bold());
        return Ok(());
    }

    println!(
        "{} {} entities need re-indexing:",
        "!".yellow().bold(),
        stale.len()
    );
    for (entity_type, entity_id) in &stale {
        println!("  {} {}/{}", "→".dimmed(), entity_type, entity_id);
    }
    Ok(())
}

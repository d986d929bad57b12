//! Version commands - create / activate / archive / list / diff

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use kb_retrieval::{ChunkStore, VersionManager};

pub fn create(db_path: &Path, label: &str, json: bool) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let row = VersionManager::new(&store).create(label)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&row)?);
    } else {
        println!(
            "{} Created version {} ({})",
            "✓".green().bold(),
            row.version.cyan(),
            row.status.as_str()
        );
    }
    Ok(())
}

pub fn activate(db_path: &Path, label: &str, json: bool) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let row = VersionManager::new(&store).activate(label)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&row)?);
    } else {
        println!("{} Activated version {}", "✓".green().bold(), row.version.cyan());
    }
    Ok(())
}

pub fn archive(db_path: &Path, label: &str, json: bool) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let row = VersionManager::new(&store).archive(label)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&row)?);
    } else {
        println!("{} Archived version {}", "✓".green().bold(), row.version.cyan());
    }
    Ok(())
}

pub fn list(db_path: &Path, json: bool) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let versions = VersionManager::new(&store).list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!("{} No versions yet", "!".yellow().bold());
        return Ok(());
    }

    println!("{}", "KB Versions".bold());
    println!();
    for v in versions {
        let status = match v.status.as_str() {
            "active" => v.status.as_str().green(),
            "archived" => v.status.as_str().dimmed(),
            _ => v.status.as_str().yellow(),
        };
        println!("  {} {} [{}]", "→".dimmed(), v.version.cyan(), status);
    }
    Ok(())
}

pub fn diff(db_path: &Path, a: &str, b: &str, json: bool) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let diff = VersionManager::new(&store).diff(a, b)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }

    println!("{} {} → {}", "Diff".bold(), a.cyan(), b.cyan());
    println!();
    for (entity_type, entity_id) in &diff.added {
        println!("  {} {}/{}", "+".green(), entity_type, entity_id);
    }
    for (entity_type, entity_id) in &diff.removed {
        println!("  {} {}/{}", "-".red(), entity_type, entity_id);
    }
    for (entity_type, entity_id) in &diff.changed {
        println!("  {} {}/{}", "~".yellow(), entity_type, entity_id);
    }
    println!();
    println!(
        "  {} added, {} removed, {} changed, {} unchanged",
        diff.added.len(),
        diff.removed.len(),
        diff.changed.len(),
        diff.unchanged
    );
    Ok(())
}

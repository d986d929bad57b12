//! Search command - hybrid semantic + keyword search

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use kb_retrieval::{ChunkStore, HtpEmbedder, HybridSearchEngine, SearchRequest};

#[allow(clippy::too_many_arguments)]
pub fn run(
    db_path: &Path,
    query: &str,
    program: Option<String>,
    entity_type: Option<String>,
    module: Option<String>,
    limit: Option<usize>,
    semantic_weight: Option<f32>,
    keyword_weight: Option<f32>,
    json: bool,
) -> Result<()> {
    let store = ChunkStore::open(db_path)?;
    let embedder = HtpEmbedder::new();
    let engine = HybridSearchEngine::new(&store, Some(&embedder));

    let mut request = SearchRequest::new(query);
    request.program = program;
    request.entity_type = entity_type;
    request.module = module;
    if let Some(limit) = limit {
        request.top_k = limit;
    }
    if let Some(w) = semantic_weight {
        request.semantic_weight = w;
    }
    if let Some(w) = keyword_weight {
        request.keyword_weight = w;
    }

    let hits = engine.search(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{} No results for '{}'", "!".yellow().bold(), query);
        return Ok(());
    }

    println!(
        "{} {} results for '{}'",
        "✓".green().bold(),
        hits.len().to_string().cyan(),
        query
    );
    println!();

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} {}/{} {}",
            i + 1,
            format!("[{:.4}]", hit.combined_score).cyan(),
            hit.entity_type.bold(),
            hit.entity_id.bold(),
            format!("(sem {:.2}, kw {:.2}, v{})", hit.semantic_score, hit.keyword_score, hit.kb_version)
                .dimmed()
        );
        let preview: String = hit.chunk_text.chars().take(160).collect();
        println!("   {}", preview.dimmed());
    }

    Ok(())
}

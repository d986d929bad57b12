//! Reciprocal Rank Fusion: combined = Σ weight_i / (k + rank_i).
//!
//! Ranks rather than raw scores are fused, so cosine similarities and BM25
//! scores never need cross-scale calibration. A document absent from one
//! ranking simply contributes nothing from that ranking; it is not pushed
//! to a worst-case rank.

use std::collections::HashMap;

/// RRF smoothing constant. Higher k reduces the influence of top ranks
/// from any single list.
pub const RRF_K: f32 = 60.0;

/// Convert a score map into 1-based ranks (best score = rank 1). Ties are
/// broken by id ascending so ranking is deterministic.
pub fn ranks_from_scores(scores: &HashMap<i64, f32>) -> HashMap<i64, usize> {
    let mut ordered: Vec<(i64, f32)> = scores.iter().map(|(id, s)| (*id, *s)).collect();
    ordered.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (id, _))| (id, i + 1))
        .collect()
}

/// Fuse weighted rankings into one combined score per document.
pub fn fuse(rankings: &[(f32, HashMap<i64, usize>)]) -> HashMap<i64, f32> {
    let mut combined: HashMap<i64, f32> = HashMap::new();

    for (weight, ranks) in rankings {
        for (id, rank) in ranks {
            *combined.entry(*id).or_default() += weight / (RRF_K + *rank as f32);
        }
    }

    combined
}

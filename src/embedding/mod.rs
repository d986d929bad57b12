//! Embedding provider boundary.
//!
//! The pipeline only consumes `embed(texts) -> vectors`; anything from an
//! ONNX model to a remote API can sit behind the trait. Providers fail as a
//! unit (no partial batches) and callers degrade to vector-less indexing or
//! lexical-only search rather than aborting.

pub mod htp;

pub use htp::HtpEmbedder;

use crate::error::KbResult;

/// Batch embedding provider. One vector per input text, failing as a unit.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, texts: &[String]) -> KbResult<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Cosine similarity between two vectors. Mismatched lengths or zero norms
/// score 0.0 instead of erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

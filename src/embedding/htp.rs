//! Harmonic Token Projection (HTP) embeddings.
//!
//! A deterministic, training-free embedding method: each token is encoded
//! as a base-2^16 integer, decomposed modulo a set of coprime primes, and
//! each residue is projected onto the unit circle. Token vectors are
//! mean-pooled and L2-normalized.
//!
//! Properties that matter here:
//! - no model file or network access, so the default pipeline works offline
//! - same input always produces the same vector (idempotent re-indexing)
//! - unicode-based, so non-English field values still embed

use std::f64::consts::PI;

use super::EmbeddingProvider;
use crate::error::KbResult;

/// Embedding dimension: 2 values (sin, cos) per modulus.
pub const EMBEDDING_DIM: usize = 384;

const NUM_MODULI: usize = EMBEDDING_DIM / 2;

/// Unicode code points considered per token.
const MAX_TOKEN_LENGTH: usize = 64;

/// First NUM_MODULI primes; primality guarantees pairwise coprimality.
static COPRIME_MODULI: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607,
    613, 617, 619, 631, 641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701,
    709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787, 797, 809, 811,
    821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013,
    1019, 1021, 1031, 1033, 1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091,
    1093, 1097, 1103, 1109, 1117, 1123, 1129, 1151, 1153, 1163, 1171, 1181,
];

/// Default embedding provider using Harmonic Token Projection.
pub struct HtpEmbedder {
    moduli: &'static [u64],
}

impl HtpEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: &COPRIME_MODULI[..NUM_MODULI],
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec![0.0; EMBEDDING_DIM];
        }

        // Mean-pool token projections.
        let mut sum = vec![0.0f64; EMBEDDING_DIM];
        for token in &tokens {
            let token_emb = self.embed_token(token);
            for (acc, val) in sum.iter_mut().zip(token_emb) {
                *acc += val;
            }
        }
        for val in &mut sum {
            *val /= tokens.len() as f64;
        }

        // L2 normalize.
        let norm: f64 = sum.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            sum.iter().map(|x| (*x / norm) as f32).collect()
        } else {
            sum.iter().map(|x| *x as f32).collect()
        }
    }

    /// Project one token: r_i = N mod m_i, E_i = [sin(2πr_i/m_i), cos(2πr_i/m_i)].
    fn embed_token(&self, token: &str) -> Vec<f64> {
        let n = token_to_integer(token);
        let mut embedding = Vec::with_capacity(EMBEDDING_DIM);
        for &m in self.moduli {
            let r = n % m;
            let theta = 2.0 * PI * (r as f64) / (m as f64);
            embedding.push(theta.sin());
            embedding.push(theta.cos());
        }
        embedding
    }
}

impl Default for HtpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HtpEmbedder {
    fn embed(&self, texts: &[String]) -> KbResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }

    fn name(&self) -> &str {
        "htp"
    }
}

/// N = Σ u_j * B^(L-j) with B = 2^16, wrapping on overflow.
fn token_to_integer(token: &str) -> u64 {
    let mut n: u64 = 0;
    for c in token.chars().take(MAX_TOKEN_LENGTH) {
        n = n.wrapping_mul(65536).wrapping_add(c as u64);
    }
    n
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

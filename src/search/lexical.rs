//! Candidate-set BM25 scoring.
//!
//! Document frequencies and average length are computed over the filtered
//! candidate set of each query, not a persistent corpus, so there is no
//! inverted index to keep in sync. Raw scores are normalized into [0,1] by
//! the batch maximum so they can be ranked alongside cosine scores.

use std::collections::{HashMap, HashSet};

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// BM25 scorer over one query's candidate set, keyed by record id.
pub struct Bm25Scorer {
    docs: HashMap<i64, Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_len: f32,
}

impl Bm25Scorer {
    /// Tokenize all candidates and build per-token document frequencies.
    pub fn build(candidates: impl Iterator<Item = (i64, String)>) -> Self {
        let mut docs = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for (id, text) in candidates {
            let tokens = tokenize(&text);
            total_len += tokens.len();
            let mut seen = HashSet::new();
            for token in &tokens {
                if seen.insert(token.clone()) {
                    *doc_freq.entry(token.clone()).or_insert(0) += 1;
                }
            }
            docs.insert(id, tokens);
        }

        let avg_len = total_len as f32 / docs.len().max(1) as f32;

        Self {
            docs,
            doc_freq,
            avg_len,
        }
    }

    /// Normalized scores in [0,1] for every candidate matching at least one
    /// query token. Non-matching candidates are absent from the map.
    pub fn score_all(&self, query: &str) -> HashMap<i64, f32> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return HashMap::new();
        }

        let mut raw: HashMap<i64, f32> = HashMap::new();
        for id in self.docs.keys() {
            let score = self.score_doc(*id, &query_tokens);
            if score > 0.0 {
                raw.insert(*id, score);
            }
        }

        let max = raw.values().cloned().fold(0.0f32, f32::max);
        if max > 0.0 {
            for score in raw.values_mut() {
                *score /= max;
            }
        }
        raw
    }

    fn score_doc(&self, id: i64, query_tokens: &[String]) -> f32 {
        let Some(doc_tokens) = self.docs.get(&id) else {
            return 0.0;
        };
        if doc_tokens.is_empty() {
            return 0.0;
        }

        let dl = doc_tokens.len() as f32;
        let total_docs = self.docs.len().max(1) as f32;
        let mut score = 0.0;

        for token in query_tokens {
            let freq = doc_tokens.iter().filter(|t| t.as_str() == token).count() as f32;
            if freq <= 0.0 {
                continue;
            }
            let df = *self.doc_freq.get(token).unwrap_or(&0) as f32;
            let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
            let denom = freq + K1 * (1.0 - B + B * dl / self.avg_len.max(1e-3));
            if denom > 0.0 {
                score += idf * (freq * (K1 + 1.0)) / denom;
            }
        }

        score
    }
}

/// Lowercase word tokenization shared by documents and queries.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer(docs: &[(i64, &str)]) -> Bm25Scorer {
        Bm25Scorer::build(docs.iter().map(|(id, text)| (*id, text.to_string())))
    }

    #[test]
    fn matching_doc_scores_above_nonmatching() {
        let scorer = scorer(&[
            (1, "GL account posting rules"),
            (2, "material master creation"),
        ]);
        let scores = scorer.score_all("posting");
        assert!(scores.contains_key(&1));
        assert!(!scores.contains_key(&2));
    }

    #[test]
    fn repeated_terms_raise_the_score() {
        let scorer = scorer(&[
            (1, "posting once here and padding words"),
            (2, "posting posting posting padding words here"),
        ]);
        let scores = scorer.score_all("posting");
        assert!(scores[&2] > scores[&1]);
    }

    #[test]
    fn scores_are_normalized_to_unit_range() {
        let scorer = scorer(&[
            (1, "invoice posting"),
            (2, "invoice posting and invoice matching"),
            (3, "stock transfer"),
        ]);
        let scores = scorer.score_all("invoice posting");
        let max = scores.values().cloned().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        for score in scores.values() {
            assert!(*score > 0.0 && *score <= 1.0);
        }
    }

    #[test]
    fn empty_query_scores_nothing() {
        let scorer = scorer(&[(1, "anything at all")]);
        assert!(scorer.score_all("").is_empty());
        assert!(scorer.score_all("!!! ???").is_empty());
    }

    #[test]
    fn rare_term_outweighs_common_term() {
        let scorer = scorer(&[
            (1, "posting posting common"),
            (2, "posting ledger common"),
            (3, "posting common filler"),
        ]);
        // "ledger" appears in one doc, "common" in all three; the rare term
        // should dominate doc 2's score for a mixed query.
        let scores = scorer.score_all("ledger common");
        assert!(scores[&2] > scores[&1]);
        assert!(scores[&2] > scores[&3]);
    }

    #[test]
    fn tokenization_is_case_insensitive() {
        let scorer = scorer(&[(1, "GL Account Posting")]);
        let scores = scorer.score_all("gl ACCOUNT");
        assert!(scores.contains_key(&1));
    }
}

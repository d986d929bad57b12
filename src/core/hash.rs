//! Content fingerprinting for change detection.

/// Hash of an entity's canonical extracted text (blake3, hex).
///
/// Computed once per indexing call; equality with the currently active
/// generation's hash short-circuits re-indexing.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_identical_input() {
        assert_eq!(content_hash("GL Account Posting"), content_hash("GL Account Posting"));
    }

    #[test]
    fn changes_for_any_textual_difference() {
        assert_ne!(content_hash("fit"), content_hash("gap"));
        assert_ne!(content_hash("text"), content_hash("text "));
    }

    #[test]
    fn fixed_length_hex() {
        let h = content_hash("anything");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

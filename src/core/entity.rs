//! Typed entity input for the indexing pipeline.
//!
//! Entities arrive at the boundary as structured records rather than
//! free-form maps; extractors read the typed fields and fall back to
//! `extra` for deployment-specific attributes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One domain entity as handed to the pipeline.
///
/// `entity_type` selects the text extractor (unknown types use the generic
/// one). `module` and `phase` are copied verbatim onto every chunk row so
/// search can filter on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityDoc {
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Entity sub-kind (e.g. "functional" vs "technical" requirement).
    #[serde(default)]
    pub kind: Option<String>,
    /// Deployment-specific fields. BTreeMap keeps extraction output
    /// deterministic.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl EntityDoc {
    pub fn new(entity_type: &str, entity_id: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_missing_optionals() {
        let doc: EntityDoc =
            serde_json::from_str(r#"{"entity_type": "requirement", "entity_id": "42"}"#).unwrap();
        assert_eq!(doc.entity_type, "requirement");
        assert_eq!(doc.entity_id, "42");
        assert!(doc.title.is_none());
        assert!(doc.extra.is_empty());
    }

    #[test]
    fn extra_fields_round_trip() {
        let mut doc = EntityDoc::new("requirement", "7").with_title("GL Posting");
        doc.extra.insert("fit_gap".to_string(), "gap".to_string());

        let json = serde_json::to_string(&doc).unwrap();
        let back: EntityDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extra.get("fit_gap").map(String::as_str), Some("gap"));
    }
}

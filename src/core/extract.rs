//! Text extraction strategies per entity type.
//!
//! The registry replaces the usual global extractor map with injected
//! strategies: deployments can register their own entity types without
//! touching the chunking engine. Unknown types fall back to the generic
//! extractor, which is never an error.

use std::collections::HashMap;

use crate::core::entity::EntityDoc;

/// Produces the canonical text for one entity. The same text feeds both
/// the content hash and the chunker, so extraction must be deterministic.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, entity: &EntityDoc) -> String;
}

/// Concatenates the whitelisted fields (title, code, description, module,
/// status, kind), skipping empty values, newline-joined.
pub struct GenericExtractor;

impl TextExtractor for GenericExtractor {
    fn extract(&self, entity: &EntityDoc) -> String {
        let fields = [
            &entity.title,
            &entity.code,
            &entity.description,
            &entity.module,
            &entity.status,
            &entity.kind,
        ];
        join_nonempty(fields.into_iter().map(|f| f.as_deref()))
    }
}

/// Requirement text includes the phase and the fit/gap classification when
/// present, since those are what analysts search for.
pub struct RequirementExtractor;

impl TextExtractor for RequirementExtractor {
    fn extract(&self, entity: &EntityDoc) -> String {
        let fit_gap = entity.extra.get("fit_gap").map(|v| format!("Fit/Gap: {v}"));
        let parts = [
            entity.title.as_deref(),
            entity.code.as_deref(),
            entity.description.as_deref(),
            entity.module.as_deref(),
            entity.phase.as_deref(),
            entity.status.as_deref(),
            fit_gap.as_deref(),
        ];
        join_nonempty(parts.into_iter())
    }
}

/// Defect text leads with severity so high-severity records cluster
/// around severity terms in both lexical and semantic space.
pub struct DefectExtractor;

impl TextExtractor for DefectExtractor {
    fn extract(&self, entity: &EntityDoc) -> String {
        let severity = entity.extra.get("severity").map(|v| format!("Severity: {v}"));
        let parts = [
            entity.title.as_deref(),
            entity.code.as_deref(),
            severity.as_deref(),
            entity.description.as_deref(),
            entity.module.as_deref(),
            entity.status.as_deref(),
        ];
        join_nonempty(parts.into_iter())
    }
}

fn join_nonempty<'a>(parts: impl Iterator<Item = Option<&'a str>>) -> String {
    parts
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Injected registry of extractors keyed by entity type.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn TextExtractor>>,
    generic: Box<dyn TextExtractor>,
}

impl ExtractorRegistry {
    /// Registry with the built-in entity types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("requirement", Box::new(RequirementExtractor));
        registry.register("defect", Box::new(DefectExtractor));
        registry
    }

    /// Registry with only the generic fallback.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
            generic: Box::new(GenericExtractor),
        }
    }

    pub fn register(&mut self, entity_type: &str, extractor: Box<dyn TextExtractor>) {
        self.extractors.insert(entity_type.to_string(), extractor);
    }

    /// Extract canonical text, falling back to the generic extractor for
    /// unknown entity types.
    pub fn extract(&self, entity: &EntityDoc) -> String {
        self.extractors
            .get(&entity.entity_type)
            .unwrap_or(&self.generic)
            .extract(entity)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

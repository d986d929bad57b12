//! KB version lifecycle: building → active → archived.
//!
//! Versions make re-indexing non-destructive: a new generation is built
//! under a fresh label, activated atomically, and the superseded label is
//! archived with its rows soft-deactivated. `building → archived` is also
//! allowed so a version that never went live can be retired.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::error::{KbError, KbResult};
use crate::store::{ChunkStore, VersionRow, VersionStatus};

/// Key-set comparison between two versions.
#[derive(Debug, Serialize)]
pub struct VersionDiff {
    /// Entities present in B but not A.
    pub added: Vec<(String, String)>,
    /// Entities present in A but not B.
    pub removed: Vec<(String, String)>,
    /// Entities in both with differing content hashes.
    pub changed: Vec<(String, String)>,
    pub unchanged: usize,
}

/// Manages index generations over the chunk store.
pub struct VersionManager<'a> {
    store: &'a ChunkStore,
}

impl<'a> VersionManager<'a> {
    pub fn new(store: &'a ChunkStore) -> Self {
        Self { store }
    }

    /// Create a new version in `building` state. The label must be unused.
    pub fn create(&self, label: &str) -> KbResult<VersionRow> {
        let row = self.store.insert_version(label)?;
        info!(version = label, "created kb version");
        Ok(row)
    }

    pub fn get(&self, label: &str) -> KbResult<VersionRow> {
        self.store
            .get_version(label)?
            .ok_or_else(|| KbError::NotFound(format!("kb version '{label}'")))
    }

    pub fn list(&self) -> KbResult<Vec<VersionRow>> {
        self.store.list_versions()
    }

    /// Activate `label`: archive whatever version was previously active and
    /// flip row activity for both, as one atomic operation.
    ///
    /// Activating the already-active version is a no-op; activating an
    /// archived version is rejected (archived is terminal).
    pub fn activate(&self, label: &str) -> KbResult<VersionRow> {
        let target = self.get(label)?;
        match target.status {
            VersionStatus::Active => return Ok(target),
            VersionStatus::Archived => {
                return Err(KbError::VersionState(format!(
                    "version '{label}' is archived and cannot be activated"
                )))
            }
            VersionStatus::Building => {}
        }

        let previous = self.store.active_version()?;
        self.store
            .promote_version(label, previous.as_ref().map(|v| v.version.as_str()))?;

        info!(
            version = label,
            superseded = ?previous.as_ref().map(|v| v.version.as_str()),
            "activated kb version"
        );
        self.get(label)
    }

    /// Archive `label` and deactivate its remaining rows. The currently
    /// active version cannot be archived; activate a replacement first.
    pub fn archive(&self, label: &str) -> KbResult<VersionRow> {
        let target = self.get(label)?;
        match target.status {
            VersionStatus::Active => {
                return Err(KbError::VersionState(format!(
                    "version '{label}' is active; activate a replacement before archiving"
                )))
            }
            VersionStatus::Archived => return Ok(target),
            VersionStatus::Building => {}
        }

        self.store.retire_version(label)?;
        info!(version = label, "archived kb version");
        self.get(label)
    }

    /// Entities whose latest record lacks a content hash (pre-versioning
    /// legacy data). A candidate list for re-indexing, not a trigger.
    pub fn find_stale(&self) -> KbResult<Vec<(String, String)>> {
        self.store.stale_entities()
    }

    /// Compare entity key sets across two versions.
    pub fn diff(&self, a: &str, b: &str) -> KbResult<VersionDiff> {
        // Both labels must be known versions (legacy baseline rows have no
        // kb_versions entry, so diff only covers managed versions).
        self.get(a)?;
        self.get(b)?;

        let in_a = self.store.version_entities(a)?;
        let in_b = self.store.version_entities(b)?;

        let keys_a: HashSet<_> = in_a.keys().cloned().collect();
        let keys_b: HashSet<_> = in_b.keys().cloned().collect();

        let mut added: Vec<_> = keys_b.difference(&keys_a).cloned().collect();
        let mut removed: Vec<_> = keys_a.difference(&keys_b).cloned().collect();
        let mut changed = Vec::new();
        let mut unchanged = 0;

        for key in keys_a.intersection(&keys_b) {
            if in_a[key] != in_b[key] {
                changed.push(key.clone());
            } else {
                unchanged += 1;
            }
        }

        added.sort();
        removed.sort();
        changed.sort();

        Ok(VersionDiff {
            added,
            removed,
            changed,
            unchanged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingEngine;
    use crate::core::entity::EntityDoc;
    use crate::index::Indexer;
    use crate::store::ChunkFilter;

    fn requirement(id: &str, description: &str) -> EntityDoc {
        EntityDoc::new("requirement", id)
            .with_title("Requirement")
            .with_description(description)
    }

    #[test]
    fn lifecycle_building_active_archived() {
        let store = ChunkStore::open_in_memory().unwrap();
        let versions = VersionManager::new(&store);

        let v1 = versions.create("1.0.0").unwrap();
        assert_eq!(v1.status, VersionStatus::Building);

        let v1 = versions.activate("1.0.0").unwrap();
        assert_eq!(v1.status, VersionStatus::Active);
        assert!(v1.activated_at.is_some());

        // Archiving the active version is rejected.
        match versions.archive("1.0.0") {
            Err(KbError::VersionState(_)) => {}
            other => panic!("expected VersionState error, got {other:?}"),
        }

        versions.create("2.0.0").unwrap();
        versions.activate("2.0.0").unwrap();

        // Superseded version was archived by the activation.
        let v1 = versions.get("1.0.0").unwrap();
        assert_eq!(v1.status, VersionStatus::Archived);

        // Archived is terminal.
        match versions.activate("1.0.0") {
            Err(KbError::VersionState(_)) => {}
            other => panic!("expected VersionState error, got {other:?}"),
        }
    }

    #[test]
    fn building_version_can_be_archived_directly() {
        let store = ChunkStore::open_in_memory().unwrap();
        let versions = VersionManager::new(&store);

        versions.create("0.9.0-rc1").unwrap();
        let row = versions.archive("0.9.0-rc1").unwrap();
        assert_eq!(row.status, VersionStatus::Archived);
    }

    #[test]
    fn activate_unknown_version_is_not_found() {
        let store = ChunkStore::open_in_memory().unwrap();
        let versions = VersionManager::new(&store);
        match versions.activate("9.9.9") {
            Err(KbError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn activate_flips_row_activity_per_entity() {
        let store = ChunkStore::open_in_memory().unwrap();
        let versions = VersionManager::new(&store);
        let indexer = Indexer::new(ChunkingEngine::with_defaults(), None, &store);

        versions.create("1.0.0").unwrap();
        indexer
            .index_entity(&requirement("42", "v1 text"), "s4", "1.0.0")
            .unwrap();
        versions.activate("1.0.0").unwrap();

        versions.create("2.0.0").unwrap();
        indexer
            .index_entity(&requirement("42", "v2 text"), "s4", "2.0.0")
            .unwrap();
        versions.activate("2.0.0").unwrap();

        // Exactly one kb_version has active rows for the entity.
        let active = store
            .scan(&ChunkFilter {
                entity_id: Some("42".to_string()),
                active_only: true,
                ..Default::default()
            })
            .unwrap();
        assert!(!active.is_empty());
        assert!(active.iter().all(|c| c.kb_version == "2.0.0"));
    }

    #[test]
    fn diff_reports_added_removed_changed() {
        let store = ChunkStore::open_in_memory().unwrap();
        let versions = VersionManager::new(&store);
        let indexer = Indexer::new(ChunkingEngine::with_defaults(), None, &store);

        versions.create("1.0.0").unwrap();
        indexer
            .index_entity(&requirement("1", "shared text"), "s4", "1.0.0")
            .unwrap();
        indexer
            .index_entity(&requirement("2", "will change"), "s4", "1.0.0")
            .unwrap();
        indexer
            .index_entity(&requirement("3", "will be removed"), "s4", "1.0.0")
            .unwrap();

        versions.create("2.0.0").unwrap();
        indexer
            .index_entity(&requirement("2", "changed text"), "s4", "2.0.0")
            .unwrap();
        indexer
            .index_entity(&requirement("4", "brand new"), "s4", "2.0.0")
            .unwrap();
        // Entity 1 is unchanged, so its re-index is skipped and it never
        // appears under 2.0.0; it shows up as removed, not unchanged.

        let diff = versions.diff("1.0.0", "2.0.0").unwrap();
        assert_eq!(
            diff.added,
            vec![("requirement".to_string(), "4".to_string())]
        );
        assert_eq!(
            diff.changed,
            vec![("requirement".to_string(), "2".to_string())]
        );
        assert!(diff
            .removed
            .contains(&("requirement".to_string(), "1".to_string())));
        assert!(diff
            .removed
            .contains(&("requirement".to_string(), "3".to_string())));
        assert_eq!(diff.unchanged, 0);
    }

    #[test]
    fn diff_with_unknown_version_is_not_found() {
        let store = ChunkStore::open_in_memory().unwrap();
        let versions = VersionManager::new(&store);
        versions.create("1.0.0").unwrap();
        match versions.diff("1.0.0", "404") {
            Err(KbError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn find_stale_reports_legacy_rows() {
        let store = ChunkStore::open_in_memory().unwrap();
        let versions = VersionManager::new(&store);

        // Simulate a pre-versioning row: no content_hash.
        store
            .raw()
            .execute(
                "INSERT INTO chunks (entity_type, entity_id, program, chunk_text,
                 chunk_index, indexed_at) VALUES ('requirement', 'old-1', 's4', 'legacy', 0, 0)",
                [],
            )
            .unwrap();

        let stale = versions.find_stale().unwrap();
        assert_eq!(
            stale,
            vec![("requirement".to_string(), "old-1".to_string())]
        );

        // Re-indexed entities are no longer stale.
        let indexer = Indexer::new(ChunkingEngine::with_defaults(), None, &store);
        indexer
            .index_entity(&requirement("old-1", "fresh text"), "s4", "1.0.0")
            .unwrap();
        assert!(versions.find_stale().unwrap().is_empty());
    }
}

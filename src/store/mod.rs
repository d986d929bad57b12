//! Chunk and version persistence on SQLite.
//!
//! Embeddings are stored as little-endian f32 BLOBs and similarity is
//! computed in Rust. This is O(n) per query but fine for the moderate
//! corpus sizes this pipeline targets; the storage layer can move to
//! sqlite-vec or an inverted index later without changing callers.
//!
//! Write granularity: replacing one entity's chunk generation
//! (deactivate old + insert new) is a single transaction, as is a version
//! activation. A failed commit leaves the prior state intact.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{KbError, KbResult};

/// Baseline label assigned to rows written before versioning existed.
pub const LEGACY_VERSION: &str = "0.0.0";

/// One persisted chunk row. `id` is the SQLite rowid and serves as the
/// deterministic tie-break key in search.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub program: String,
    pub chunk_text: String,
    pub chunk_index: usize,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub kb_version: String,
    pub content_hash: Option<String>,
    pub is_active: bool,
    pub module: Option<String>,
    pub phase: Option<String>,
    pub metadata: serde_json::Value,
    pub indexed_at: i64,
}

/// Insert payload for one chunk row; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub entity_type: String,
    pub entity_id: String,
    pub program: String,
    pub chunk_text: String,
    pub chunk_index: usize,
    pub embedding: Option<Vec<f32>>,
    pub kb_version: String,
    pub content_hash: String,
    pub module: Option<String>,
    pub phase: Option<String>,
    pub metadata: serde_json::Value,
}

/// Filter for chunk scans. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub program: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub module: Option<String>,
    pub kb_version: Option<String>,
    pub active_only: bool,
}

impl ChunkFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Default::default()
        }
    }
}

/// Version lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Building,
    Active,
    Archived,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Building => "building",
            VersionStatus::Active => "active",
            VersionStatus::Archived => "archived",
        }
    }

    fn parse(s: &str) -> KbResult<Self> {
        match s {
            "building" => Ok(VersionStatus::Building),
            "active" => Ok(VersionStatus::Active),
            "archived" => Ok(VersionStatus::Archived),
            other => Err(KbError::VersionState(format!(
                "unknown status '{other}' in store"
            ))),
        }
    }
}

/// One KB version row.
#[derive(Debug, Clone, Serialize)]
pub struct VersionRow {
    pub version: String,
    pub status: VersionStatus,
    pub created_at: i64,
    pub activated_at: Option<i64>,
    pub archived_at: Option<i64>,
}

/// Index-wide counters for `get_index_stats`.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub active_chunks: usize,
    pub inactive_chunks: usize,
    pub by_entity_type: Vec<(String, usize)>,
    pub by_version: Vec<(String, usize)>,
}

/// SQLite-backed chunk and version store.
pub struct ChunkStore {
    conn: Connection,
}

impl ChunkStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> KbResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database (for tests).
    pub fn open_in_memory() -> KbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> KbResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                program TEXT NOT NULL DEFAULT '',
                chunk_text TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB,
                kb_version TEXT NOT NULL DEFAULT '0.0.0',
                content_hash TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                module TEXT,
                phase TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                indexed_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kb_versions (
                version TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                activated_at INTEGER,
                archived_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_entity
                ON chunks(entity_type, entity_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_active ON chunks(is_active);
            CREATE INDEX IF NOT EXISTS idx_chunks_version ON chunks(kb_version);
            CREATE INDEX IF NOT EXISTS idx_chunks_program ON chunks(program);
            "#,
        )?;
        Ok(())
    }

    // ===== Chunk writes =====

    /// Replace one entity's chunk generation: deactivate the prior rows and
    /// insert the new ones, committing as a single unit. Returns the
    /// inserted records with their assigned ids.
    pub fn replace_generation(
        &self,
        entity_type: &str,
        entity_id: &str,
        chunks: &[NewChunk],
    ) -> KbResult<Vec<ChunkRecord>> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "UPDATE chunks SET is_active = 0
             WHERE entity_type = ?1 AND entity_id = ?2 AND is_active = 1",
            params![entity_type, entity_id],
        )?;

        let mut written = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let blob = chunk.embedding.as_deref().map(embedding_to_blob);
            let metadata = serde_json::to_string(&chunk.metadata)?;
            tx.execute(
                r#"
                INSERT INTO chunks
                    (entity_type, entity_id, program, chunk_text, chunk_index,
                     embedding, kb_version, content_hash, is_active, module,
                     phase, metadata, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?11, ?12)
                "#,
                params![
                    chunk.entity_type,
                    chunk.entity_id,
                    chunk.program,
                    chunk.chunk_text,
                    chunk.chunk_index as i64,
                    blob,
                    chunk.kb_version,
                    chunk.content_hash,
                    chunk.module,
                    chunk.phase,
                    metadata,
                    now,
                ],
            )?;
            let id = tx.last_insert_rowid();
            written.push(ChunkRecord {
                id,
                entity_type: chunk.entity_type.clone(),
                entity_id: chunk.entity_id.clone(),
                program: chunk.program.clone(),
                chunk_text: chunk.chunk_text.clone(),
                chunk_index: chunk.chunk_index,
                embedding: chunk.embedding.clone(),
                kb_version: chunk.kb_version.clone(),
                content_hash: Some(chunk.content_hash.clone()),
                is_active: true,
                module: chunk.module.clone(),
                phase: chunk.phase.clone(),
                metadata: chunk.metadata.clone(),
                indexed_at: now,
            });
        }

        tx.commit()?;
        Ok(written)
    }

    /// Content hash of the latest active row for an entity, if any.
    pub fn active_hash(&self, entity_type: &str, entity_id: &str) -> KbResult<Option<String>> {
        let hash: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT content_hash FROM chunks
                 WHERE entity_type = ?1 AND entity_id = ?2 AND is_active = 1
                 ORDER BY id DESC LIMIT 1",
                params![entity_type, entity_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash.flatten())
    }

    /// Bulk is_active toggle for all rows of one version. Runs on the
    /// shared connection, so it joins any open transaction.
    pub fn set_version_rows_active(&self, version: &str, active: bool) -> KbResult<usize> {
        let changed = self.conn.execute(
            "UPDATE chunks SET is_active = ?1 WHERE kb_version = ?2",
            params![active as i64, version],
        )?;
        Ok(changed)
    }

    // ===== Chunk reads =====

    /// Filtered scan. Rows come back in id order.
    pub fn scan(&self, filter: &ChunkFilter) -> KbResult<Vec<ChunkRecord>> {
        let mut sql = String::from(
            "SELECT id, entity_type, entity_id, program, chunk_text, chunk_index,
                    embedding, kb_version, content_hash, is_active, module, phase,
                    metadata, indexed_at
             FROM chunks WHERE 1=1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if filter.active_only {
            sql.push_str(" AND is_active = 1");
        }
        if let Some(program) = &filter.program {
            args.push(Box::new(program.clone()));
            sql.push_str(&format!(" AND program = ?{}", args.len()));
        }
        if let Some(entity_type) = &filter.entity_type {
            args.push(Box::new(entity_type.clone()));
            sql.push_str(&format!(" AND entity_type = ?{}", args.len()));
        }
        if let Some(entity_id) = &filter.entity_id {
            args.push(Box::new(entity_id.clone()));
            sql.push_str(&format!(" AND entity_id = ?{}", args.len()));
        }
        if let Some(module) = &filter.module {
            args.push(Box::new(module.clone()));
            sql.push_str(&format!(" AND module = ?{}", args.len()));
        }
        if let Some(version) = &filter.kb_version {
            args.push(Box::new(version.clone()));
            sql.push_str(&format!(" AND kb_version = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let params = rusqlite::params_from_iter(args.iter().map(|a| a.as_ref()));
        let rows = stmt.query_map(params, row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Entities whose latest row has no content hash (pre-versioning data).
    pub fn stale_entities(&self) -> KbResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, entity_id FROM chunks
             WHERE id IN (
                 SELECT MAX(id) FROM chunks GROUP BY entity_type, entity_id
             ) AND content_hash IS NULL
             ORDER BY entity_type, entity_id",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut entities = Vec::new();
        for row in rows {
            entities.push(row?);
        }
        Ok(entities)
    }

    /// (entity_type, entity_id) -> content_hash for all entities of a
    /// version. An entity re-indexed twice under the same label contributes
    /// its latest generation's hash.
    pub fn version_entities(&self, version: &str) -> KbResult<HashMap<(String, String), String>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, entity_id, content_hash FROM chunks
             WHERE kb_version = ?1 AND id IN (
                 SELECT MAX(id) FROM chunks WHERE kb_version = ?1
                 GROUP BY entity_type, entity_id
             )",
        )?;
        let rows = stmt.query_map(params![version], |row| {
            let hash: Option<String> = row.get(2)?;
            Ok(((row.get(0)?, row.get(1)?), hash.unwrap_or_default()))
        })?;

        let mut entities = HashMap::new();
        for row in rows {
            let (key, hash) = row?;
            entities.insert(key, hash);
        }
        Ok(entities)
    }

    pub fn get_stats(&self) -> KbResult<IndexStats> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let active: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?;

        let mut by_entity_type = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, COUNT(*) FROM chunks GROUP BY entity_type ORDER BY entity_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        for row in rows {
            by_entity_type.push(row?);
        }

        let mut by_version = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT kb_version, COUNT(*) FROM chunks GROUP BY kb_version ORDER BY kb_version",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        for row in rows {
            by_version.push(row?);
        }

        Ok(IndexStats {
            total_chunks: total as usize,
            active_chunks: active as usize,
            inactive_chunks: (total - active) as usize,
            by_entity_type,
            by_version,
        })
    }

    // ===== Version rows =====

    pub fn insert_version(&self, version: &str) -> KbResult<VersionRow> {
        let now = chrono::Utc::now().timestamp();
        let result = self.conn.execute(
            "INSERT INTO kb_versions (version, status, created_at) VALUES (?1, 'building', ?2)",
            params![version, now],
        );
        match result {
            Ok(_) => Ok(VersionRow {
                version: version.to_string(),
                status: VersionStatus::Building,
                created_at: now,
                activated_at: None,
                archived_at: None,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(KbError::VersionExists(version.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_version(&self, version: &str) -> KbResult<Option<VersionRow>> {
        self.conn
            .query_row(
                "SELECT version, status, created_at, activated_at, archived_at
                 FROM kb_versions WHERE version = ?1",
                params![version],
                row_to_version,
            )
            .optional()?
            .transpose()
    }

    pub fn list_versions(&self) -> KbResult<Vec<VersionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT version, status, created_at, activated_at, archived_at
             FROM kb_versions ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_version)?;

        let mut versions = Vec::new();
        for row in rows {
            versions.push(row??);
        }
        Ok(versions)
    }

    /// The currently active version, if any.
    pub fn active_version(&self) -> KbResult<Option<VersionRow>> {
        self.conn
            .query_row(
                "SELECT version, status, created_at, activated_at, archived_at
                 FROM kb_versions WHERE status = 'active'",
                [],
                row_to_version,
            )
            .optional()?
            .transpose()
    }

    /// Activate `version` and archive the previously active one, flipping
    /// row activity for both as one transaction.
    pub fn promote_version(&self, version: &str, previous: Option<&str>) -> KbResult<()> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;

        if let Some(prev) = previous {
            self.set_version_rows_active(prev, false)?;
            tx.execute(
                "UPDATE kb_versions SET status = 'archived', archived_at = ?1 WHERE version = ?2",
                params![now, prev],
            )?;
        }
        self.set_version_rows_active(version, true)?;
        tx.execute(
            "UPDATE kb_versions SET status = 'active', activated_at = ?1 WHERE version = ?2",
            params![now, version],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Raw connection access for failure-injection in tests.
    #[cfg(test)]
    pub(crate) fn raw(&self) -> &Connection {
        &self.conn
    }

    /// Archive a non-active version and deactivate its remaining rows.
    pub fn retire_version(&self, version: &str) -> KbResult<()> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;

        self.set_version_rows_active(version, false)?;
        tx.execute(
            "UPDATE kb_versions SET status = 'archived', archived_at = ?1 WHERE version = ?2",
            params![now, version],
        )?;

        tx.commit()?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
    let blob: Option<Vec<u8>> = row.get(6)?;
    let metadata_json: String = row.get(12)?;
    let metadata =
        serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Object(Default::default()));
    Ok(ChunkRecord {
        id: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: row.get(2)?,
        program: row.get(3)?,
        chunk_text: row.get(4)?,
        chunk_index: row.get::<_, i64>(5)? as usize,
        embedding: blob.as_deref().map(blob_to_embedding),
        kb_version: row.get(7)?,
        content_hash: row.get(8)?,
        is_active: row.get::<_, i64>(9)? != 0,
        module: row.get(10)?,
        phase: row.get(11)?,
        metadata,
        indexed_at: row.get(13)?,
    })
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<KbResult<VersionRow>> {
    let status: String = row.get(1)?;
    let version: String = row.get(0)?;
    let created_at: i64 = row.get(2)?;
    let activated_at: Option<i64> = row.get(3)?;
    let archived_at: Option<i64> = row.get(4)?;
    Ok(VersionStatus::parse(&status).map(|status| VersionRow {
        version,
        status,
        created_at,
        activated_at,
        archived_at,
    }))
}

/// f32 slice to little-endian BLOB.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Little-endian BLOB back to f32 vector.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

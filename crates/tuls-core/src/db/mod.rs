//! SQLite-backed memory chunk store.
//!
//! The store is shared with external ingestion tooling, so it is opened in
//! WAL mode with a bounded busy wait: readers and a background writer block
//! for up to `busy_timeout_ms` on lock contention and then fail with
//! `StoreBusy` instead of failing immediately.
//!
//! Search modes:
//! - **keyword**: FTS5 `MATCH`, ranked by bm25 term-frequency relevance
//! - **vector**: cosine similarity between the query embedding and stored embeddings
//!
//! When both run, results are merged by score descending, ties broken by the
//! more recent `created_at`.

pub mod migrations;
pub mod traits;
pub mod vector;

pub use traits::ChunkStore;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    IndexReport, MatchKind, MemoryChunk, NewChunk, SearchResult, StoreSearchOptions, StoreStats,
};

/// Default lock wait before a query fails with `StoreBusy`
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Maximum snippet length in characters
const SNIPPET_CHARS: usize = 240;

/// Chunk store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Busy wait in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// SQLite chunk store.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct SqliteChunkStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    busy_timeout_ms: u64,
}

impl SqliteChunkStore {
    /// Open (or create) the store at a specific path
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| Error::from_sqlite(e, config.busy_timeout_ms))?;
        Self::configure(&conn, &config)?;

        info!(
            path = %path.display(),
            busy_timeout_ms = config.busy_timeout_ms,
            "Opened chunk store"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
            busy_timeout_ms: config.busy_timeout_ms,
        })
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let config = StoreConfig::default();
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, &config)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            busy_timeout_ms: config.busy_timeout_ms,
        })
    }

    fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
        let map = |e| Error::from_sqlite(e, config.busy_timeout_ms);

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(map)?;
        // journal_mode returns a row, so it cannot go through execute_batch
        let _mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(map)?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;").map_err(map)?;
        migrations::run_migrations(conn).map_err(map)?;
        Ok(())
    }

    /// Path of the backing file, None for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Configured busy wait
    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms
    }

    /// Busy timeout as reported by SQLite for the open connection
    pub fn effective_busy_timeout_ms(&self) -> Result<u64> {
        let conn = self.lock()?;
        let ms: i64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .map_err(|e| self.map_err(e))?;
        Ok(ms.max(0) as u64)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace every chunk derived from `source_file`.
    ///
    /// Nothing is rewritten when the stored chunks already have the same
    /// namespace, content and embeddings in the same order.
    pub fn index_source(
        &self,
        source_file: &str,
        namespace: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<IndexReport> {
        if namespace.trim().is_empty() {
            return Err(Error::InvalidChunk("namespace must not be empty".into()));
        }
        if source_file.trim().is_empty() {
            return Err(Error::InvalidChunk("source_file must not be empty".into()));
        }

        let hashes: Vec<String> = chunks.iter().map(hash_chunk).collect();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.map_err(e))?;

        let existing: Vec<(String, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT namespace, content_hash FROM memory_chunks
                     WHERE source_file = ?1 ORDER BY ordinal",
                )
                .map_err(|e| self.map_err(e))?;
            let rows = stmt
                .query_map(params![source_file], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(|e| self.map_err(e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| self.map_err(e))?
        };

        let unchanged = existing.len() == hashes.len()
            && existing
                .iter()
                .zip(hashes.iter())
                .all(|((ns, h), new_h)| ns == namespace && h == new_h);

        if unchanged {
            debug!(source_file, chunks = hashes.len(), "Source unchanged, skipping re-index");
            return Ok(IndexReport {
                source_file: source_file.to_string(),
                inserted: 0,
                removed: 0,
                unchanged: true,
            });
        }

        let removed = tx
            .execute(
                "DELETE FROM memory_chunks WHERE source_file = ?1",
                params![source_file],
            )
            .map_err(|e| self.map_err(e))?;

        let now = Utc::now().timestamp_millis();
        for (ordinal, (chunk, hash)) in chunks.iter().zip(hashes.iter()).enumerate() {
            let embedding = chunk.embedding.as_deref().map(vector::encode_embedding);
            tx.execute(
                "INSERT INTO memory_chunks
                    (id, namespace, source_file, ordinal, content, content_hash, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    Uuid::new_v4().to_string(),
                    namespace,
                    source_file,
                    ordinal as i64,
                    &chunk.content,
                    hash,
                    embedding,
                    now,
                ],
            )
            .map_err(|e| self.map_err(e))?;
        }

        tx.commit().map_err(|e| self.map_err(e))?;

        info!(
            source_file,
            namespace,
            inserted = chunks.len(),
            removed,
            "Indexed source"
        );

        Ok(IndexReport {
            source_file: source_file.to_string(),
            inserted: chunks.len(),
            removed,
            unchanged: false,
        })
    }

    /// Remove every chunk derived from `source_file`
    pub fn remove_source(&self, source_file: &str) -> Result<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM memory_chunks WHERE source_file = ?1",
            params![source_file],
        )
        .map_err(|e| self.map_err(e))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a chunk by ID
    pub fn get(&self, id: &str) -> Result<Option<MemoryChunk>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, content, namespace, source_file, embedding, created_at
             FROM memory_chunks WHERE id = ?1",
            params![id],
            |row| {
                let embedding: Option<Vec<u8>> = row.get(4)?;
                Ok(MemoryChunk {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    namespace: row.get(2)?,
                    source_file: row.get(3)?,
                    embedding: embedding.as_deref().and_then(vector::decode_embedding),
                    created_at: millis_to_datetime(row.get(5)?),
                })
            },
        )
        .optional()
        .map_err(|e| self.map_err(e))
    }

    /// Count chunks, optionally within one namespace
    pub fn count(&self, namespace: Option<&str>) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memory_chunks WHERE (?1 IS NULL OR namespace = ?1)",
                params![namespace],
                |row| row.get(0),
            )
            .map_err(|e| self.map_err(e))?;
        Ok(count as usize)
    }

    /// Distinct namespaces, sorted
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT namespace FROM memory_chunks ORDER BY namespace")
            .map_err(|e| self.map_err(e))?;
        let namespaces = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| self.map_err(e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| self.map_err(e))?;
        Ok(namespaces)
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let map = |e| self.map_err(e);

        let (total, embedded, sources): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        COUNT(embedding),
                        COUNT(DISTINCT source_file)
                 FROM memory_chunks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(map)?;

        let mut stmt = conn
            .prepare(
                "SELECT namespace, COUNT(*) FROM memory_chunks
                 GROUP BY namespace ORDER BY namespace",
            )
            .map_err(map)?;
        let namespaces = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))
            .map_err(map)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map)?;

        Ok(StoreStats {
            total_chunks: total as usize,
            embedded_chunks: embedded as usize,
            sources: sources as usize,
            namespaces,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    fn map_err(&self, err: rusqlite::Error) -> Error {
        Error::from_sqlite(err, self.busy_timeout_ms)
    }

    fn keyword_search(
        conn: &Connection,
        query: &str,
        options: &StoreSearchOptions,
    ) -> rusqlite::Result<Vec<SearchResult>> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let limit = options.max_results.max(1).saturating_mul(2) as i64;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.content, c.namespace, c.source_file, c.created_at,
                    bm25(memory_chunks_fts) AS raw_rank
             FROM memory_chunks_fts
             JOIN memory_chunks c ON c.id = memory_chunks_fts.chunk_id
             WHERE memory_chunks_fts MATCH ?1
               AND (?2 IS NULL OR c.namespace = ?2)
             ORDER BY raw_rank
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![fts, options.namespace, limit], |row| {
            let content: String = row.get(1)?;
            let raw_rank: f64 = row.get(5)?;
            Ok(SearchResult {
                chunk_id: row.get(0)?,
                snippet: make_snippet(&content),
                score: normalize_bm25(raw_rank),
                namespace: row.get(2)?,
                source_file: row.get(3)?,
                created_at: millis_to_datetime(row.get(4)?),
                match_kind: MatchKind::Keyword,
            })
        })?;

        rows.collect()
    }

    fn vector_search(
        conn: &Connection,
        embedding: &[f32],
        options: &StoreSearchOptions,
    ) -> rusqlite::Result<Vec<SearchResult>> {
        let mut stmt = conn.prepare(
            "SELECT id, content, namespace, source_file, created_at, embedding
             FROM memory_chunks
             WHERE embedding IS NOT NULL
               AND (?1 IS NULL OR namespace = ?1)",
        )?;

        let rows = stmt.query_map(params![options.namespace], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Vec<u8>>(5)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, content, namespace, source_file, created_at, blob) = row?;
            let Some(stored) = vector::decode_embedding(&blob) else {
                continue;
            };
            let similarity = vector::cosine_similarity(embedding, &stored).max(0.0);
            results.push(SearchResult {
                chunk_id: id,
                snippet: make_snippet(&content),
                score: similarity as f64,
                namespace,
                source_file,
                created_at: millis_to_datetime(created_at),
                match_kind: MatchKind::Vector,
            });
        }

        Ok(results)
    }
}

impl ChunkStore for SqliteChunkStore {
    fn search(&self, query: &str, options: &StoreSearchOptions) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let keyword = Self::keyword_search(&conn, query, options).map_err(|e| self.map_err(e))?;

        let vector = match options.query_embedding.as_deref() {
            Some(embedding) if options.vector_enabled() => {
                Self::vector_search(&conn, embedding, options).map_err(|e| self.map_err(e))?
            }
            _ => Vec::new(),
        };

        debug!(
            namespace = ?options.namespace,
            keyword_hits = keyword.len(),
            vector_hits = vector.len(),
            "Chunk store search"
        );

        Ok(merge_results(
            keyword,
            vector,
            options.max_results,
            options.min_score,
        ))
    }
}

/// Merge keyword and vector hits.
///
/// Duplicates keep their higher score. Sorted by score descending, then by
/// more recent `created_at`, then by chunk id for a stable order.
pub fn merge_results(
    keyword: Vec<SearchResult>,
    vector: Vec<SearchResult>,
    max_results: usize,
    min_score: f64,
) -> Vec<SearchResult> {
    let mut by_id: HashMap<String, SearchResult> = HashMap::new();
    for result in keyword.into_iter().chain(vector) {
        match by_id.get(&result.chunk_id) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                by_id.insert(result.chunk_id.clone(), result);
            }
        }
    }

    let mut merged: Vec<SearchResult> = by_id
        .into_values()
        .filter(|r| r.score >= min_score)
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    merged.truncate(max_results);
    merged
}

/// Build an FTS5 query from free text.
///
/// Each alphanumeric term is quoted and OR-ed, so user punctuation never
/// reaches the FTS parser. Returns None when no term survives.
pub fn fts_query(text: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
    {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    if terms.is_empty() {
        return None;
    }

    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// Map bm25 (lower is better, usually negative) onto [0, 1).
fn normalize_bm25(raw: f64) -> f64 {
    let relevance = (-raw).max(0.0);
    relevance / (1.0 + relevance)
}

fn make_snippet(content: &str) -> String {
    if content.chars().count() <= SNIPPET_CHARS {
        return content.to_string();
    }
    let mut snippet: String = content.chars().take(SNIPPET_CHARS).collect();
    snippet.push('…');
    snippet
}

/// Hash of content plus embedding, so a vector backfill counts as a change
fn hash_chunk(chunk: &NewChunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.content.as_bytes());
    match chunk.embedding.as_deref() {
        Some(embedding) => {
            hasher.update([1u8]);
            hasher.update(vector::encode_embedding(embedding));
        }
        None => hasher.update([0u8]),
    }
    hex::encode(hasher.finalize())
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

//! SQLite-backed knowledge index.
//!
//! Stores documents and embedded chunks, and answers semantic and hybrid
//! queries by scoring every stored chunk in process.

use crate::backend::{KnowledgeStore, SearchBackend};
use crate::types::{DocumentRecord, HybridHit, Metadata, SearchHit, StoredChunk};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use sift_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use unicode_segmentation::UnicodeSegmentation;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source TEXT NOT NULL,
    metadata TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata TEXT,
    FOREIGN KEY (document_id) REFERENCES documents(id)
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
"#;

/// A chunk row joined with its document, as read for scoring.
struct ScoredRow {
    chunk_id: String,
    document_id: String,
    content: String,
    embedding: Vec<f32>,
    metadata: Metadata,
    document_title: String,
    document_source: String,
}

/// SQLite knowledge index.
///
/// Cloning shares the underlying connection.
#[derive(Debug, Clone)]
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteIndex {
    /// Open (or create) the index database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;
        init_schema(&conn)?;

        tracing::debug!("Initialized SQLite index at {:?}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(db_path.to_path_buf()),
        })
    }

    /// Open a private in-memory index.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Path of the database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a document.
    pub fn insert_document(&self, document: &DocumentRecord) -> AppResult<()> {
        write_document(&self.lock(), document, "INSERT OR REPLACE")
    }

    /// Insert or replace a chunk with its embedding.
    pub fn insert_chunk(&self, chunk: &StoredChunk) -> AppResult<()> {
        write_chunk(&self.lock(), chunk)
    }

    /// Store a batch of documents and chunks in one transaction.
    ///
    /// Documents already in the index keep their row. Chunk positions are
    /// taken relative to the batch and continue after the highest position
    /// already stored for the same document. Nothing is written if any
    /// insert fails.
    pub async fn append(
        &self,
        documents: Vec<DocumentRecord>,
        chunks: Vec<StoredChunk>,
    ) -> AppResult<()> {
        self.run_blocking(move |conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

            for document in &documents {
                write_document(&tx, document, "INSERT OR IGNORE")?;
            }

            let mut offsets: HashMap<String, u32> = HashMap::new();
            for mut chunk in chunks {
                let offset = match offsets.entry(chunk.document_id.clone()) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => *entry.insert(next_position(&tx, &chunk.document_id)?),
                };
                chunk.position += offset;
                write_chunk(&tx, &chunk)?;
            }

            tx.commit()
                .map_err(|e| AppError::Knowledge(format!("Failed to commit chunks: {}", e)))
        })
        .await
    }

    /// Get (documents, chunks) counts.
    pub fn stats(&self) -> AppResult<(u64, u64)> {
        let conn = self.lock();
        let documents_count = count_rows(&conn, "documents")?;
        let chunks_count = count_rows(&conn, "chunks")?;
        Ok((documents_count, chunks_count))
    }

    /// Reset the index (delete all data).
    pub fn reset(&self) -> AppResult<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM chunks", [])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;
        conn.execute("DELETE FROM documents", [])
            .map_err(|e| AppError::Knowledge(format!("Failed to delete documents: {}", e)))?;

        tracing::info!("Reset knowledge index");
        Ok(())
    }

    /// Run blocking SQLite work off the async runtime.
    async fn run_blocking<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            work(&guard)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))?
    }
}

#[async_trait]
impl SearchBackend for SqliteIndex {
    async fn semantic(
        &self,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> AppResult<Vec<SearchHit>> {
        let embedding = embedding.to_vec();
        self.run_blocking(move |conn| semantic_matches(conn, &embedding, limit, threshold))
            .await
    }

    async fn hybrid(
        &self,
        embedding: &[f32],
        query_text: &str,
        limit: usize,
        text_weight: f32,
    ) -> AppResult<Vec<HybridHit>> {
        let embedding = embedding.to_vec();
        let query_text = query_text.to_string();
        self.run_blocking(move |conn| {
            hybrid_matches(conn, &embedding, &query_text, limit, text_weight)
        })
        .await
    }
}

#[async_trait]
impl KnowledgeStore for SqliteIndex {
    async fn total_chunk_count(&self) -> AppResult<u64> {
        self.run_blocking(|conn| count_rows(conn, "chunks")).await
    }
}

fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))
}

fn write_document(conn: &Connection, document: &DocumentRecord, verb: &str) -> AppResult<()> {
    let metadata_json = serde_json::to_string(&document.metadata)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize metadata: {}", e)))?;

    conn.execute(
        &format!(
            "{} INTO documents (id, title, source, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            verb
        ),
        params![
            document.id,
            document.title,
            document.source,
            metadata_json,
            document.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert document: {}", e)))?;

    Ok(())
}

fn write_chunk(conn: &Connection, chunk: &StoredChunk) -> AppResult<()> {
    let embedding_bytes = embedding_to_bytes(&chunk.embedding);
    let metadata_json = serde_json::to_string(&chunk.metadata)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize metadata: {}", e)))?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, document_id, position, content, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.id,
            chunk.document_id,
            chunk.position as i64,
            chunk.content,
            embedding_bytes,
            metadata_json,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

/// First free chunk position for `document_id`.
fn next_position(conn: &Connection, document_id: &str) -> AppResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM chunks WHERE document_id = ?1",
        params![document_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|next| next.clamp(0, u32::MAX as i64) as u32)
    .map_err(|e| AppError::Knowledge(format!("Failed to read chunk positions: {}", e)))
}

fn count_rows(conn: &Connection, table: &str) -> AppResult<u64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|count| count.max(0) as u64)
    .map_err(|e| AppError::Knowledge(format!("Failed to count {}: {}", table, e)))
}

/// Read every chunk joined with its document, in insertion order.
fn load_rows(conn: &Connection) -> AppResult<Vec<ScoredRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.document_id, c.content, c.embedding, c.metadata, d.title, d.source
             FROM chunks c JOIN documents d ON d.id = c.document_id
             ORDER BY c.rowid",
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(3)?;
            let metadata_json: Option<String> = row.get(4)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                embedding_bytes,
                metadata_json,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut scored = Vec::new();
    for row in rows {
        let (chunk_id, document_id, content, embedding_bytes, metadata_json, title, source) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk row: {}", e)))?;

        let metadata = match metadata_json {
            Some(json) if !json.is_empty() => serde_json::from_str(&json).map_err(|e| {
                AppError::Knowledge(format!("Corrupt metadata for chunk {}: {}", chunk_id, e))
            })?,
            _ => Metadata::new(),
        };

        scored.push(ScoredRow {
            embedding: bytes_to_embedding(&embedding_bytes)?,
            chunk_id,
            document_id,
            content,
            metadata,
            document_title: title,
            document_source: source,
        });
    }

    Ok(scored)
}

/// Semantic query: cosine similarity, thresholded, top-`limit`.
pub(crate) fn semantic_matches(
    conn: &Connection,
    query_embedding: &[f32],
    limit: usize,
    threshold: f32,
) -> AppResult<Vec<SearchHit>> {
    let mut hits = Vec::new();
    for row in load_rows(conn)? {
        let similarity = vector_score(query_embedding, &row)?;
        if similarity < threshold {
            continue;
        }
        hits.push(SearchHit {
            similarity,
            chunk_id: row.chunk_id,
            document_id: row.document_id,
            content: row.content,
            metadata: row.metadata,
            document_title: row.document_title,
            document_source: row.document_source,
        });
    }

    hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
    hits.truncate(limit);

    tracing::debug!(
        "Semantic query returned {} chunks (limit {}, threshold {:.2})",
        hits.len(),
        limit,
        threshold
    );
    Ok(hits)
}

/// Hybrid query: blended vector and lexical score, top-`limit`, unthresholded.
pub(crate) fn hybrid_matches(
    conn: &Connection,
    query_embedding: &[f32],
    query_text: &str,
    limit: usize,
    text_weight: f32,
) -> AppResult<Vec<HybridHit>> {
    let weight = if text_weight.is_nan() { 0.0 } else { text_weight.clamp(0.0, 1.0) };
    let query_terms = terms(query_text);

    let mut hits = Vec::new();
    for row in load_rows(conn)? {
        let vector_similarity = vector_score(query_embedding, &row)?;
        let text_similarity = term_overlap(&query_terms, &row.content);
        hits.push(HybridHit {
            combined_score: (1.0 - weight) * vector_similarity + weight * text_similarity,
            vector_similarity,
            text_similarity,
            chunk_id: row.chunk_id,
            document_id: row.document_id,
            content: row.content,
            metadata: row.metadata,
            document_title: row.document_title,
            document_source: row.document_source,
        });
    }

    hits.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(Ordering::Equal)
    });
    hits.truncate(limit);

    tracing::debug!(
        "Hybrid query returned {} chunks (limit {}, text weight {:.2})",
        hits.len(),
        limit,
        weight
    );
    Ok(hits)
}

/// Cosine score of a stored row against the query.
///
/// A stored embedding of another dimension was written by a different
/// provider configuration and cannot be compared.
fn vector_score(query_embedding: &[f32], row: &ScoredRow) -> AppResult<f32> {
    if row.embedding.len() != query_embedding.len() {
        return Err(AppError::Knowledge(format!(
            "Embedding dimension mismatch: query has {} dimensions but chunk {} has {}; reload the knowledge store with the current embedding provider",
            query_embedding.len(),
            row.chunk_id,
            row.embedding.len()
        )));
    }
    Ok(cosine_similarity(query_embedding, &row.embedding))
}

/// Lower-cased distinct words of `text`.
fn terms(text: &str) -> HashSet<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Fraction of query terms present in `content`, in [0, 1].
pub fn text_similarity(query_text: &str, content: &str) -> f32 {
    term_overlap(&terms(query_text), content)
}

fn term_overlap(query_terms: &HashSet<String>, content: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = terms(content);
    let matched = query_terms.intersection(&content_terms).count();
    matched as f32 / query_terms.len() as f32
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Open, string-keyed chunk metadata. Values are opaque to the store.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A source document registered in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique document identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Source path or URL
    pub source: String,

    /// Document-level metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// When the document was loaded
    pub created_at: DateTime<Utc>,
}

/// A chunk persisted with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique chunk identifier
    pub id: String,

    /// Owning document
    pub document_id: String,

    /// Position within the document as loaded
    pub position: u32,

    /// Text content
    pub content: String,

    /// Embedding vector
    pub embedding: Vec<f32>,

    /// Chunk metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// One semantic search hit. Already filtered by the requested threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub similarity: f32,
    #[serde(default)]
    pub metadata: Metadata,
    pub document_title: String,
    pub document_source: String,
}

/// One hybrid search hit. Never filtered by a similarity threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridHit {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,

    /// Blend of vector and text similarity
    pub combined_score: f32,

    /// Cosine similarity against the query embedding
    pub vector_similarity: f32,

    /// Lexical overlap with the query text
    pub text_similarity: f32,

    #[serde(default)]
    pub metadata: Metadata,
    pub document_title: String,
    pub document_source: String,
}

/// One line of a pre-chunked JSONL input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Document identifier; derived from the source when absent
    #[serde(default)]
    pub document_id: Option<String>,

    /// Chunk identifier; generated when absent
    #[serde(default)]
    pub chunk_id: Option<String>,

    pub document_title: String,
    pub document_source: String,
    pub content: String,

    #[serde(default)]
    pub metadata: Metadata,
}

/// Options for the load operation.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// JSONL files or directories to load
    pub paths: Vec<PathBuf>,

    /// Reset the store before loading
    pub reset: bool,
}

/// Statistics from a load operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadStats {
    /// Number of files read
    pub files_count: u32,

    /// Number of distinct documents registered
    pub documents_count: u32,

    /// Number of chunks embedded and stored
    pub chunks_count: u32,

    /// Records skipped because their content was blank
    pub skipped_count: u32,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for the knowledge store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of documents
    pub documents_count: u64,

    /// Number of chunks
    pub chunks_count: u64,

    /// Database size in bytes
    pub db_size_bytes: u64,
}

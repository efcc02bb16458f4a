//! Workflow data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sift_core::{AppError, RetrievalSettings};
use sift_knowledge::{HybridHit, SearchHit};
use std::fmt;
use std::str::FromStr;

pub use sift_knowledge::Metadata;

/// Metadata key holding a hybrid hit's vector similarity.
pub const VECTOR_SIMILARITY_KEY: &str = "vector_similarity";

/// Metadata key holding a hybrid hit's lexical similarity.
pub const TEXT_SIMILARITY_KEY: &str = "text_similarity";

/// Retrieval mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Vector similarity, filtered by the backend
    #[default]
    Semantic,

    /// Vector plus lexical ranking, filtered by the coordinator
    Hybrid,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(AppError::Validation(format!(
                "Unknown search type '{}'. Expected 'semantic' or 'hybrid'",
                other
            ))),
        }
    }
}

/// A retrieved chunk as presented for approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,

    /// Similarity for semantic results, combined score for hybrid results
    pub similarity: f32,

    #[serde(default)]
    pub metadata: Metadata,

    pub document_title: String,
    pub document_source: String,

    /// 1-based position among this document's chunks in the current result set
    #[serde(default = "default_chunk_index")]
    pub chunk_index: u32,

    /// Display copy of the approval state; the approval set is authoritative
    #[serde(default)]
    pub approved: bool,
}

fn default_chunk_index() -> u32 {
    1
}

impl From<SearchHit> for Chunk {
    fn from(hit: SearchHit) -> Self {
        Self {
            chunk_id: hit.chunk_id,
            document_id: hit.document_id,
            content: hit.content,
            similarity: hit.similarity,
            metadata: hit.metadata,
            document_title: hit.document_title,
            document_source: hit.document_source,
            chunk_index: default_chunk_index(),
            approved: false,
        }
    }
}

impl From<HybridHit> for Chunk {
    fn from(hit: HybridHit) -> Self {
        let mut metadata = hit.metadata;
        metadata.insert(
            VECTOR_SIMILARITY_KEY.to_string(),
            serde_json::Value::from(hit.vector_similarity),
        );
        metadata.insert(
            TEXT_SIMILARITY_KEY.to_string(),
            serde_json::Value::from(hit.text_similarity),
        );

        Self {
            chunk_id: hit.chunk_id,
            document_id: hit.document_id,
            content: hit.content,
            similarity: hit.combined_score,
            metadata,
            document_title: hit.document_title,
            document_source: hit.document_source,
            chunk_index: default_chunk_index(),
            approved: false,
        }
    }
}

impl Chunk {
    /// Short label used in replies, e.g. `Chunk 2 of Annual Report`.
    pub fn label(&self) -> String {
        format!("Chunk {} of {}", self.chunk_index, self.document_title)
    }

    /// Similarity as a whole percentage.
    pub fn match_percent(&self) -> String {
        format!("{:.0}%", self.similarity * 100.0)
    }
}

/// One search request as recorded in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub requested_count: usize,
    pub search_type: SearchType,
}

impl SearchQuery {
    pub fn new(query: &str, config: &SearchConfig) -> Self {
        Self {
            query: query.to_string(),
            timestamp: Utc::now(),
            requested_count: config.max_results,
            search_type: config.search_type,
        }
    }
}

/// Observer-adjustable search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub similarity_threshold: f32,
    pub max_results: usize,
    #[serde(default)]
    pub search_type: SearchType,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            max_results: 10,
            search_type: SearchType::Semantic,
        }
    }
}

impl SearchConfig {
    /// Initial config of a new session.
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            similarity_threshold: settings.default_similarity_threshold,
            max_results: settings.default_match_count,
            search_type: SearchType::Semantic,
        }
        .clamped(settings.max_match_count.max(1))
        .0
    }

    /// Clamp into range: threshold to [0, 1] (NaN becomes the default) and
    /// `max_results` to [1, ceiling]. The flag reports whether anything moved.
    pub fn clamped(self, ceiling: usize) -> (Self, bool) {
        let ceiling = ceiling.max(1);

        let similarity_threshold = if self.similarity_threshold.is_nan() {
            Self::default().similarity_threshold
        } else {
            self.similarity_threshold.clamp(0.0, 1.0)
        };
        let max_results = self.max_results.clamp(1, ceiling);

        let changed = similarity_threshold.to_bits() != self.similarity_threshold.to_bits()
            || max_results != self.max_results;

        (
            Self {
                similarity_threshold,
                max_results,
                search_type: self.search_type,
            },
            changed,
        )
    }
}

/// Workflow position derived from the state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Searching,
    AwaitingApproval,
    Synthesizing,
    Error,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Synthesizing => "synthesizing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

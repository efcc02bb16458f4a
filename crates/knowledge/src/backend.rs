//! Search backend and knowledge store contracts.
//!
//! The retrieval workflow only talks to these traits; `SqliteIndex` is the
//! bundled implementation.

use crate::types::{HybridHit, SearchHit};
use async_trait::async_trait;
use sift_core::AppResult;

/// Ranked chunk retrieval.
///
/// Both methods return hits in descending score order.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Vector similarity search.
    ///
    /// Only hits with `similarity >= threshold` are returned.
    async fn semantic(
        &self,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> AppResult<Vec<SearchHit>>;

    /// Vector plus lexical search ranked by `combined_score`.
    ///
    /// No similarity threshold is applied; callers filter.
    async fn hybrid(
        &self,
        embedding: &[f32],
        query_text: &str,
        limit: usize,
        text_weight: f32,
    ) -> AppResult<Vec<HybridHit>>;
}

/// Store-wide statistics.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Total number of chunks held by the store.
    async fn total_chunk_count(&self) -> AppResult<u64>;
}

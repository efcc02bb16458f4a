//! Search orchestration.
//!
//! The coordinator turns one query into a ranked, indexed chunk list on a
//! session. Provider and backend failures never escape as errors: they move
//! the session into its error state and come back as a failed
//! [`SearchOutcome`].

use crate::indexer::assign_indices;
use crate::session::Session;
use crate::types::{Chunk, SearchConfig, SearchQuery, SearchType};
use sift_core::{AppError, AppResult, RetrievalSettings};
use sift_knowledge::{EmbeddingProvider, HybridHit, KnowledgeStore, SearchBackend};
use std::sync::Arc;
use std::time::Duration;

/// Number of sources listed in a search reply.
const LISTED_SOURCES: usize = 5;

/// Error recorded when a search future is dropped mid-flight.
pub const CANCELLED_MESSAGE: &str = "search cancelled before completion";

/// Result of one `execute_search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Retained chunks in rank order; empty on failure
    pub chunks: Vec<Chunk>,

    /// Failure cause, if the search failed
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Reply text for the caller.
    pub fn message(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Search failed: {}", error);
        }

        if self.chunks.is_empty() {
            return "No relevant sources found in the knowledge base.".to_string();
        }

        let sources: Vec<String> = self
            .chunks
            .iter()
            .take(LISTED_SOURCES)
            .map(|c| format!("- {} ({} match)", c.label(), c.match_percent()))
            .collect();

        format!(
            "Found {} sources. They are now displayed for review.\n{}",
            self.chunks.len(),
            sources.join("\n")
        )
    }
}

/// Keep hybrid hits scoring at least `threshold`, in rank order.
///
/// The hybrid backend applies no threshold of its own, unlike the semantic
/// one, so this is the only place hybrid results are cut.
pub fn filter_hybrid(hits: Vec<HybridHit>, threshold: f32) -> Vec<Chunk> {
    hits.into_iter()
        .filter(|hit| hit.combined_score >= threshold)
        .map(Chunk::from)
        .collect()
}

/// Moves the session to the error state if a search is dropped before it
/// records its result.
struct SearchGuard<'a> {
    session: &'a Session,
    armed: bool,
}

impl<'a> SearchGuard<'a> {
    fn new(session: &'a Session) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(session_id = %self.session.id(), "search.cancelled");
            self.session.commit(|state| state.fail_search(CANCELLED_MESSAGE));
        }
    }
}

/// Runs searches against the configured collaborators.
///
/// Holds no per-session state; one coordinator serves every session.
pub struct RetrievalCoordinator {
    embedder: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn KnowledgeStore>,
    settings: RetrievalSettings,
}

impl RetrievalCoordinator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn SearchBackend>,
        store: Arc<dyn KnowledgeStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            backend,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Search with the session's current config and record the result.
    ///
    /// Only an empty query is an error; it leaves the session untouched.
    /// Every other failure is recorded on the session and returned as a
    /// failed outcome.
    pub async fn execute_search(&self, session: &Session, query: &str) -> AppResult<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation(
                "Search query must not be empty".to_string(),
            ));
        }

        let _exclusive = session.exclusive().await;

        let (record, config) = session.update(|state| {
            let config = state.search_config().clone();
            let record = SearchQuery::new(query, &config);
            state.begin_search(&record);
            (record, config)
        });

        tracing::info!(
            session_id = %session.id(),
            query = %query,
            search_type = %config.search_type,
            threshold = config.similarity_threshold,
            max_results = config.max_results,
            "search.started"
        );

        let guard = SearchGuard::new(session);

        let timeout = Duration::from_secs(self.settings.search_timeout_secs.max(1));
        let retrieved = match tokio::time::timeout(timeout, self.retrieve(query, &config)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Provider(format!(
                "Search timed out after {}s",
                timeout.as_secs()
            ))),
        };

        let outcome = match retrieved {
            Ok((chunks, total_chunks)) => {
                let outcome_chunks = chunks.clone();
                session.commit(|state| state.complete_search(record, chunks, total_chunks));

                tracing::info!(
                    session_id = %session.id(),
                    query = %query,
                    chunks_found = outcome_chunks.len(),
                    "search.completed"
                );
                for chunk in &outcome_chunks {
                    tracing::debug!(
                        chunk_index = chunk.chunk_index,
                        document_title = %chunk.document_title,
                        similarity = %chunk.match_percent(),
                        "search.chunk"
                    );
                }

                SearchOutcome {
                    chunks: outcome_chunks,
                    error: None,
                }
            }
            Err(e) => {
                let cause = e.to_string();
                session.commit(|state| state.fail_search(&cause));

                tracing::warn!(
                    session_id = %session.id(),
                    query = %query,
                    error = %cause,
                    "search.failed"
                );

                SearchOutcome {
                    chunks: Vec::new(),
                    error: Some(cause),
                }
            }
        };

        guard.disarm();
        Ok(outcome)
    }

    /// Re-read the store size into the session.
    ///
    /// A failure marks the store status as errored and is returned; the
    /// workflow state is unaffected.
    pub async fn refresh_stats(&self, session: &Session) -> AppResult<u64> {
        let _exclusive = session.exclusive().await;

        match self.store.total_chunk_count().await {
            Ok(total) => {
                session.commit(|state| state.stats_refreshed(total));
                tracing::info!(session_id = %session.id(), total_chunks = total, "stats.refreshed");
                Ok(total)
            }
            Err(e) => {
                let cause = e.to_string();
                session.commit(|state| state.stats_failed(&cause));
                tracing::warn!(session_id = %session.id(), error = %cause, "stats.failed");
                Err(e)
            }
        }
    }

    /// Embed, search, filter, truncate and index. Also reads the store size;
    /// failing to read it is logged and reported as `None`.
    async fn retrieve(
        &self,
        query: &str,
        config: &SearchConfig,
    ) -> AppResult<(Vec<Chunk>, Option<u64>)> {
        let embedding = self.embedder.embed(query).await?;

        let mut ranked: Vec<Chunk> = match config.search_type {
            SearchType::Semantic => self
                .backend
                .semantic(&embedding, config.max_results, config.similarity_threshold)
                .await?
                .into_iter()
                .map(Chunk::from)
                .collect(),
            SearchType::Hybrid => {
                let hits = self
                    .backend
                    .hybrid(
                        &embedding,
                        query,
                        config.max_results,
                        self.settings.clamped_text_weight(),
                    )
                    .await?;
                let received = hits.len();
                let kept = filter_hybrid(hits, config.similarity_threshold);
                tracing::debug!(
                    received,
                    kept = kept.len(),
                    threshold = config.similarity_threshold,
                    "search.hybrid_filtered"
                );
                kept
            }
        };
        ranked.truncate(config.max_results);

        let total_chunks = match self.store.total_chunk_count().await {
            Ok(total) => Some(total),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read knowledge store size");
                None
            }
        };

        Ok((assign_indices(ranked), total_chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn hit(id: &str, score: f32) -> HybridHit {
        HybridHit {
            chunk_id: id.to_string(),
            document_id: "d".to_string(),
            content: String::new(),
            combined_score: score,
            vector_similarity: score,
            text_similarity: 0.0,
            metadata: Metadata::new(),
            document_title: "Doc".to_string(),
            document_source: String::new(),
        }
    }

    #[test]
    fn test_filter_hybrid_is_inclusive() {
        let kept = filter_hybrid(
            vec![hit("a", 0.9), hit("b", 0.5), hit("c", 0.49)],
            0.5,
        );
        let ids: Vec<&str> = kept.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_outcome_messages() {
        let failed = SearchOutcome {
            chunks: Vec::new(),
            error: Some("backend down".to_string()),
        };
        assert_eq!(failed.message(), "Search failed: backend down");
        assert!(!failed.is_success());

        let empty = SearchOutcome {
            chunks: Vec::new(),
            error: None,
        };
        assert_eq!(
            empty.message(),
            "No relevant sources found in the knowledge base."
        );
    }

    #[test]
    fn test_outcome_lists_first_five() {
        let chunks = assign_indices(
            (0..7)
                .map(|i| Chunk::from(hit(&format!("c{}", i), 0.9 - i as f32 * 0.05)))
                .collect(),
        );
        let message = SearchOutcome {
            chunks,
            error: None,
        }
        .message();

        let lines: Vec<&str> = message.lines().collect();
        assert!(lines[0].starts_with("Found 7 sources."));
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "- Chunk 1 of Doc (90% match)");
        assert_eq!(lines[5], "- Chunk 5 of Doc (70% match)");
    }
}

//! Knowledge store for sift.
//!
//! Provides local-first retrieval using SQLite and embeddings: the search
//! backend and store contracts consumed by the retrieval workflow, their
//! SQLite implementation, embedding providers and a JSONL chunk loader.

pub mod backend;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use backend::{KnowledgeStore, SearchBackend};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::SqliteIndex;
pub use types::{
    ChunkRecord, DocumentRecord, HybridHit, LoadOptions, LoadStats, Metadata, SearchHit,
    StoreStats, StoredChunk,
};

use sift_core::{AppError, AppResult, EmbeddingSettings};
use std::path::Path;
use std::time::Instant;

/// Open the workspace index, creating it if needed.
pub fn open_index(workspace: &Path) -> AppResult<SqliteIndex> {
    SqliteIndex::open(&config::get_index_path(workspace))
}

/// Load pre-chunked JSONL sources into the workspace knowledge store.
pub async fn load(
    workspace: &Path,
    options: LoadOptions,
    settings: &EmbeddingSettings,
) -> AppResult<LoadStats> {
    let start = Instant::now();

    tracing::info!("Starting load of {} path(s)", options.paths.len());

    let index = open_index(workspace)?;

    if options.reset {
        tracing::info!("Resetting knowledge store");
        index.reset()?;
    }

    let provider = create_provider(settings)?;

    let mut stats =
        loader::load_paths(&index, provider.as_ref(), &options.paths, settings.batch_size)
            .await?;
    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Load completed: {} files, {} documents, {} chunks ({} skipped) in {:.2}s",
        stats.files_count,
        stats.documents_count,
        stats.chunks_count,
        stats.skipped_count,
        stats.duration_secs
    );

    Ok(stats)
}

/// Get statistics for the workspace knowledge store.
pub fn stats(workspace: &Path) -> AppResult<StoreStats> {
    let index_path = config::get_index_path(workspace);
    if !index_path.exists() {
        return Err(AppError::Knowledge(
            "Knowledge store does not exist. Run 'sift knowledge load' first.".to_string(),
        ));
    }

    let index = SqliteIndex::open(&index_path)?;
    let (documents_count, chunks_count) = index.stats()?;
    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(StoreStats {
        documents_count,
        chunks_count,
        db_size_bytes,
    })
}

/// Clean (reset) the workspace knowledge store.
pub fn clean(workspace: &Path) -> AppResult<()> {
    let index_path = config::get_index_path(workspace);
    if !index_path.exists() {
        return Err(AppError::Knowledge(
            "Knowledge store does not exist".to_string(),
        ));
    }

    SqliteIndex::open(&index_path)?.reset()?;

    tracing::info!("Knowledge store cleaned");
    Ok(())
}

//! Embedding generation for the knowledge store.
//!
//! Provider-agnostic embedding behind the `EmbeddingProvider` trait.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use sift_core::{AppError, AppResult};

/// Embed `texts` in consecutive batches of at most `batch_size`.
///
/// The output is index-aligned with the input.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> AppResult<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let batch_embeddings = provider.embed_batch(batch).await?;
        if batch_embeddings.len() != batch.len() {
            return Err(AppError::Provider(format!(
                "Provider '{}' returned {} embeddings for {} texts",
                provider.provider_name(),
                batch_embeddings.len(),
                batch.len()
            )));
        }
        embeddings.extend(batch_embeddings);
    }

    tracing::debug!(
        "Generated {} embeddings of dimension {} using provider '{}'",
        embeddings.len(),
        provider.dimensions(),
        provider.provider_name()
    );

    Ok(embeddings)
}

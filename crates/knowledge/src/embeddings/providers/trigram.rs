//! Offline embedding provider built from hashed words and character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use async_trait::async_trait;
use sift_core::AppResult;
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

const STOP_WORDS: [&str; 32] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Deterministic provider for local use and tests.
///
/// Each significant word adds weight to the dimension its hash selects, and
/// each of its character trigrams adds a smaller, square-root scaled weight.
/// Texts sharing vocabulary land close together; unrelated texts are close to
/// orthogonal. The output is unit length, or all zeros for blank text.
#[derive(Debug, Clone)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let mut frequencies: HashMap<String, u32> = HashMap::new();
        for word in text.unicode_words() {
            let word = word.to_lowercase();
            if word.chars().count() > 2 && !STOP_WORDS.contains(&word.as_str()) {
                *frequencies.entry(word).or_insert(0) += 1;
            }
        }

        for (word, freq) in &frequencies {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let slot = self.slot(window.iter().collect::<String>().as_bytes(), 37);
                embedding[slot] += (*freq as f32).sqrt();
            }

            let slot = self.slot(word.as_bytes(), 31);
            embedding[slot] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }

    fn slot(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes.iter().fold(0u64, |acc, b| {
            acc.wrapping_mul(multiplier).wrapping_add(u64::from(*b))
        });
        (hash % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine_similarity;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_trigram_provider_identity() {
        let provider = TrigramProvider::new(384);
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[tokio::test]
    async fn test_embed_is_unit_length() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("OpenAI closed a new funding round").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let provider = TrigramProvider::new(128);
        let texts = vec!["first text".to_string(), "second text".to_string()];

        let batch = provider.embed_batch(&texts).await.unwrap();
        let second = provider.embed("second text").await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], second);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(384);
        let a = provider.embed("deterministic test").await.unwrap();
        let b = provider.embed("deterministic test").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_is_closer() {
        let provider = TrigramProvider::new(384);
        let query = provider.embed("OpenAI funding").await.unwrap();
        let related = provider.embed("OpenAI announced new funding").await.unwrap();
        let unrelated = provider.embed("pasta cooking recipes").await.unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_blank_text_is_zero_vector() {
        let provider = TrigramProvider::new(64);
        let embedding = provider.embed("   ").await.unwrap();
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_utf8_text() {
        let provider = TrigramProvider::new(384);
        let embedding = provider
            .embed("Gamedex é um aplicativo brasileiro para gerenciar jogos!")
            .await
            .unwrap();
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }
}

//! Per-document chunk addressing.

use crate::types::Chunk;
use std::collections::HashMap;

/// Number chunks 1..k within each document, in the given rank order.
///
/// Numbering is local to this result set: the first chunk of a document
/// seen in `chunks` is always 1, whatever its position in the stored
/// document.
pub fn assign_indices(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut counters: HashMap<&str, u32> = HashMap::new();
    let mut indices = Vec::with_capacity(chunks.len());

    for chunk in &chunks {
        let counter = counters.entry(chunk.document_id.as_str()).or_insert(0);
        *counter += 1;
        indices.push(*counter);
    }

    for (chunk, index) in chunks.iter_mut().zip(indices) {
        chunk.chunk_index = index;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn chunk(id: &str, document_id: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            document_id: document_id.to_string(),
            content: String::new(),
            similarity: 0.0,
            metadata: Metadata::new(),
            document_title: document_id.to_uppercase(),
            document_source: String::new(),
            chunk_index: 0,
            approved: false,
        }
    }

    #[test]
    fn test_interleaved_documents() {
        let chunks = assign_indices(vec![
            chunk("a1", "a"),
            chunk("b1", "b"),
            chunk("a2", "a"),
            chunk("a3", "a"),
            chunk("b2", "b"),
        ]);

        let indices: Vec<(&str, u32)> = chunks
            .iter()
            .map(|c| (c.chunk_id.as_str(), c.chunk_index))
            .collect();
        assert_eq!(
            indices,
            vec![("a1", 1), ("b1", 1), ("a2", 2), ("a3", 3), ("b2", 2)]
        );
    }

    #[test]
    fn test_indices_are_gapless_per_document() {
        let docs = ["x", "y", "z", "x", "x", "z", "y", "x"];
        let chunks = assign_indices(
            docs.iter()
                .enumerate()
                .map(|(i, d)| chunk(&i.to_string(), d))
                .collect(),
        );

        for doc in ["x", "y", "z"] {
            let seen: Vec<u32> = chunks
                .iter()
                .filter(|c| c.document_id == doc)
                .map(|c| c.chunk_index)
                .collect();
            let expected: Vec<u32> = (1..=seen.len() as u32).collect();
            assert_eq!(seen, expected, "document {}", doc);
        }
    }

    #[test]
    fn test_stateless_across_calls() {
        let first = assign_indices(vec![chunk("a1", "a"), chunk("a2", "a")]);
        let second = assign_indices(vec![chunk("a9", "a")]);
        assert_eq!(first[1].chunk_index, 2);
        assert_eq!(second[0].chunk_index, 1);
    }

    #[test]
    fn test_empty() {
        assert!(assign_indices(Vec::new()).is_empty());
    }
}

//! Approval tracking and synthesis readiness.

use crate::types::Chunk;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// The authoritative set of approved chunk ids.
///
/// Ids may refer to chunks that are no longer in the result set; such stale
/// ids are kept but never count towards readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalGate {
    approved: BTreeSet<String>,
}

impl ApprovalGate {
    pub fn ids(&self) -> &BTreeSet<String> {
        &self.approved
    }

    pub fn len(&self) -> usize {
        self.approved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.approved.is_empty()
    }

    pub fn is_approved(&self, chunk_id: &str) -> bool {
        self.approved.contains(chunk_id)
    }

    /// True iff at least one approved id is present in `chunks`.
    pub fn synthesis_ready(&self, chunks: &[Chunk]) -> bool {
        chunks.iter().any(|c| self.approved.contains(&c.chunk_id))
    }

    /// Approved chunks in their order within `chunks`.
    pub fn approved_subset(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        chunks
            .iter()
            .filter(|c| self.approved.contains(&c.chunk_id))
            .cloned()
            .collect()
    }

    /// Approved ids with no matching chunk in `chunks`.
    pub fn stale_ids(&self, chunks: &[Chunk]) -> Vec<String> {
        let present: HashSet<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        self.approved
            .iter()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect()
    }

    pub(crate) fn replace<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.approved = ids.into_iter().collect();
    }

    pub(crate) fn clear(&mut self) {
        self.approved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn chunks(ids: &[&str]) -> Vec<Chunk> {
        ids.iter()
            .map(|id| Chunk {
                chunk_id: id.to_string(),
                document_id: "d".to_string(),
                content: format!("content {}", id),
                similarity: 0.9,
                metadata: Metadata::new(),
                document_title: "Doc".to_string(),
                document_source: "doc.md".to_string(),
                chunk_index: 1,
                approved: false,
            })
            .collect()
    }

    fn gate(ids: &[&str]) -> ApprovalGate {
        let mut gate = ApprovalGate::default();
        gate.replace(ids.iter().map(|s| s.to_string()));
        gate
    }

    #[test]
    fn test_empty_gate_is_not_ready() {
        assert!(!ApprovalGate::default().synthesis_ready(&chunks(&["a", "b"])));
    }

    #[test]
    fn test_stale_ids_are_ignored() {
        let gate = gate(&["old1", "old2"]);
        let current = chunks(&["a", "b"]);

        assert!(!gate.synthesis_ready(&current));
        assert!(gate.approved_subset(&current).is_empty());
        assert_eq!(gate.stale_ids(&current), vec!["old1", "old2"]);
    }

    #[test]
    fn test_subset_keeps_rank_order() {
        // BTreeSet iteration would yield a, c; rank order is c, a
        let gate = gate(&["a", "c", "stale"]);
        let current = chunks(&["c", "b", "a"]);

        assert!(gate.synthesis_ready(&current));
        let subset: Vec<String> = gate
            .approved_subset(&current)
            .into_iter()
            .map(|c| c.chunk_id)
            .collect();
        assert_eq!(subset, vec!["c", "a"]);
    }

    #[test]
    fn test_serializes_as_id_list() {
        let gate = gate(&["b", "a"]);
        assert_eq!(serde_json::to_string(&gate).unwrap(), r#"["a","b"]"#);
    }
}

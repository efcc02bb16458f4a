//! Human-readable session report.

use crate::state::SharedState;
use crate::types::WorkflowState;
use std::fmt::Write;

/// Describe the session for a reader who cannot see the snapshot stream.
pub fn describe(state: &SharedState) -> String {
    let mut out = String::from("## Current Application State\n\n");

    let status = match state.workflow_state() {
        WorkflowState::Searching => "Currently searching...",
        WorkflowState::Synthesizing => "Currently synthesizing answer...",
        WorkflowState::AwaitingApproval => "Awaiting approval",
        WorkflowState::Error => "Error",
        WorkflowState::Idle => "Idle",
    };
    let _ = writeln!(out, "**Status:** {}", status);

    if let Some(query) = state.current_query() {
        let _ = writeln!(out, "**Last Query:** \"{}\"", query.query);
    }

    let config = state.search_config();
    let _ = writeln!(out, "\n**Search Settings:**");
    let _ = writeln!(
        out,
        "- Similarity threshold: {:.0}%",
        config.similarity_threshold * 100.0
    );
    let _ = writeln!(out, "- Max results: {}", config.max_results);
    let _ = writeln!(out, "- Search type: {}", config.search_type);

    let chunks = state.retrieved_chunks();
    let _ = writeln!(out, "\n**Retrieved Chunks:** {} total", chunks.len());
    for chunk in chunks {
        let selected = if state.approvals().is_approved(&chunk.chunk_id) {
            "SELECTED"
        } else {
            "not selected"
        };
        let _ = writeln!(
            out,
            "- [{}] {} ({} match) - {}",
            chunk.chunk_id,
            chunk.label(),
            chunk.match_percent(),
            selected
        );
    }

    let selected = state.approved_chunks();
    let _ = writeln!(
        out,
        "\n**User Selections:** {} chunk(s) selected",
        selected.len()
    );
    for chunk in &selected {
        let _ = writeln!(out, "- {}", chunk.label());
    }

    let _ = writeln!(
        out,
        "\n**Knowledge Base:** {} chunks, status {}",
        state.total_chunks_in_kb(),
        state.knowledge_base_status()
    );

    if let Some(error) = state.error_message() {
        let _ = writeln!(out, "\n**Error:** {}", error);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Metadata, SearchConfig, SearchQuery};

    #[test]
    fn test_describe_idle() {
        let report = describe(&SharedState::default());
        assert!(report.contains("**Status:** Idle"));
        assert!(report.contains("- Similarity threshold: 50%"));
        assert!(report.contains("**Retrieved Chunks:** 0 total"));
        assert!(!report.contains("**Error:**"));
    }

    #[test]
    fn test_describe_selection() {
        let mut state = SharedState::default();
        let query = SearchQuery::new("OpenAI funding", &SearchConfig::default());
        state.begin_search(&query);
        state.complete_search(
            query,
            vec![Chunk {
                chunk_id: "c1".to_string(),
                document_id: "d".to_string(),
                content: String::new(),
                similarity: 0.87,
                metadata: Metadata::new(),
                document_title: "News".to_string(),
                document_source: String::new(),
                chunk_index: 1,
                approved: false,
            }],
            Some(12),
        );
        state.set_approved_chunk_ids(vec!["c1".to_string(), "gone".to_string()]);

        let report = describe(&state);
        assert!(report.contains("**Last Query:** \"OpenAI funding\""));
        assert!(report.contains("- [c1] Chunk 1 of News (87% match) - SELECTED"));
        // Stale ids are not counted
        assert!(report.contains("**User Selections:** 1 chunk(s) selected"));
        assert!(report.contains("12 chunks, status ready"));
    }

    #[test]
    fn test_describe_error() {
        let mut state = SharedState::default();
        state.fail_search("embedding quota exceeded");
        let report = describe(&state);
        assert!(report.contains("**Status:** Error"));
        assert!(report.contains("**Error:** embedding quota exceeded"));
    }
}

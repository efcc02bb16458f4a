//! Approval and synthesis scenarios.

use super::fakes::{semantic_hit, Harness};
use crate::session::Session;
use crate::synthesis::NOT_READY_MESSAGE;
use crate::types::WorkflowState;
use std::sync::Arc;

async fn searched(h: &Harness) -> Arc<Session> {
    h.backend.script_semantic(vec![
        semantic_hit("a-1", "a", 0.95),
        semantic_hit("b-1", "b", 0.90),
        semantic_hit("a-2", "a", 0.85),
    ]);
    let session = h.registry.get_or_create("s1");
    h.coordinator.execute_search(&session, "query").await.unwrap();
    session
}

#[tokio::test]
async fn test_not_ready_without_approvals() {
    let h = Harness::new();
    let session = searched(&h).await;
    let before = session.state();

    let bundle = h.assembler.synthesize(&session).await;

    assert!(!bundle.ready);
    assert_eq!(bundle.content, NOT_READY_MESSAGE);
    assert!(bundle.sources.is_empty());

    let after = session.state();
    assert_eq!(after, before);
    assert!(!after.is_synthesizing());
    assert!(after.awaiting_approval());
    // Only the search snapshot
    assert_eq!(h.sink.events().len(), 1);
}

#[tokio::test]
async fn test_stale_approvals_are_not_ready() {
    let h = Harness::new();
    let session = searched(&h).await;
    session.set_approved_chunk_ids(vec!["from-old-search".to_string()]);

    let bundle = h.assembler.synthesize(&session).await;

    assert!(!bundle.ready);
    assert!(session.state().awaiting_approval());
    assert_eq!(session.version(), 1);
}

#[tokio::test]
async fn test_synthesis_renders_approved_in_rank_order() {
    let h = Harness::new();
    let session = searched(&h).await;
    session.set_approved_chunk_ids(vec![
        "a-2".to_string(),
        "stale".to_string(),
        "a-1".to_string(),
    ]);

    let bundle = h.assembler.synthesize(&session).await;

    assert!(bundle.ready);
    assert_eq!(
        bundle.content,
        "[Source: Chunk 1 of Title a]\ncontent of a-1\n\n---\n\n[Source: Chunk 2 of Title a]\ncontent of a-2"
    );
    assert_eq!(bundle.sources, vec!["Chunk 1 of Title a", "Chunk 2 of Title a"]);

    let state = session.state();
    assert!(!state.is_synthesizing());
    assert!(!state.awaiting_approval());
    assert!(state.error_message().is_none());
    // The full list stays visible
    assert_eq!(state.retrieved_chunks().len(), 3);
    assert_eq!(state.workflow_state(), WorkflowState::Idle);

    let events = h.sink.events();
    assert_eq!(events.len(), 2);
    let snapshot = events[1].snapshot();
    assert_eq!(snapshot.version, 2);
    let flags: Vec<(&str, bool)> = snapshot
        .state
        .retrieved_chunks()
        .iter()
        .map(|c| (c.chunk_id.as_str(), c.approved))
        .collect();
    assert_eq!(flags, vec![("a-1", true), ("b-1", false), ("a-2", true)]);
}

#[tokio::test]
async fn test_search_after_synthesis_starts_a_new_cycle() {
    let h = Harness::new();
    let session = searched(&h).await;
    session.set_approved_chunk_ids(vec!["b-1".to_string()]);
    assert!(h.assembler.synthesize(&session).await.ready);

    h.coordinator.execute_search(&session, "follow up").await.unwrap();

    let state = session.state();
    assert!(state.approvals().is_empty());
    assert!(state.awaiting_approval());
    assert!(!h.assembler.synthesize(&session).await.ready);
}

#[tokio::test]
async fn test_synthesis_clears_previous_error_only_when_ready() {
    let h = Harness::new();
    let session = searched(&h).await;
    session.set_approved_chunk_ids(vec!["a-1".to_string()]);

    h.embedder.fail_with("offline");
    h.coordinator.execute_search(&session, "broken").await.unwrap();
    // The failed search dropped the chunks and the approvals with them
    assert!(!h.assembler.synthesize(&session).await.ready);
    assert_eq!(session.state().workflow_state(), WorkflowState::Error);
}

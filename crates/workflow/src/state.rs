//! Per-session shared state.
//!
//! Fields fall into two groups. The owner group (chunks, query history,
//! store stats, progress flags, error) is only changed through the
//! crate-private transitions below, which the coordinator and assembler
//! drive. The observer group (approvals, search config) has its own public
//! entry points with range clamping.

use crate::gate::ApprovalGate;
use crate::types::{Chunk, SearchConfig, SearchQuery, WorkflowState};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of queries kept in the search history.
pub const HISTORY_LIMIT: usize = 10;

/// Store status before any search or stats refresh.
pub const STATUS_READY: &str = "ready";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    retrieved_chunks: Vec<Chunk>,
    current_query: Option<SearchQuery>,
    search_history: VecDeque<SearchQuery>,
    total_chunks_in_kb: u64,
    knowledge_base_status: String,
    approved_chunk_ids: ApprovalGate,
    awaiting_approval: bool,
    search_config: SearchConfig,
    is_searching: bool,
    is_synthesizing: bool,
    error_message: Option<String>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl SharedState {
    pub fn new(search_config: SearchConfig) -> Self {
        Self {
            retrieved_chunks: Vec::new(),
            current_query: None,
            search_history: VecDeque::with_capacity(HISTORY_LIMIT),
            total_chunks_in_kb: 0,
            knowledge_base_status: STATUS_READY.to_string(),
            approved_chunk_ids: ApprovalGate::default(),
            awaiting_approval: false,
            search_config,
            is_searching: false,
            is_synthesizing: false,
            error_message: None,
        }
    }

    pub fn retrieved_chunks(&self) -> &[Chunk] {
        &self.retrieved_chunks
    }

    pub fn current_query(&self) -> Option<&SearchQuery> {
        self.current_query.as_ref()
    }

    /// Recent queries, oldest first.
    pub fn search_history(&self) -> impl ExactSizeIterator<Item = &SearchQuery> {
        self.search_history.iter()
    }

    pub fn total_chunks_in_kb(&self) -> u64 {
        self.total_chunks_in_kb
    }

    pub fn knowledge_base_status(&self) -> &str {
        &self.knowledge_base_status
    }

    pub fn approvals(&self) -> &ApprovalGate {
        &self.approved_chunk_ids
    }

    pub fn awaiting_approval(&self) -> bool {
        self.awaiting_approval
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search_config
    }

    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    pub fn is_synthesizing(&self) -> bool {
        self.is_synthesizing
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn synthesis_ready(&self) -> bool {
        self.approved_chunk_ids.synthesis_ready(&self.retrieved_chunks)
    }

    /// Approved chunks in rank order.
    pub fn approved_chunks(&self) -> Vec<Chunk> {
        self.approved_chunk_ids.approved_subset(&self.retrieved_chunks)
    }

    /// Workflow position implied by the flags.
    pub fn workflow_state(&self) -> WorkflowState {
        if self.is_searching {
            WorkflowState::Searching
        } else if self.is_synthesizing {
            WorkflowState::Synthesizing
        } else if self.error_message.is_some() {
            WorkflowState::Error
        } else if self.awaiting_approval {
            WorkflowState::AwaitingApproval
        } else {
            WorkflowState::Idle
        }
    }

    // Observer entry points

    /// Replace the approval set. Unknown ids are kept and ignored.
    pub fn set_approved_chunk_ids<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.approved_chunk_ids.replace(ids);
        self.sync_approval_flags();
    }

    /// Apply a search config after clamping it to `ceiling` results.
    ///
    /// Returns the config actually stored.
    pub fn set_search_config(&mut self, config: SearchConfig, ceiling: usize) -> &SearchConfig {
        let (clamped, changed) = config.clone().clamped(ceiling);
        if changed {
            tracing::warn!(
                requested_threshold = config.similarity_threshold,
                requested_max_results = config.max_results,
                threshold = clamped.similarity_threshold,
                max_results = clamped.max_results,
                "config.clamped"
            );
        }
        self.search_config = clamped;
        &self.search_config
    }

    // Owner transitions

    pub(crate) fn begin_search(&mut self, query: &SearchQuery) {
        self.is_searching = true;
        self.error_message = None;
        self.current_query = Some(query.clone());
    }

    /// Install a new result set. `total_chunks` is `None` when the store
    /// count could not be read; the previous count and status are kept.
    pub(crate) fn complete_search(
        &mut self,
        query: SearchQuery,
        chunks: Vec<Chunk>,
        total_chunks: Option<u64>,
    ) {
        self.awaiting_approval = !chunks.is_empty();
        self.retrieved_chunks = chunks;
        self.approved_chunk_ids.clear();
        self.sync_approval_flags();

        self.search_history.push_back(query);
        while self.search_history.len() > HISTORY_LIMIT {
            self.search_history.pop_front();
        }

        if let Some(total) = total_chunks {
            self.total_chunks_in_kb = total;
            self.knowledge_base_status = STATUS_READY.to_string();
        }

        self.is_searching = false;
    }

    pub(crate) fn fail_search(&mut self, cause: &str) {
        self.retrieved_chunks.clear();
        self.approved_chunk_ids.clear();
        self.awaiting_approval = false;
        self.error_message = Some(cause.to_string());
        self.knowledge_base_status = format!("error: {}", cause);
        self.is_searching = false;
    }

    pub(crate) fn begin_synthesis(&mut self) {
        self.is_synthesizing = true;
        self.awaiting_approval = false;
        self.error_message = None;
    }

    pub(crate) fn complete_synthesis(&mut self) {
        self.is_synthesizing = false;
    }

    pub(crate) fn stats_refreshed(&mut self, total_chunks: u64) {
        self.total_chunks_in_kb = total_chunks;
        self.knowledge_base_status = STATUS_READY.to_string();
    }

    pub(crate) fn stats_failed(&mut self, cause: &str) {
        self.knowledge_base_status = format!("error: {}", cause);
    }

    fn sync_approval_flags(&mut self) {
        let gate = &self.approved_chunk_ids;
        for chunk in &mut self.retrieved_chunks {
            chunk.approved = gate.is_approved(&chunk.chunk_id);
        }
    }
}

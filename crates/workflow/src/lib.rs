//! Human-in-the-loop retrieval workflow.
//!
//! A search fills a session with ranked chunks, an observer approves some of
//! them, and synthesis packages the approved ones as context. Every mutating
//! step publishes a full state snapshot.

pub mod coordinator;
pub mod gate;
pub mod indexer;
pub mod session;
pub mod state;
pub mod summary;
pub mod sync;
pub mod synthesis;
pub mod types;

#[cfg(test)]
mod tests;

pub use coordinator::{filter_hybrid, RetrievalCoordinator, SearchOutcome};
pub use gate::ApprovalGate;
pub use indexer::assign_indices;
pub use session::{Session, SessionRegistry};
pub use state::{SharedState, HISTORY_LIMIT};
pub use summary::describe;
pub use sync::{BroadcastSink, JsonLinesSink, NullSink, SnapshotSink, StateSnapshot, SyncEvent};
pub use synthesis::{SynthesisAssembler, SynthesisBundle};
pub use types::{Chunk, Metadata, SearchConfig, SearchQuery, SearchType, WorkflowState};

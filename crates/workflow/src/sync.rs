//! Full-state snapshot events and their sinks.
//!
//! Every mutating workflow operation ends by handing one [`SyncEvent`] to the
//! session's [`SnapshotSink`]. Framing and delivery belong to the sink.

use crate::state::SharedState;
use crate::types::WorkflowState;
use serde::{Deserialize, Serialize};
use sift_core::{AppError, AppResult};
use std::io::Write;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Complete session state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub session_id: String,

    /// Increases by one with every snapshot of the session
    pub version: u64,

    pub workflow_state: WorkflowState,

    #[serde(flatten)]
    pub state: SharedState,
}

impl StateSnapshot {
    pub fn capture(session_id: &str, version: u64, state: &SharedState) -> Self {
        Self {
            session_id: session_id.to_string(),
            version,
            workflow_state: state.workflow_state(),
            state: state.clone(),
        }
    }
}

/// Outbound state-sync event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot { snapshot: StateSnapshot },
}

impl SyncEvent {
    pub fn snapshot(&self) -> &StateSnapshot {
        match self {
            Self::StateSnapshot { snapshot } => snapshot,
        }
    }
}

impl From<StateSnapshot> for SyncEvent {
    fn from(snapshot: StateSnapshot) -> Self {
        Self::StateSnapshot { snapshot }
    }
}

/// Destination for sync events.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, event: &SyncEvent) -> AppResult<()>;
}

/// Publish an event, logging instead of failing.
pub(crate) fn publish_or_warn(sink: &dyn SnapshotSink, event: &SyncEvent) {
    let snapshot = event.snapshot();
    if let Err(e) = sink.publish(event) {
        tracing::warn!(
            session_id = %snapshot.session_id,
            version = snapshot.version,
            error = %e,
            "snapshot.publish_failed"
        );
    }
}

/// Fan-out to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SyncEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl SnapshotSink for BroadcastSink {
    fn publish(&self, event: &SyncEvent) -> AppResult<()> {
        // No subscribers is not a failure
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!("No snapshot subscribers");
        }
        Ok(())
    }
}

/// Writes one JSON event per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> SnapshotSink for JsonLinesSink<W> {
    fn publish(&self, event: &SyncEvent) -> AppResult<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush().map_err(AppError::from)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn publish(&self, _event: &SyncEvent) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(version: u64) -> SyncEvent {
        StateSnapshot::capture("s1", version, &SharedState::default()).into()
    }

    #[test]
    fn test_event_envelope_is_flat() {
        let value = serde_json::to_value(event(3)).unwrap();

        assert_eq!(value["type"], "STATE_SNAPSHOT");
        let snapshot = &value["snapshot"];
        assert_eq!(snapshot["session_id"], "s1");
        assert_eq!(snapshot["version"], 3);
        assert_eq!(snapshot["workflow_state"], "idle");
        assert_eq!(snapshot["knowledge_base_status"], "ready");
        assert!(snapshot["retrieved_chunks"].is_array());
        assert!(snapshot.get("state").is_none());
    }

    #[test]
    fn test_json_lines_sink_writes_one_line_per_event() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.publish(&event(1)).unwrap();
        sink.publish(&event(2)).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["snapshot"]["version"], 2);
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        // Publishing with no subscriber is fine
        sink.publish(&event(1)).unwrap();

        let mut rx = sink.subscribe();
        sink.publish(&event(2)).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.snapshot().version, 2);
    }

    struct FailingSink;

    impl SnapshotSink for FailingSink {
        fn publish(&self, _event: &SyncEvent) -> AppResult<()> {
            Err(AppError::Other("transport closed".to_string()))
        }
    }

    #[test]
    fn test_publish_failure_is_swallowed() {
        publish_or_warn(&FailingSink, &event(1));
        publish_or_warn(&NullSink, &event(2));
    }
}

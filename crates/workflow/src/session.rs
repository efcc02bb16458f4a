//! Sessions and the session table.
//!
//! Each session owns one [`SharedState`]. Mutating workflow operations on a
//! session are serialized by its operation lock, while the state itself sits
//! behind a short-lived `RwLock` so readers only ever see whole updates.

use crate::state::SharedState;
use crate::sync::{publish_or_warn, SnapshotSink, StateSnapshot, SyncEvent};
use crate::types::SearchConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, MutexGuard};

struct Versioned {
    state: SharedState,
    version: u64,
}

/// One conversation's workflow state.
pub struct Session {
    id: String,
    inner: RwLock<Versioned>,
    operation: Mutex<()>,
    max_match_count: usize,
    sink: Arc<dyn SnapshotSink>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("version", &self.version())
            .field("max_match_count", &self.max_match_count)
            .finish()
    }
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        search_config: SearchConfig,
        max_match_count: usize,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        let max_match_count = max_match_count.max(1);
        let (search_config, _) = search_config.clamped(max_match_count);

        Self {
            id: id.into(),
            inner: RwLock::new(Versioned {
                state: SharedState::new(search_config),
                version: 0,
            }),
            operation: Mutex::new(()),
            max_match_count,
            sink,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version of the last emitted snapshot; 0 before the first.
    pub fn version(&self) -> u64 {
        self.read_inner().version
    }

    /// Copy of the current state.
    pub fn state(&self) -> SharedState {
        self.read(SharedState::clone)
    }

    /// Current state as a snapshot, without emitting it.
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.read_inner();
        StateSnapshot::capture(&self.id, inner.version, &inner.state)
    }

    /// Observer write: replace the approval set.
    pub fn set_approved_chunk_ids<I>(&self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let ids: Vec<String> = ids.into_iter().collect();
        tracing::debug!(session_id = %self.id, count = ids.len(), "approvals.updated");
        self.update(|state| state.set_approved_chunk_ids(ids));
    }

    /// Observer write: replace the search config, clamped to range.
    ///
    /// Returns the config actually stored.
    pub fn set_search_config(&self, config: SearchConfig) -> SearchConfig {
        let ceiling = self.max_match_count;
        self.update(|state| state.set_search_config(config, ceiling).clone())
    }

    /// Hold exclusive rights to run a mutating operation.
    pub(crate) async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.operation.lock().await
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&SharedState) -> R) -> R {
        f(&self.read_inner().state)
    }

    /// Mutate without emitting a snapshot.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> R {
        f(&mut self.write_inner().state)
    }

    /// Mutate, then emit the resulting state as the next snapshot version.
    ///
    /// The snapshot is captured under the same write lock as the mutation
    /// and published after the lock is released.
    pub(crate) fn commit<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> R {
        let (result, snapshot) = {
            let mut inner = self.write_inner();
            let result = f(&mut inner.state);
            inner.version += 1;
            let snapshot = StateSnapshot::capture(&self.id, inner.version, &inner.state);
            (result, snapshot)
        };

        tracing::debug!(
            session_id = %self.id,
            version = snapshot.version,
            workflow_state = %snapshot.workflow_state,
            "snapshot.emitted"
        );
        publish_or_warn(self.sink.as_ref(), &SyncEvent::from(snapshot));
        result
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, Versioned> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, Versioned> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Session-keyed table of independent workflow states.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    default_config: SearchConfig,
    max_match_count: usize,
    sink: Arc<dyn SnapshotSink>,
}

impl SessionRegistry {
    pub fn new(
        default_config: SearchConfig,
        max_match_count: usize,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_config,
            max_match_count,
            sink,
        }
    }

    /// Return the session for `id`, creating it on first use.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = self.get(id) {
            return session;
        }

        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::info!(session_id = %id, "session.created");
            Arc::new(Session::new(
                id,
                self.default_config.clone(),
                self.max_match_count,
                Arc::clone(&self.sink),
            ))
        }))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
        if removed.is_some() {
            tracing::info!(session_id = %id, "session.removed");
        }
        removed
    }

    /// Ids of all live sessions, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! The reconciliation engine: one diff pass per committed batch.
//!
//! Everything store-shaped funnels through the engine's single diff
//! pass: local transactions, inbound feed merges, and undo/redo replays
//! all mutate the record store and then let the pass classify what
//! changed.
//! The only special case is the echo-suppression flag, armed by
//! remote-origin and history-origin mutations so their pass records and
//! dispatches nothing. Arming and consuming happen under one lock, which
//! is what makes "at most one pass consumes a given arming" hold.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::diff;
use crate::dispatch::WriteDispatcher;
use crate::history::{Delta, DeltaHistory};
use crate::remote::RemoteTasks;
use crate::reveal::RevealGate;
use crate::store::RecordStore;
use crate::task::{Status, Task, TaskId};

/// What a call to [`SyncEngine::undo`] or [`SyncEngine::redo`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The delta was applied; the named record changed.
    Applied(TaskId),
    /// The target was out of view. The reveal gate brought it into view
    /// instead and no state changed; call again to apply.
    RevealedFirst(TaskId),
    /// Nothing left to undo (or redo). Not an error.
    Nothing,
}

struct EngineState {
    store: RecordStore,
    history: DeltaHistory,
    /// One-shot echo suppressor. Armed by remote merges and history
    /// replays, consumed by exactly the diff pass their mutation fires.
    suppress_next: bool,
}

struct EngineInner {
    state: Mutex<EngineState>,
    dispatcher: WriteDispatcher,
    reveal: Arc<dyn RevealGate>,
    revision: watch::Sender<u64>,
    channel: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Ok(mut channel) = self.channel.lock() {
            if let Some(handle) = channel.take() {
                handle.abort();
            }
        }
    }
}

/// The engine handle. Cheap to clone; every collaborator gets one by
/// injection, there is no ambient singleton.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct WeakSyncEngine(Weak<EngineInner>);

impl WeakSyncEngine {
    pub fn upgrade(&self) -> Option<SyncEngine> {
        self.0.upgrade().map(|inner| SyncEngine { inner })
    }
}

/// A mutable view of the record store scoped to one commit.
///
/// Every mutation made through the view lands in the same diff pass when
/// the closure returns, so a burst of edits reads as one logical batch
/// with `before` the original state and `after` the final one.
pub struct Transaction<'a> {
    store: &'a mut RecordStore,
}

impl Transaction<'_> {
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.store.get(id)
    }

    /// Sets the entry for the record's id, creating or replacing it.
    pub fn upsert(&mut self, task: Task) {
        self.store.insert(task);
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        self.store.remove(id)
    }

    /// Retitles a record in place. Returns false for an unknown id.
    pub fn set_title(&mut self, id: &TaskId, title: impl Into<String>) -> bool {
        match self.store.get_mut(id) {
            Some(task) => {
                task.title = title.into();
                true
            }
            None => false,
        }
    }

    /// Moves a record to another column. Returns false for an unknown id.
    pub fn set_status(&mut self, id: &TaskId, status: Status) -> bool {
        match self.store.get_mut(id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }
}

impl SyncEngine {
    pub(crate) fn new(remote: Arc<dyn RemoteTasks>, reveal: Arc<dyn RevealGate>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    store: RecordStore::new(),
                    history: DeltaHistory::new(),
                    suppress_next: false,
                }),
                dispatcher: WriteDispatcher::new(remote),
                reveal,
                revision,
                channel: std::sync::Mutex::new(None),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakSyncEngine {
        WeakSyncEngine(Arc::downgrade(&self.inner))
    }

    pub(crate) fn attach_channel(&self, handle: JoinHandle<()>) {
        if let Ok(mut channel) = self.inner.channel.lock() {
            *channel = Some(handle);
        }
    }

    /// Runs one mutation batch against the store and commits it as a
    /// single diff pass: classify, record deltas, dispatch writes, and
    /// hold the pass open until every write resolves. A transaction that
    /// starts while another pass is in flight waits its turn.
    pub async fn transaction<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Transaction<'_>) -> R,
    {
        let mut state = self.inner.state.lock().await;
        let previous = state.store.snapshot();
        let result = f(&mut Transaction {
            store: &mut state.store,
        });
        self.run_diff_pass(&mut state, previous).await;
        drop(state);
        self.bump_revision();
        result
    }

    /// Merges one authoritative batch from the subscribe feed.
    ///
    /// The merge is right-biased per id and idempotent; ids the batch
    /// does not mention are untouched. Suppression is armed first, so
    /// the diff pass this mutation fires is consumed silently instead of
    /// being reinterpreted as a local edit.
    pub async fn apply_remote(&self, batch: Vec<Task>) {
        if batch.is_empty() {
            return;
        }
        let mut state = self.inner.state.lock().await;
        let previous = state.store.snapshot();
        state.suppress_next = true;
        state.store.merge_batch(batch);
        self.run_diff_pass(&mut state, previous).await;
        drop(state);
        self.bump_revision();
    }

    /// Reverts the most recent delta, if any.
    ///
    /// Gated on the reveal gate first: when the target record is out of
    /// view this call only brings it into view and leaves the store and
    /// cursor untouched. The reverting write goes through the ordinary
    /// mutation pathway with suppression armed, so it is neither
    /// re-recorded nor redispatched.
    pub async fn undo(&self) -> UndoOutcome {
        let mut state = self.inner.state.lock().await;
        let anchor = match state.history.peek_undo() {
            None => return UndoOutcome::Nothing,
            Some(delta) => delta.after().map(|task| task.id.clone()),
        };
        if let Some(id) = &anchor {
            if !self.inner.reveal.reveal(id) {
                return UndoOutcome::RevealedFirst(id.clone());
            }
        }
        let Some(delta) = state.history.retreat() else {
            return UndoOutcome::Nothing;
        };

        let previous = state.store.snapshot();
        state.suppress_next = true;
        let id = delta.id().clone();
        let (before, _) = delta.into_parts();
        match before {
            // Reverting an update or deletion: write the old record back.
            Some(task) => {
                state.store.insert(task);
            }
            // Reverting a pure creation: take the record out again.
            None => {
                state.store.remove(&id);
            }
        }
        self.run_diff_pass(&mut state, previous).await;
        drop(state);
        self.bump_revision();
        UndoOutcome::Applied(id)
    }

    /// Reapplies the next delta, if any. Same gate and same suppressed
    /// mutation pathway as [`undo`](Self::undo), gated on the next
    /// delta's `before` side.
    pub async fn redo(&self) -> UndoOutcome {
        let mut state = self.inner.state.lock().await;
        let anchor = match state.history.peek_redo() {
            None => return UndoOutcome::Nothing,
            Some(delta) => delta.before().map(|task| task.id.clone()),
        };
        if let Some(id) = &anchor {
            if !self.inner.reveal.reveal(id) {
                return UndoOutcome::RevealedFirst(id.clone());
            }
        }
        let Some(delta) = state.history.advance() else {
            return UndoOutcome::Nothing;
        };

        let previous = state.store.snapshot();
        state.suppress_next = true;
        let id = delta.id().clone();
        let (_, after) = delta.into_parts();
        match after {
            Some(task) => {
                state.store.insert(task);
            }
            None => {
                state.store.remove(&id);
            }
        }
        self.run_diff_pass(&mut state, previous).await;
        drop(state);
        self.bump_revision();
        UndoOutcome::Applied(id)
    }

    /// Creates a task in the given column: random id, default title,
    /// timestamps left for the server.
    pub async fn create_task(&self, status: Status) -> Task {
        let task = Task::new(status);
        let created = task.clone();
        self.transaction(move |tx| tx.upsert(task)).await;
        created
    }

    /// Retitles a record. Returns false for an unknown id.
    pub async fn rename(&self, id: &TaskId, title: impl Into<String>) -> bool {
        let title = title.into();
        self.transaction(|tx| tx.set_title(id, title)).await
    }

    /// Moves a record to another column. Returns false for an unknown id.
    pub async fn move_to(&self, id: &TaskId, status: Status) -> bool {
        self.transaction(|tx| tx.set_status(id, status)).await
    }

    /// Removes a record from the local view, which classifies as a
    /// deletion and issues the remote delete call.
    pub async fn remove(&self, id: &TaskId) -> bool {
        self.transaction(|tx| tx.remove(id).is_some()).await
    }

    /// An owned copy of the full record mapping.
    pub async fn snapshot(&self) -> HashMap<TaskId, Task> {
        self.inner.state.lock().await.store.snapshot()
    }

    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.inner.state.lock().await.store.get(id).cloned()
    }

    /// The status-grouped listing view, see [`RecordStore::listing`].
    pub async fn listing(&self) -> Vec<(Status, Vec<Task>)> {
        self.inner.state.lock().await.store.listing()
    }

    pub async fn can_undo(&self) -> bool {
        self.inner.state.lock().await.history.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.inner.state.lock().await.history.can_redo()
    }

    /// A receiver that observes a revision counter bumped after every
    /// store-changing operation, local or remote in origin. This is the
    /// UI collaborator's seam for "something changed, re-read".
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn bump_revision(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }

    /// The single diff pass. Must run with the state lock held, directly
    /// after a mutation, with `previous` the snapshot taken just before
    /// that mutation.
    async fn run_diff_pass(&self, state: &mut EngineState, previous: HashMap<TaskId, Task>) {
        if state.suppress_next {
            state.suppress_next = false;
            log::debug!("diff pass suppressed (remote-origin or replayed mutation)");
            return;
        }

        let changes = diff::classify(&previous, state.store.records());
        if changes.is_empty() {
            return;
        }
        log::debug!(
            "diff pass: {} deleted, {} created, {} updated",
            changes.deleted.len(),
            changes.created.len(),
            changes.updated.len()
        );

        // Fixed record order inside one batch: deletions, creations,
        // updates. Undo replays multi-record batches in reverse of this.
        for id in &changes.deleted {
            state.history.record(Delta::deletion(previous[id].clone()));
        }
        for id in &changes.created {
            state
                .history
                .record(Delta::creation(state.store.records()[id].clone()));
        }
        for id in &changes.updated {
            state.history.record(Delta::update(
                previous[id].clone(),
                state.store.records()[id].clone(),
            ));
        }

        self.inner
            .dispatcher
            .flush(&changes, state.store.records())
            .await;
    }
}

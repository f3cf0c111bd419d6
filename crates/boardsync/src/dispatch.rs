use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::diff::BatchChanges;
use crate::remote::RemoteTasks;
use crate::task::{Task, TaskId};

/// Translates one classified diff pass into remote write calls.
///
/// Deletes are issued before upserts, matching the order the deltas were
/// recorded in, and the whole set is awaited as one joined unit: the
/// engine holds the pass open until every call resolves, which is what
/// serializes bursts of local edits at batch boundaries.
pub(crate) struct WriteDispatcher {
    remote: Arc<dyn RemoteTasks>,
}

impl WriteDispatcher {
    pub fn new(remote: Arc<dyn RemoteTasks>) -> Self {
        Self { remote }
    }

    pub async fn flush(&self, changes: &BatchChanges, current: &HashMap<TaskId, Task>) {
        let mut calls: Vec<BoxFuture<'_, ()>> = Vec::new();
        for id in &changes.deleted {
            calls.push(Box::pin(self.delete(id.clone())));
        }
        for id in changes.created.iter().chain(&changes.updated) {
            calls.push(Box::pin(self.upsert(current[id].clone())));
        }
        futures::future::join_all(calls).await;
    }

    // Failed writes are dropped, not retried and not rolled back: the
    // local store stays authoritative for the session and the next
    // inbound sync reconciles whatever diverged.
    async fn upsert(&self, task: Task) {
        if let Err(e) = self.remote.upsert(&task).await {
            log::warn!("dropping failed upsert for {}: {e}", task.id);
        }
    }

    async fn delete(&self, id: TaskId) {
        if let Err(e) = self.remote.delete(&id).await {
            log::warn!("dropping failed delete for {id}: {e}");
        }
    }
}

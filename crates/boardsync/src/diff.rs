use std::collections::HashMap;

use crate::task::{Task, TaskId};

/// The outcome of one diff pass: ids classified against two full store
/// snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchChanges {
    pub created: Vec<TaskId>,
    pub deleted: Vec<TaskId>,
    pub updated: Vec<TaskId>,
}

impl BatchChanges {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

/// Classifies the difference between two snapshots of the record store.
///
/// Classification runs against the full mappings, never incrementally, so
/// a record mutated twice within one batch is reported exactly once with
/// the original state as `before` and the final state as `after`. Ids come
/// back sorted within each class, which keeps multi-record batches
/// deterministic when they are replayed as deltas and writes.
pub fn classify(previous: &HashMap<TaskId, Task>, current: &HashMap<TaskId, Task>) -> BatchChanges {
    let mut changes = BatchChanges::default();
    for (id, task) in current {
        match previous.get(id) {
            None => changes.created.push(id.clone()),
            Some(old) if old != task => changes.updated.push(id.clone()),
            Some(_) => {}
        }
    }
    for id in previous.keys() {
        if !current.contains_key(id) {
            changes.deleted.push(id.clone());
        }
    }
    changes.created.sort();
    changes.deleted.sort();
    changes.updated.sort();
    changes
}

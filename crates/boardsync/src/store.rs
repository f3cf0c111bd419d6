use std::collections::HashMap;

use crate::task::{Status, Task, TaskId};

/// The local authoritative view of all task records, keyed by id.
///
/// Mutation is direct: collaborators insert and remove entries and it is
/// the differ's job to notice, not the store's job to report. An id only
/// ever leaves the map through an explicit removal; soft-deleted records
/// stay in the map and drop out of `listing()` alone.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: HashMap<TaskId, Task>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.records.get_mut(id)
    }

    /// Sets the entry for the record's id, returning the displaced record.
    pub fn insert(&mut self, task: Task) -> Option<Task> {
        self.records.insert(task.id.clone(), task)
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read access to the full mapping.
    pub fn records(&self) -> &HashMap<TaskId, Task> {
        &self.records
    }

    /// An owned copy of the full mapping, the differ's snapshot unit.
    pub fn snapshot(&self) -> HashMap<TaskId, Task> {
        self.records.clone()
    }

    /// Merges an authoritative batch, right-biased: each incoming record
    /// lands keyed by its id and overrides the local entry; ids the batch
    /// does not mention are untouched. Merging a batch twice is a no-op
    /// the second time.
    pub fn merge_batch(&mut self, batch: impl IntoIterator<Item = Task>) {
        for task in batch {
            self.records.insert(task.id.clone(), task);
        }
    }

    /// The order-stable listing view: live (non-soft-deleted) records
    /// grouped per status in board order, each group ascending by
    /// `updated_at` with unstamped records first (treated as epoch 0),
    /// ties broken by id.
    pub fn listing(&self) -> Vec<(Status, Vec<Task>)> {
        let mut lanes: Vec<(Status, Vec<Task>)> = Status::ALL
            .iter()
            .map(|status| (*status, Vec::new()))
            .collect();
        for task in self.records.values().filter(|task| !task.is_deleted()) {
            lanes[task.status as usize].1.push(task.clone());
        }
        for (_, tasks) in &mut lanes {
            tasks.sort_by(|a, b| {
                updated_key(a)
                    .cmp(&updated_key(b))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        lanes
    }
}

fn updated_key(task: &Task) -> i128 {
    task.updated_at
        .map(|ts| ts.unix_timestamp_nanos())
        .unwrap_or(0)
}

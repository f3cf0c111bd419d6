//! The append-only delta history behind undo/redo.

use crate::task::{Task, TaskId};

/// One record's change across a single diff pass: the state before and
/// the state after. Creation has no `before`, deletion has no `after`,
/// and the constructors make a delta with neither unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    before: Option<Task>,
    after: Option<Task>,
}

impl Delta {
    pub fn creation(after: Task) -> Self {
        Self {
            before: None,
            after: Some(after),
        }
    }

    pub fn deletion(before: Task) -> Self {
        Self {
            before: Some(before),
            after: None,
        }
    }

    pub fn update(before: Task, after: Task) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn before(&self) -> Option<&Task> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Task> {
        self.after.as_ref()
    }

    /// The id of the record this delta touches.
    pub fn id(&self) -> &TaskId {
        match (&self.after, &self.before) {
            (Some(task), _) | (None, Some(task)) => &task.id,
            (None, None) => unreachable!("delta with neither side"),
        }
    }

    pub fn into_parts(self) -> (Option<Task>, Option<Task>) {
        (self.before, self.after)
    }
}

/// A linear undo history: an ordered stack of deltas plus a cursor.
///
/// `applied` counts the deltas currently in effect, so the cursor of the
/// abstract model is `applied - 1` and always stays inside
/// `[-1, len - 1]`. Recording first discards everything past the cursor:
/// once a fresh edit lands after an undo, the redoable future is gone.
#[derive(Debug, Default)]
pub struct DeltaHistory {
    deltas: Vec<Delta>,
    applied: usize,
}

impl DeltaHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one delta at the cursor, truncating any redoable tail.
    pub fn record(&mut self, delta: Delta) {
        self.deltas.truncate(self.applied);
        self.deltas.push(delta);
        self.applied += 1;
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.deltas.len()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// The delta an `undo` would revert, without moving the cursor.
    pub fn peek_undo(&self) -> Option<&Delta> {
        self.applied.checked_sub(1).map(|i| &self.deltas[i])
    }

    /// The delta a `redo` would reapply, without moving the cursor.
    pub fn peek_redo(&self) -> Option<&Delta> {
        self.deltas.get(self.applied)
    }

    /// Steps the cursor back one delta, handing out a copy to revert.
    pub fn retreat(&mut self) -> Option<Delta> {
        let i = self.applied.checked_sub(1)?;
        self.applied = i;
        Some(self.deltas[i].clone())
    }

    /// Steps the cursor forward one delta, handing out a copy to reapply.
    pub fn advance(&mut self) -> Option<Delta> {
        let delta = self.deltas.get(self.applied)?.clone();
        self.applied += 1;
        Some(delta)
    }
}

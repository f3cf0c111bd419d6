use crate::task::TaskId;

/// Where the UI keeps its viewport.
///
/// Undo and redo refuse to edit a record the user cannot see. When the
/// target's anchor is out of view, the gate performs its bring-into-view
/// side effect (scrolling, highlighting, whatever the surface does) and
/// the history call returns without touching any state; the next call
/// finds the anchor visible and proceeds.
pub trait RevealGate: Send + Sync {
    /// Returns true when the record's anchor is already visible. A false
    /// return means the gate brought it into view instead and the caller
    /// must not mutate anything on this call.
    fn reveal(&self, id: &TaskId) -> bool;
}

/// Gate for headless use: everything is always in view.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReveal;

impl RevealGate for NoReveal {
    fn reveal(&self, _id: &TaskId) -> bool {
        true
    }
}

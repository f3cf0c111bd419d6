//! boardsync keeps a local, mutable collection of task records in step
//! with a remote authoritative store, with multi-step undo/redo over
//! arbitrary local edits.
//!
//! # Overview
//! The engine turns in-memory mutations into a discrete stream of
//! create/update/delete operations by diffing full store snapshots, one
//! pass per committed batch. Each pass appends before/after deltas to a
//! linear undo history and dispatches the matching remote writes, which
//! are awaited as one joined set before the next pass may start. A
//! subscribed push feed carries authoritative state back in; a one-shot
//! suppression flag keeps those merges from being reinterpreted as local
//! edits and echoing back out as writes.
//!
//! # Architecture
//! [`SyncEngine`] owns the store, the history, and the flag behind one
//! lock and is handed by clone to every collaborator. The remote service
//! sits behind the [`RemoteTasks`] trait with [`HttpRemote`] as the
//! stock transport, and UI concerns enter only through the [`RevealGate`]
//! seam. Start with [`SyncEngineBuilder`].

/// Builder pattern for configuring and connecting engines
pub mod builder;

/// Snapshot classification into created/deleted/updated ids
pub mod diff;

/// The engine: transactions, diff passes, undo/redo, suppression
pub mod engine;

/// Error types and handling
pub mod error;

/// Delta history for undo/redo
pub mod history;

/// The remote service seam and its HTTP implementation
pub mod remote;

/// The viewport gate consulted by undo/redo
pub mod reveal;

/// The record store and its listing view
pub mod store;

/// Task records, ids, and the status table
pub mod task;

mod channel;
mod dispatch;

pub use builder::SyncEngineBuilder;
pub use diff::BatchChanges;
pub use engine::{SyncEngine, Transaction, UndoOutcome};
pub use error::SyncError;
pub use history::{Delta, DeltaHistory};
pub use remote::{HttpRemote, RemoteTasks, TaskFeed};
pub use reveal::{NoReveal, RevealGate};
pub use store::RecordStore;
pub use task::{DEFAULT_TITLE, Status, Task, TaskId};

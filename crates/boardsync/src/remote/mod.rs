//! The remote task service at its seam.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SyncError;
use crate::task::{Task, TaskId};

mod http;
pub use http::HttpRemote;

/// An ongoing stream of authoritative record batches pushed by the
/// server. Batches carry full records, soft-deleted ones included, and
/// the same batch may be delivered more than once.
pub type TaskFeed = BoxStream<'static, Result<Vec<Task>, SyncError>>;

/// Trait abstracting the remote task service: individually-issued write
/// calls plus a subscribed push feed. Implementations pick the transport;
/// the engine only sees these three operations.
#[async_trait]
pub trait RemoteTasks: Send + Sync + 'static {
    /// Idempotent create-or-replace of one full record. Creation and
    /// update share this call.
    async fn upsert(&self, task: &Task) -> Result<(), SyncError>;

    /// Removes (or soft-deletes, the server's choice) one record by id.
    async fn delete(&self, id: &TaskId) -> Result<(), SyncError>;

    /// Subscribes to the `tasks` feed.
    async fn subscribe(&self) -> Result<TaskFeed, SyncError>;
}

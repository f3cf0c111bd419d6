//! End-to-end engine behavior against an in-process fake remote.

use std::collections::HashSet;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use boardsync::{
    RemoteTasks, RevealGate, Status, SyncEngine, SyncEngineBuilder, SyncError, Task, TaskFeed,
    TaskId, UndoOutcome,
};
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RemoteCall {
    Upsert(TaskId),
    Delete(TaskId),
}

/// Records every write in arrival order and hands out channel-backed
/// feeds so tests can push authoritative batches by hand.
#[derive(Default)]
struct FakeRemote {
    calls: StdMutex<Vec<RemoteCall>>,
    subscribes: AtomicUsize,
    feeds: StdMutex<Vec<mpsc::UnboundedSender<Result<Vec<Task>, SyncError>>>>,
    fail_writes: AtomicBool,
}

impl FakeRemote {
    fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    fn push_batch(&self, batch: Vec<Task>) {
        for feed in self.feeds.lock().unwrap().iter() {
            let _ = feed.send(Ok(batch.clone()));
        }
    }

    fn close_feeds(&self) {
        self.feeds.lock().unwrap().clear();
    }
}

#[async_trait]
impl RemoteTasks for FakeRemote {
    async fn upsert(&self, task: &Task) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(RemoteCall::Upsert(task.id.clone()));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Network("injected failure".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(RemoteCall::Delete(id.clone()));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Network("injected failure".into()));
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<TaskFeed, SyncError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

fn detached_engine() -> (SyncEngine, Arc<FakeRemote>) {
    let remote = Arc::new(FakeRemote::default());
    let engine = SyncEngineBuilder::new()
        .remote(remote.clone())
        .detached()
        .expect("engine builds");
    (engine, remote)
}

fn record(id: &str, title: &str, status: Status) -> Task {
    Task {
        id: TaskId::from_str(id),
        title: title.to_string(),
        status,
        deleted_at: None,
        created_at: None,
        updated_at: None,
    }
}

// ── Suppression and merging ────────────────────────────────────────────

#[tokio::test]
async fn remote_merge_records_nothing_and_dispatches_nothing() {
    let (engine, remote) = detached_engine();

    engine
        .apply_remote(vec![record("a", "from server", Status::Planned)])
        .await;

    assert!(engine.get(&TaskId::from_str("a")).await.is_some());
    assert!(!engine.can_undo().await);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn suppression_covers_exactly_one_pass() {
    let (engine, remote) = detached_engine();
    engine
        .apply_remote(vec![record("a", "from server", Status::Planned)])
        .await;

    // The very next local edit must be diffed, recorded, and dispatched.
    let task = engine.create_task(Status::Done).await;
    assert_eq!(remote.calls(), [RemoteCall::Upsert(task.id.clone())]);
    assert!(engine.can_undo().await);
}

#[tokio::test]
async fn merging_the_same_batch_twice_is_idempotent() {
    let (engine, _remote) = detached_engine();
    let batch = vec![
        record("a", "one", Status::Planned),
        record("b", "two", Status::Done),
    ];

    engine.apply_remote(batch.clone()).await;
    let once = engine.snapshot().await;
    engine.apply_remote(batch).await;
    assert_eq!(engine.snapshot().await, once);
}

#[tokio::test]
async fn merge_overrides_concurrent_local_edits_silently() {
    let (engine, _remote) = detached_engine();
    let task = engine.create_task(Status::Planned).await;

    engine.rename(&task.id, "local title").await;
    let mut authoritative = task.clone();
    authoritative.title = "server title".to_string();
    engine.apply_remote(vec![authoritative]).await;

    let merged = engine.get(&task.id).await.unwrap();
    assert_eq!(merged.title, "server title");
}

// ── Undo and redo ──────────────────────────────────────────────────────

#[tokio::test]
async fn undo_then_redo_restores_the_affected_record() {
    let (engine, _remote) = detached_engine();
    let task = engine.create_task(Status::Planned).await;
    engine.rename(&task.id, "ship it").await;

    assert_eq!(engine.undo().await, UndoOutcome::Applied(task.id.clone()));
    assert_eq!(
        engine.get(&task.id).await.unwrap().title,
        boardsync::DEFAULT_TITLE
    );

    assert_eq!(engine.redo().await, UndoOutcome::Applied(task.id.clone()));
    assert_eq!(engine.get(&task.id).await.unwrap().title, "ship it");
}

#[tokio::test]
async fn undoing_a_creation_removes_the_record() {
    let (engine, _remote) = detached_engine();
    let task = engine.create_task(Status::Testing).await;

    assert_eq!(engine.undo().await, UndoOutcome::Applied(task.id.clone()));
    assert!(engine.get(&task.id).await.is_none());

    assert_eq!(engine.redo().await, UndoOutcome::Applied(task.id.clone()));
    assert!(engine.get(&task.id).await.is_some());
}

#[tokio::test]
async fn undo_and_redo_at_the_boundary_are_no_ops() {
    let (engine, _remote) = detached_engine();
    assert_eq!(engine.undo().await, UndoOutcome::Nothing);
    assert_eq!(engine.redo().await, UndoOutcome::Nothing);

    let task = engine.create_task(Status::Planned).await;
    engine.undo().await;
    assert_eq!(engine.undo().await, UndoOutcome::Nothing);
    engine.redo().await;
    assert_eq!(engine.redo().await, UndoOutcome::Nothing);
    assert!(engine.get(&task.id).await.is_some());
}

#[tokio::test]
async fn undo_does_not_dispatch_or_re_record() {
    let (engine, remote) = detached_engine();
    let task = engine.create_task(Status::Planned).await;
    let writes_before = remote.calls().len();

    engine.undo().await;

    // The reverting write is suppressed on both axes: no new delta on
    // the stack (redo is still available, nothing extra to undo) and no
    // outbound call.
    assert_eq!(remote.calls().len(), writes_before);
    assert!(!engine.can_undo().await);
    assert!(engine.can_redo().await);
    assert!(engine.get(&task.id).await.is_none());
}

#[tokio::test]
async fn an_edit_after_undo_discards_the_redoable_future() {
    let (engine, _remote) = detached_engine();
    let a = engine.create_task(Status::Planned).await;
    let b = engine.create_task(Status::Planned).await;

    engine.undo().await;
    assert!(engine.get(&b.id).await.is_none());
    assert!(engine.can_redo().await);

    engine.create_task(Status::Done).await;
    assert_eq!(engine.redo().await, UndoOutcome::Nothing);
    assert!(engine.get(&b.id).await.is_none());
    assert!(engine.get(&a.id).await.is_some());
}

#[tokio::test]
async fn multi_record_batches_undo_in_reverse_recording_order() {
    let (engine, _remote) = detached_engine();
    engine
        .apply_remote(vec![
            record("a", "original", Status::Planned),
            record("b", "doomed", Status::Done),
        ])
        .await;

    // One batch: delete b, create c, update a. Recorded in exactly that
    // order, so undo unwinds update, then creation, then deletion.
    engine
        .transaction(|tx| {
            tx.remove(&TaskId::from_str("b"));
            tx.upsert(record("c", "fresh", Status::NotStarted));
            tx.set_title(&TaskId::from_str("a"), "changed");
        })
        .await;

    assert_eq!(
        engine.undo().await,
        UndoOutcome::Applied(TaskId::from_str("a"))
    );
    assert_eq!(
        engine.get(&TaskId::from_str("a")).await.unwrap().title,
        "original"
    );

    assert_eq!(
        engine.undo().await,
        UndoOutcome::Applied(TaskId::from_str("c"))
    );
    assert!(engine.get(&TaskId::from_str("c")).await.is_none());

    assert_eq!(
        engine.undo().await,
        UndoOutcome::Applied(TaskId::from_str("b"))
    );
    assert_eq!(
        engine.get(&TaskId::from_str("b")).await.unwrap().title,
        "doomed"
    );
}

// ── Reveal gate ────────────────────────────────────────────────────────

/// Reports every record out of view the first time it is asked about it
/// and in view from then on, like a board that scrolls on demand.
#[derive(Default)]
struct ScrollOnDemand {
    seen: StdMutex<HashSet<TaskId>>,
}

impl RevealGate for ScrollOnDemand {
    fn reveal(&self, id: &TaskId) -> bool {
        !self.seen.lock().unwrap().insert(id.clone())
    }
}

#[tokio::test]
async fn undo_reveals_first_and_applies_on_the_second_call() {
    let remote = Arc::new(FakeRemote::default());
    let engine = SyncEngineBuilder::new()
        .remote(remote.clone())
        .reveal(Arc::new(ScrollOnDemand::default()))
        .detached()
        .expect("engine builds");

    let task = engine.create_task(Status::Planned).await;

    assert_eq!(
        engine.undo().await,
        UndoOutcome::RevealedFirst(task.id.clone())
    );
    // Nothing moved: the record is still there and still undoable.
    assert!(engine.get(&task.id).await.is_some());
    assert!(engine.can_undo().await);

    assert_eq!(engine.undo().await, UndoOutcome::Applied(task.id.clone()));
    assert!(engine.get(&task.id).await.is_none());
}

// ── Dispatch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_delete_in_one_batch_dispatch_delete_first() {
    let (engine, remote) = detached_engine();
    engine
        .apply_remote(vec![record("y", "old", Status::Done)])
        .await;

    engine
        .transaction(|tx| {
            tx.upsert(record("x", "new", Status::Planned));
            tx.remove(&TaskId::from_str("y"));
        })
        .await;

    assert_eq!(
        remote.calls(),
        [
            RemoteCall::Delete(TaskId::from_str("y")),
            RemoteCall::Upsert(TaskId::from_str("x")),
        ]
    );
}

#[tokio::test]
async fn a_failed_write_is_dropped_without_touching_local_state() {
    let (engine, remote) = detached_engine();
    remote.fail_writes.store(true, Ordering::SeqCst);

    let task = engine.create_task(Status::Planned).await;

    assert_eq!(remote.calls().len(), 1);
    assert!(engine.get(&task.id).await.is_some());
    assert!(engine.can_undo().await);

    // The engine is not wedged: further edits keep flowing.
    engine.rename(&task.id, "still editable").await;
    assert_eq!(remote.calls().len(), 2);
}

/// Parks every write on a semaphore until the test releases it.
struct GatedRemote {
    calls: StdMutex<Vec<RemoteCall>>,
    in_flight: AtomicUsize,
    gate: Semaphore,
}

impl GatedRemote {
    fn new() -> Self {
        Self {
            calls: StdMutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl RemoteTasks for GatedRemote {
    async fn upsert(&self, task: &Task) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(RemoteCall::Upsert(task.id.clone()));
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.expect("gate open");
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(RemoteCall::Delete(id.clone()));
        Ok(())
    }

    async fn subscribe(&self) -> Result<TaskFeed, SyncError> {
        Ok(Box::pin(futures::stream::pending()))
    }
}

#[tokio::test(start_paused = true)]
async fn a_pass_finishes_its_writes_before_the_next_pass_starts() {
    let remote = Arc::new(GatedRemote::new());
    let engine = SyncEngineBuilder::new()
        .remote(remote.clone())
        .detached()
        .expect("engine builds");

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.create_task(Status::Planned).await })
    };
    while remote.in_flight.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let second = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.create_task(Status::Done).await })
    };

    // With the first write parked, the second batch must stay queued.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(remote.calls.lock().unwrap().len(), 1);

    remote.gate.add_permits(2);
    first.await.expect("first batch completes");
    second.await.expect("second batch completes");
    assert_eq!(remote.calls.lock().unwrap().len(), 2);
}

// ── The inbound channel ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn connected_engines_merge_feed_batches_and_resubscribe() {
    let _ = env_logger::builder().is_test(true).try_init();
    let remote = Arc::new(FakeRemote::default());
    let engine = SyncEngineBuilder::new()
        .remote(remote.clone())
        .connect()
        .expect("engine connects");
    let mut revisions = engine.watch();

    while remote.subscribe_count() == 0 {
        tokio::task::yield_now().await;
    }

    remote.push_batch(vec![record("a", "pushed", Status::Planned)]);
    tokio::time::timeout(Duration::from_secs(5), revisions.changed())
        .await
        .expect("merge lands")
        .expect("engine alive");
    assert!(engine.get(&TaskId::from_str("a")).await.is_some());
    assert!(!engine.can_undo().await);

    // Kill the feed; the channel must come back for a second subscription.
    remote.close_feeds();
    let mut waited = Duration::ZERO;
    while remote.subscribe_count() < 2 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        waited += Duration::from_millis(100);
        assert!(waited < Duration::from_secs(10), "no resubscription");
    }
}

// ── Listing ────────────────────────────────────────────────────────────

#[tokio::test]
async fn listing_follows_the_status_table_and_update_times() {
    let (engine, _remote) = detached_engine();
    let stamp = |mut task: Task, secs: i64| {
        task.updated_at = Some(time::OffsetDateTime::from_unix_timestamp(secs).unwrap());
        task
    };

    engine
        .apply_remote(vec![
            stamp(record("1", "done", Status::Done), 100),
            stamp(record("2", "late plan", Status::Planned), 300),
            stamp(record("3", "early plan", Status::Planned), 50),
        ])
        .await;

    let listing = engine.listing().await;
    let planned: Vec<&str> = listing[Status::Planned as usize]
        .1
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(planned, ["3", "2"]);
    let done: Vec<&str> = listing[Status::Done as usize]
        .1
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(done, ["1"]);
}

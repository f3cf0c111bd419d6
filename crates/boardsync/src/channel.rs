use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::remote::RemoteTasks;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Drives the inbound half of the sync protocol: subscribe, merge each
/// batch into the engine, resubscribe whenever the feed drops.
///
/// The task holds only a weak engine handle, so dropping the last
/// engine clone tears the loop down instead of the loop keeping the
/// engine alive forever.
pub(crate) fn spawn_sync_channel(
    engine: &SyncEngine,
    remote: Arc<dyn RemoteTasks>,
) -> JoinHandle<()> {
    let weak = engine.downgrade();
    tokio::spawn(async move {
        loop {
            let mut feed = match remote.subscribe().await {
                Ok(feed) => feed,
                Err(e) => {
                    log::warn!("tasks feed subscribe failed: {e}; retrying in {RESUBSCRIBE_DELAY:?}");
                    tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                    if weak.upgrade().is_none() {
                        return;
                    }
                    continue;
                }
            };
            log::debug!("subscribed to tasks feed");

            while let Some(item) = feed.next().await {
                match item {
                    Ok(batch) => {
                        let Some(engine) = weak.upgrade() else { return };
                        log::trace!("merging feed batch of {} records", batch.len());
                        engine.apply_remote(batch).await;
                    }
                    // One bad line is not worth the subscription.
                    Err(SyncError::Payload(e)) => {
                        log::warn!("skipping undecodable feed batch: {e}");
                    }
                    Err(e) => {
                        log::warn!("tasks feed error: {e}");
                        break;
                    }
                }
            }
            if weak.upgrade().is_none() {
                return;
            }
            log::warn!("tasks feed closed; resubscribing in {RESUBSCRIBE_DELAY:?}");
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    })
}

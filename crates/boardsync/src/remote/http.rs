use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use url::Url;

use crate::error::SyncError;
use crate::remote::{RemoteTasks, TaskFeed};
use crate::task::{Task, TaskId};

/// Per-call deadline for writes. The subscribe request must stay open
/// indefinitely, so the deadline is applied per request, not on the
/// shared client.
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// [`RemoteTasks`] over plain HTTP.
///
/// Writes map to `POST {base}/tasks` (full record body, idempotent
/// upsert) and `DELETE {base}/tasks/{id}`. The feed is one long-lived
/// `GET {base}/tasks/subscribe` request answered with newline-delimited
/// JSON, one record batch per line.
pub struct HttpRemote {
    client: reqwest::Client,
    base: String,
}

impl HttpRemote {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        let base = base_url.as_str().trim_end_matches('/').to_string();
        Self { client, base }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }
}

#[async_trait]
impl RemoteTasks for HttpRemote {
    async fn upsert(&self, task: &Task) -> Result<(), SyncError> {
        self.client
            .post(format!("{}/tasks", self.base))
            .timeout(WRITE_TIMEOUT)
            .json(task)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), SyncError> {
        self.client
            .delete(format!("{}/tasks/{}", self.base, id))
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<TaskFeed, SyncError> {
        let resp = self
            .client
            .get(format!("{}/tasks/subscribe", self.base))
            .send()
            .await?
            .error_for_status()?;

        // Chunk boundaries are arbitrary, so buffer until a newline and
        // decode one batch per completed line. The trailing sentinel
        // flushes a final unterminated line when the feed closes.
        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(SyncError::from))
            .chain(futures::stream::once(futures::future::ready(Ok(
                Bytes::from_static(b"\n"),
            ))))
            .scan(Vec::new(), |buffer: &mut Vec<u8>, chunk| {
                let out = match chunk {
                    Ok(bytes) => {
                        if !bytes.is_empty() {
                            log::trace!("feed chunk: {} bytes", bytes.len());
                        }
                        buffer.extend_from_slice(&bytes);
                        let mut batches = Vec::new();
                        let mut start = 0;
                        for i in 0..buffer.len() {
                            if buffer[i] == b'\n' {
                                if let Some(batch) = decode_feed_line(&buffer[start..i]) {
                                    batches.push(batch);
                                }
                                start = i + 1;
                            }
                        }
                        *buffer = buffer[start..].to_vec();
                        batches
                    }
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(out))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }
}

/// Decodes one feed line into a record batch. Blank lines (keepalives)
/// yield nothing; a non-empty line that fails to decode yields the
/// payload error so the consumer can decide whether to skip or drop the
/// subscription.
fn decode_feed_line(line: &[u8]) -> Option<Result<Vec<Task>, SyncError>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(serde_json::from_slice(line).map_err(SyncError::from))
}

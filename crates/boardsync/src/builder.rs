//! Builder module for configuring and instantiating the sync engine.

use std::sync::Arc;

use url::Url;

use crate::channel::spawn_sync_channel;
use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::remote::{HttpRemote, RemoteTasks};
use crate::reveal::{NoReveal, RevealGate};

/// Endpoint used when neither the builder nor the environment names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Environment variable consulted for the endpoint.
pub const BASE_URL_ENV: &str = "BOARDSYNC_API_URL";

/// Builder for configuring and instantiating a [`SyncEngine`].
///
/// Provides a fluent interface for selecting the remote endpoint, the
/// HTTP client, the reveal gate, or a whole replacement transport.
#[derive(Default)]
pub struct SyncEngineBuilder {
    base_url: Option<String>,
    client: Option<reqwest::Client>,
    reveal: Option<Arc<dyn RevealGate>>,
    remote: Option<Arc<dyn RemoteTasks>>,
}

impl SyncEngineBuilder {
    /// Creates a new empty builder instance with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the remote task service. When unset, the
    /// `BOARDSYNC_API_URL` environment variable is consulted, then
    /// [`DEFAULT_BASE_URL`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the HTTP client used by the default transport.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the reveal gate consulted by undo/redo before editing a record.
    pub fn reveal(mut self, gate: Arc<dyn RevealGate>) -> Self {
        self.reveal = Some(gate);
        self
    }

    /// Replaces the whole transport. Used by tests and by embedders with
    /// their own wire protocol; `base_url` and `client` are then ignored.
    pub fn remote(mut self, remote: Arc<dyn RemoteTasks>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Builds the engine and starts the inbound sync channel. Must be
    /// called from within a tokio runtime.
    pub fn connect(self) -> Result<SyncEngine, SyncError> {
        let reveal = self.reveal.clone().unwrap_or_else(|| Arc::new(NoReveal));
        let remote = self.resolve_remote()?;
        let engine = SyncEngine::new(remote.clone(), reveal);
        let handle = spawn_sync_channel(&engine, remote);
        engine.attach_channel(handle);
        Ok(engine)
    }

    /// Builds the engine without subscribing: local edits still dispatch
    /// writes, nothing flows in. Offline and test use.
    pub fn detached(self) -> Result<SyncEngine, SyncError> {
        let reveal = self.reveal.clone().unwrap_or_else(|| Arc::new(NoReveal));
        let remote = self.resolve_remote()?;
        Ok(SyncEngine::new(remote, reveal))
    }

    fn resolve_remote(&self) -> Result<Arc<dyn RemoteTasks>, SyncError> {
        if let Some(remote) = &self.remote {
            return Ok(remote.clone());
        }
        let raw = match &self.base_url {
            Some(url) => url.clone(),
            None => std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let url = Url::parse(&raw)?;
        let client = self.client.clone().unwrap_or_default();
        Ok(Arc::new(HttpRemote::with_client(client, url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_an_unparseable_base_url() {
        let result = SyncEngineBuilder::new().base_url("not a url").detached();
        assert!(matches!(result, Err(SyncError::InvalidUrl(_))));
    }

    #[test]
    fn accepts_an_explicit_base_url() {
        let engine = SyncEngineBuilder::new()
            .base_url("http://boards.example:4000/")
            .detached();
        assert!(engine.is_ok());
    }
}

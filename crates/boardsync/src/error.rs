use thiserror::Error;

/// Error types that can occur when talking to the remote task service.
///
/// History-boundary undo/redo and remotely overwritten local edits are
/// deliberately not represented here: the former is an ordinary
/// [`UndoOutcome::Nothing`](crate::engine::UndoOutcome) and the latter
/// resolves silently, last merge wins.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport-level failure of a write or subscribe call.
    #[error("network error: {0}")]
    Network(String),

    /// A feed line or response body that does not decode as task records.
    #[error("malformed record payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Handles errors from parsing the base URL.
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

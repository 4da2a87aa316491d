use reqwest::Method;
use shared::domain::TaskId;
use thiserror::Error;

/// Failure talking to the remote todo collection.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid base url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("could not build the HTTP client: {0}")]
    ClientSetup(#[source] reqwest::Error),
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        message: String,
    },
    #[error("{method} {url} returned an unreadable body: {source}")]
    Decode {
        method: Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl NetworkError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("task title must not be empty")]
    EmptyTitle,
    #[error("task {0} is not in the list")]
    UnknownTask(TaskId),
    #[error("task {0} already has a request in flight")]
    Busy(TaskId),
    #[error("server assigned id {0}, which is already in the list")]
    ConflictingId(TaskId),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

use std::path::PathBuf;

use thiserror::Error;

/// Marker text the API puts in the body of a 400 when creating a duplicate.
pub const ALREADY_EXISTS_MARKER: &str = "already exists";

pub type WitResult<T> = Result<T, WitError>;

/// Every failure a [`crate::WitClient`] call can surface.
#[derive(Error, Debug)]
pub enum WitError {
    /// The API answered with a non-2xx status.
    #[error("wit.ai responded with {status}: {body}")]
    RemoteApi { status: u16, body: String },

    /// An audio file could not be opened or read.
    #[error("failed to read audio file {}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request never produced a response (DNS, connection reset, timeout).
    #[error("request to wit.ai failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response whose body was not the JSON we expected.
    #[error("unexpected response body from {endpoint}: {source}")]
    InvalidResponse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl WitError {
    /// The HTTP status of a remote error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            WitError::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for the 400 the API returns when creating something that is already there.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            WitError::RemoteApi { status: 400, body } if body.contains(ALREADY_EXISTS_MARKER)
        )
    }
}

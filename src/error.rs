// Error types for the publish pipeline.
//
// Every component returns a classified `PublishError`. The pipeline never
// recovers from one; it only releases the local asset and hands the error
// back unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used throughout the library.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Coarse classification of a [`PublishError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    MalformedResponse,
    RemoteApi,
    Storage,
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// A required setting is missing or invalid. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure, timeout or non-2xx status.
    #[error("transport error while {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body could not be decoded or lacks a field we depend on.
    #[error("malformed response from {origin}: {detail}")]
    MalformedResponse { origin: String, detail: String },

    /// The provider answered with an explicit `error` object.
    #[error("VK API method {method} failed: {message}")]
    RemoteApi {
        method: String,
        code: Option<i64>,
        message: String,
    },

    /// Local directory or file operation failed.
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::RemoteApi { .. } => ErrorKind::RemoteApi,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    pub(crate) fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn malformed(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            origin: origin.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

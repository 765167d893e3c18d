/// Error types for every layer of the editor core
///
/// Each component reports its own enum; the staging session wraps them
/// so the UI only has to deal with `SessionError`.

use std::time::Duration;
use thiserror::Error;

use crate::blob::BlobUrl;

/// Gallery store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database could not be opened or its schema could not be installed.
    /// Fatal for all gallery operations until the store is reopened.
    #[error("Gallery storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Failed to read from gallery: {0}")]
    Read(#[source] rusqlite::Error),

    #[error("Failed to write to gallery: {0}")]
    Write(String),

    #[error("No gallery image with id {0}")]
    NotFound(i64),
}

/// Dereferencing a blob reference that is no longer live
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Reference {0} has been revoked")]
    Revoked(BlobUrl),
}

/// Failures of the transform capability or the pipeline around it
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("No image loaded to transform")]
    EmptyInput,

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Invalid arguments for {filter}: {reason}")]
    InvalidArgs { filter: String, reason: String },

    #[error("Transform engine failed to initialize: {0}")]
    Init(String),

    #[error("{filter} failed: {reason}")]
    Failed { filter: String, reason: String },

    #[error("{filter} returned malformed image data")]
    Malformed { filter: String },

    #[error("{filter} did not finish within {timeout:?}")]
    Timeout { filter: String, timeout: Duration },
}

/// Errors surfaced by the staging session to the presentation layer
#[derive(Error, Debug)]
pub enum SessionError {
    /// Another operation on this session has not settled yet
    #[error("Another operation is still in progress")]
    Busy,

    #[error("No image is loaded")]
    NoWorkingImage,

    #[error("No gallery image with id {0}")]
    NotFound(i64),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::NotFound(id),
            other => SessionError::Store(other),
        }
    }
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        SessionError::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

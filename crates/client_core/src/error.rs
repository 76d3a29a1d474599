use std::path::PathBuf;

use shared::error::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("story not found")]
    NotFound,
    #[error("server rejected request ({status}): {message}")]
    Api {
        status: u16,
        code: Option<ErrorCode>,
        message: String,
    },
}

/// Failures of the upload pipeline. Every variant except `Client` is decided
/// locally before the store is contacted.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported file type for '{}'; accepted: image/png, image/jpeg, image/webp", path.display())]
    UnsupportedMediaType { path: PathBuf },
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{}' is empty", path.display())]
    Empty { path: PathBuf },
    #[error("another upload is already in progress")]
    Busy,
    #[error(transparent)]
    Client(#[from] ClientError),
}

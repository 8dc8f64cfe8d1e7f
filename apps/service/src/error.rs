use std::io::Error as IoError;

use thiserror::Error;

/// Service-wide failure taxonomy.
///
/// Probe failures (timeout, transport) are deliberately absent: the prober
/// folds them into the outcome as data rather than raising them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("token has expired")]
    Expired,
    #[error("invalid stored record: {0}")]
    Validation(String),
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Collapse an io error into `NotFound` when the underlying file is
    /// missing, so callers can match on the taxonomy instead of io kinds.
    pub(crate) fn from_io(err: IoError) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            std::io::ErrorKind::AlreadyExists => Error::Conflict,
            _ => Error::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

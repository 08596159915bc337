//! Error types.

use thiserror::Error;

/// Errors that abort a whole pipeline run or fail a single collaborator call.
#[derive(Error, Debug)]
pub enum PlayerwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Run deadline exceeded during {0}")]
    DeadlineExceeded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlayerwatchError>;

/// Why a single raw record could not become a [`crate::Player`].
///
/// These never abort a batch: the record is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("error parsing id: '{0}'")]
    ParseId(String),

    #[error("error parsing time zone: '{0}'")]
    ParseTimezone(String),

    #[error("error parsing last online: '{0}'")]
    ParseLastOnline(String),
}

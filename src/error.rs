//! Error handling for the DevHub sync engine

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Unified error type for remote table access, reconciliation and
/// approval mutations.
#[derive(Error, Debug)]
pub enum Error {
    /// Network or transport failure (the request never produced a response)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote endpoint answered with a non-2xx status
    #[error("remote rejected request with status {status}: {message}")]
    RemoteRejected {
        status: StatusCode,
        message: String,
    },

    /// A multi-step mutation stopped partway through; remote state is left
    /// in the pre-failure condition and no compensation is attempted
    #[error("partial mutation: {0}")]
    PartialMutation(String),

    /// A descriptor or option is unusable as configured
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Registry persistence errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new remote-rejection error from a status and response body
    pub fn rejected<T: fmt::Display>(status: StatusCode, message: T) -> Self {
        Error::RemoteRejected {
            status,
            message: message.to_string(),
        }
    }

    /// Create a new partial-mutation error
    pub fn partial_mutation<T: fmt::Display>(msg: T) -> Self {
        Error::PartialMutation(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config_invalid<T: fmt::Display>(msg: T) -> Self {
        Error::ConfigInvalid(msg.to_string())
    }
}

//! Error types for chunking and remote submission

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::ApiError;

/// Whether a failed call is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network failure or server-side 5xx
    Transient,
    /// Client-side 4xx, unsupported parameters, malformed response
    Fatal,
}

/// Errors returned by a `TranscriptionBackend` call
#[derive(Error, Debug, Clone)]
pub enum SubmitError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server error (status {status}): {error}")]
    Server { status: u16, error: ApiError },

    #[error("Request rejected (status {status}): {error}")]
    Request { status: u16, error: ApiError },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl SubmitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SubmitError::Transport(_) | SubmitError::Server { .. } => FailureKind::Transient,
            SubmitError::Request { .. } | SubmitError::Malformed(_) => FailureKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    /// HTTP status if the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            SubmitError::Server { status, .. } | SubmitError::Request { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Build the error for a non-success status, classifying 5xx as transient.
    pub fn from_status(status: u16, body: &str) -> Self {
        let error = ApiError::from_body(body);
        if (500..600).contains(&status) {
            SubmitError::Server { status, error }
        } else {
            SubmitError::Request { status, error }
        }
    }
}

/// Caller errors when splitting a source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkError {
    #[error("Chunk duration must be in (0, {max}] seconds, got {requested}")]
    InvalidDuration { requested: f64, max: f64 },

    #[error("Source has no audio")]
    EmptySource,

    #[error("Chunk payload of {bytes} bytes exceeds the {max} byte upload limit")]
    PayloadTooLarge { bytes: usize, max: usize },

    #[error("Failed to encode chunk {index}: {reason}")]
    Encode { index: usize, reason: String },
}

//! Error types for narrator

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while moving a work item through the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Response link has no connected peer")]
    NotConnected,

    #[error("Response link peer disconnected mid-call")]
    LinkClosed,

    #[error("Response link peer rejected: a peer is already attached")]
    PeerRejected,

    #[error("Malformed reply from response peer: {0}")]
    MalformedReply(String),

    #[error("Synthesized audio could not be decoded ({bytes} bytes preserved at {path:?})")]
    SynthesisDecodeFailure { bytes: usize, path: Option<PathBuf> },

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Queue '{queue}' is full")]
    QueueOverflow { queue: &'static str },

    #[error("Queue '{queue}' is closed")]
    QueueClosed { queue: &'static str },

    #[error("Work item is missing {0}")]
    IncompleteItem(&'static str),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Chat source error: {0}")]
    ChatSource(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Outcome of a failed stage step.
///
/// `Shutdown` must be propagated by every stage loop. `Recoverable` errors are
/// isolated to the current work item. `Fatal` errors end the task and are
/// surfaced to the supervisor, which tears the pipeline down.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Shutdown requested")]
    Shutdown,

    #[error("Recoverable error: {0}")]
    Recoverable(PipelineError),

    #[error("Fatal error: {0}")]
    Fatal(PipelineError),
}

impl StageError {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, StageError::Shutdown)
    }
}

impl From<PipelineError> for StageError {
    fn from(err: PipelineError) -> Self {
        match err {
            // A closed queue means the other side of the pipeline is gone
            PipelineError::QueueClosed { .. } => StageError::Fatal(err),
            other => StageError::Recoverable(other),
        }
    }
}

//! Error types for narrator-spk

use bytes::Bytes;
use narrator_core::PipelineError;
use thiserror::Error;

/// Speech synthesis errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("API error ({status}, {len} byte body)", len = .body.len())]
    Api { status: u16, body: Bytes },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SpeechError> for PipelineError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Io(e) => PipelineError::Io(e),
            other => PipelineError::Synthesis(other.to_string()),
        }
    }
}

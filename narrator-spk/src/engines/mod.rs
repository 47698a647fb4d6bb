//! TTS engine implementations

pub mod http;

use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;
use narrator_core::SynthesisConfig;
use serde::Serialize;

/// Fields of one synthesis request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
    pub pitch: i32,
}

impl SpeechRequest {
    /// Request for `text` using the fixed voice settings from config
    pub fn from_config(text: impl Into<String>, config: &SynthesisConfig) -> Self {
        Self {
            text: text.into(),
            voice: config.voice.clone(),
            speed: config.speed,
            pitch: config.pitch,
        }
    }
}

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Synthesize text, returning the encoded audio bytes as produced by the engine
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, SpeechError>;

    /// Get engine name
    fn name(&self) -> &str;
}

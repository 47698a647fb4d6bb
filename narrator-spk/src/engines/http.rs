//! Form-encoded HTTP synthesis engine

use crate::engines::{SpeechRequest, TtsEngine};
use crate::error::SpeechError;
use async_trait::async_trait;
use bytes::Bytes;
use narrator_core::SynthesisConfig;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// Posts `text`, `voice`, `speed` and `pitch` as form fields and returns the
/// response body untouched
pub struct HttpTtsEngine {
    client: Client,
    endpoint: String,
}

impl HttpTtsEngine {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, SpeechError> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(SpeechError::Config("Synthesis endpoint cannot be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SpeechError::Engine(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &SynthesisConfig) -> Result<Self, SpeechError> {
        Self::new(config.endpoint.clone(), config.timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TtsEngine for HttpTtsEngine {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Bytes, SpeechError> {
        let start = Instant::now();

        let response = self.client.post(&self.endpoint).form(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.bytes().await.unwrap_or_default();
            return Err(SpeechError::Api { status, body });
        }

        let audio = response.bytes().await?;
        debug!(
            "TTS time: {:.3}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            audio.len()
        );
        Ok(audio)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_config() {
        let config = SynthesisConfig::default();
        let engine = HttpTtsEngine::from_config(&config).unwrap();
        assert_eq!(engine.endpoint(), "http://127.0.0.1:8080/synthesize");
        assert_eq!(engine.name(), "http");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = HttpTtsEngine::new("", 10);
        assert!(matches!(result, Err(SpeechError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        // Port 9 (discard) is not expected to be listening locally
        let engine = HttpTtsEngine::new("http://127.0.0.1:9/synthesize", 2).unwrap();
        let request = SpeechRequest {
            text: "hello".to_string(),
            voice: "voice2".to_string(),
            speed: 1.0,
            pitch: 0,
        };
        assert!(engine.synthesize(&request).await.is_err());
    }
}

//! Synthesis stage: response text in, decoded audio out

use crate::diagnostics::DiagnosticSink;
use crate::engines::{SpeechRequest, TtsEngine};
use crate::error::SpeechError;
use narrator_core::{
    AudioArtifact, PipelineError, PipelineStats, Shutdown, StageError, StageReceiver, StageSender,
    SynthesisConfig, WavClip, WorkItem,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Consumes the synthesis queue, attaches audio and feeds the playback queue
pub struct SynthesisStage {
    engine: Arc<dyn TtsEngine>,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: SynthesisConfig,
    input: StageReceiver,
    output: StageSender,
    stats: Arc<PipelineStats>,
    shutdown: Shutdown,
}

impl SynthesisStage {
    pub fn new(
        engine: Arc<dyn TtsEngine>,
        diagnostics: Arc<dyn DiagnosticSink>,
        config: SynthesisConfig,
        input: StageReceiver,
        output: StageSender,
        stats: Arc<PipelineStats>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            engine,
            diagnostics,
            config,
            input,
            output,
            stats,
            shutdown,
        }
    }

    /// Run until shutdown or a fatal error
    pub async fn run(mut self) -> Result<(), StageError> {
        info!("🔊 Synthesis stage started (engine: {})", self.engine.name());
        loop {
            match self.step().await {
                Ok(()) => {}
                Err(StageError::Recoverable(_)) => self.stats.record_failure(),
                Err(StageError::Shutdown) => {
                    info!("Synthesis stage stopping");
                    return Err(StageError::Shutdown);
                }
                Err(StageError::Fatal(e)) => {
                    error!("Synthesis stage failed: {}", e);
                    return Err(StageError::Fatal(e));
                }
            }
        }
    }

    /// Process one item from the synthesis queue
    pub async fn step(&mut self) -> Result<(), StageError> {
        let mut item = self.shutdown.guard(self.input.next()).await??;

        let clip = match self.shutdown.guard(self.synthesize(&item)).await? {
            Ok(clip) => clip,
            Err(e) => {
                warn!(
                    author = item.author(),
                    "Dropping message after synthesis failure: {}", e
                );
                return Err(StageError::Recoverable(e));
            }
        };

        item.audio = Some(Box::new(clip));
        self.stats.record_synthesized();
        self.output.forward(item, &self.stats)
    }

    async fn synthesize(&self, item: &WorkItem) -> Result<WavClip, PipelineError> {
        let text = item
            .response_text
            .as_deref()
            .ok_or(PipelineError::IncompleteItem("response text"))?;

        let start = Instant::now();
        let request = SpeechRequest::from_config(text, &self.config);
        let bytes = match self.engine.synthesize(&request).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Error pages are kept for inspection like undecodable audio
                if let SpeechError::Api { body, .. } = &e {
                    if !body.is_empty() {
                        self.persist_failure(body).await;
                    }
                }
                return Err(e.into());
            }
        };

        match WavClip::decode(&bytes) {
            Ok(clip) => {
                info!(
                    "TTS time: {:.3}s for {:.2}s of audio",
                    start.elapsed().as_secs_f64(),
                    clip.duration().as_secs_f64()
                );
                Ok(clip)
            }
            Err(decode_error) => {
                warn!("Failed to decode synthesis output: {}", decode_error);
                let path = self.persist_failure(&bytes).await;
                Err(PipelineError::SynthesisDecodeFailure {
                    bytes: bytes.len(),
                    path,
                })
            }
        }
    }

    async fn persist_failure(&self, bytes: &[u8]) -> Option<PathBuf> {
        match self.diagnostics.persist(bytes).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to persist synthesis output: {}", e);
                None
            }
        }
    }
}

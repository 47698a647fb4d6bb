//! Audio artifacts produced by speech synthesis

use crate::error::{PipelineError, Result};
use bytes::Bytes;
use std::fmt::Debug;
use std::io::Cursor;
use std::time::Duration;

/// Playable audio attached to a work item.
///
/// The pipeline never inspects samples; it only needs transport bytes and
/// the playback duration used for pacing.
pub trait AudioArtifact: Send + Sync + Debug {
    /// Encode to the bytes pushed to playback clients
    fn encode(&self) -> Result<Bytes>;

    /// How long the clip plays for
    fn duration(&self) -> Duration;
}

#[derive(Debug, Clone)]
enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

/// Decoded WAV clip
#[derive(Debug, Clone)]
pub struct WavClip {
    spec: hound::WavSpec,
    samples: Samples,
    frames: u32,
}

impl WavClip {
    /// Decode a complete WAV container. Every sample is read so truncated
    /// or corrupt payloads fail here rather than at playback.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| PipelineError::Audio(format!("Invalid WAV header: {}", e)))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 || spec.channels == 0 {
            return Err(PipelineError::Audio(format!(
                "Unplayable WAV spec: {} Hz, {} channels",
                spec.sample_rate, spec.channels
            )));
        }
        let frames = reader.duration();

        let samples = match spec.sample_format {
            hound::SampleFormat::Int => Samples::Int(
                reader
                    .samples::<i32>()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| PipelineError::Audio(format!("Corrupt WAV data: {}", e)))?,
            ),
            hound::SampleFormat::Float => Samples::Float(
                reader
                    .samples::<f32>()
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| PipelineError::Audio(format!("Corrupt WAV data: {}", e)))?,
            ),
        };

        Ok(Self {
            spec,
            samples,
            frames,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }
}

impl AudioArtifact for WavClip {
    fn encode(&self) -> Result<Bytes> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.spec)
                .map_err(|e| PipelineError::Audio(format!("Failed to start WAV: {}", e)))?;
            match &self.samples {
                Samples::Int(samples) => {
                    for sample in samples {
                        writer
                            .write_sample(*sample)
                            .map_err(|e| PipelineError::Audio(e.to_string()))?;
                    }
                }
                Samples::Float(samples) => {
                    for sample in samples {
                        writer
                            .write_sample(*sample)
                            .map_err(|e| PipelineError::Audio(e.to_string()))?;
                    }
                }
            }
            writer
                .finalize()
                .map_err(|e| PipelineError::Audio(format!("Failed to finish WAV: {}", e)))?;
        }
        Ok(Bytes::from(cursor.into_inner()))
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.spec.sample_rate as f64)
    }
}

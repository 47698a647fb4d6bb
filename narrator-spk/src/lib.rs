//! narrator-spk: speech synthesis for the narrator pipeline
//!
//! Converts response text into playable audio through a pluggable
//! [`TtsEngine`], preserving undecodable engine output for diagnosis.

pub mod diagnostics;
pub mod engines;
pub mod error;
pub mod stage;

pub use diagnostics::{DiagnosticSink, FileDiagnosticSink};
pub use engines::http::HttpTtsEngine;
pub use engines::{SpeechRequest, TtsEngine};
pub use error::SpeechError;
pub use stage::SynthesisStage;

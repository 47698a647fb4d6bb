//! narrator-core: shared building blocks of the narrator pipeline
//!
//! - Work items and the audio artifact contract
//! - The priority inbox and the bounded stage queues
//! - The connection registry used by both network endpoints
//! - Errors, configuration, shutdown signal and counters

pub mod audio;
pub mod config;
pub mod error;
pub mod inbox;
pub mod registry;
pub mod shutdown;
pub mod stage_queue;
pub mod stats;
pub mod work_item;

pub use audio::{AudioArtifact, WavClip};
pub use config::{
    ChatConfig, ChatSourceKind, LinkConfig, LoggingConfig, NarratorConfig, PlaybackConfig,
    QueueConfig, SynthesisConfig,
};
pub use error::{ConfigError, PipelineError, Result, StageError};
pub use inbox::PriorityInbox;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use shutdown::Shutdown;
pub use stage_queue::{stage_queue, Rejected, StageReceiver, StageSender};
pub use stats::{PipelineStats, StatsSnapshot};
pub use work_item::WorkItem;

//! narrator-server: turns chat messages into broadcast speech
//!
//! Chat messages enter a priority inbox, are answered over the single-peer
//! response link, synthesized to audio and pushed to every playback client.

pub mod chat;
pub mod ingestion;
pub mod pipeline;
pub mod playback;
pub mod playback_stage;
pub mod response_link;
pub mod response_stage;

pub use chat::{ChatSource, StdinChatSource, TwitchChatSource};
pub use ingestion::IngestionAdapter;
pub use pipeline::{BoundPipeline, Pipeline, PipelineContext};
pub use playback::{PlaybackBroadcaster, PlaybackClient, PlaybackEvent, PlaybackMessage};
pub use playback_stage::{Cooldown, PlaybackStage};
pub use response_link::{LinkReply, LinkRequest, LinkState, ResponseLink};
pub use response_stage::ResponseStage;

//! Chat sources feeding the ingestion adapter

pub mod stdin;
pub mod twitch;

use crate::ingestion::IngestionAdapter;
use async_trait::async_trait;
use narrator_core::{ChatConfig, ChatSourceKind, Result, Shutdown, StageError};

pub use stdin::StdinChatSource;
pub use twitch::TwitchChatSource;

/// External producer of chat messages.
///
/// `run` delivers messages until shutdown. A source that runs out of input
/// stays idle until shutdown rather than ending the pipeline.
#[async_trait]
pub trait ChatSource: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        adapter: IngestionAdapter,
        shutdown: Shutdown,
    ) -> std::result::Result<(), StageError>;
}

/// Build the configured chat source, if any
pub fn from_config(config: &ChatConfig) -> Result<Option<Box<dyn ChatSource>>> {
    match config.source {
        ChatSourceKind::Stdin => Ok(Some(Box::new(StdinChatSource::new()))),
        ChatSourceKind::Twitch => Ok(Some(Box::new(TwitchChatSource::from_config(config)?))),
        ChatSourceKind::None => Ok(None),
    }
}

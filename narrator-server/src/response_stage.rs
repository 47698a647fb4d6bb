//! Response stage: inbox in, response text out

use crate::response_link::ResponseLink;
use narrator_core::{PipelineStats, PriorityInbox, Shutdown, StageError, StageSender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Takes items in priority order, asks the response link for a reply and
/// forwards answered items to the synthesis queue
pub struct ResponseStage {
    inbox: Arc<PriorityInbox>,
    link: Arc<ResponseLink>,
    output: StageSender,
    stats: Arc<PipelineStats>,
    shutdown: Shutdown,
}

impl ResponseStage {
    pub fn new(
        inbox: Arc<PriorityInbox>,
        link: Arc<ResponseLink>,
        output: StageSender,
        stats: Arc<PipelineStats>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            inbox,
            link,
            output,
            stats,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<(), StageError> {
        info!("💬 Response stage started");
        loop {
            match self.step().await {
                Ok(()) => {}
                Err(StageError::Recoverable(_)) => self.stats.record_failure(),
                Err(StageError::Shutdown) => {
                    info!("Response stage stopping");
                    return Err(StageError::Shutdown);
                }
                Err(StageError::Fatal(e)) => {
                    error!("Response stage failed: {}", e);
                    return Err(StageError::Fatal(e));
                }
            }
        }
    }

    pub async fn step(&self) -> Result<(), StageError> {
        let mut item = self.shutdown.guard(self.inbox.next()).await??;

        let start = Instant::now();
        let reply = self
            .shutdown
            .guard(self.link.call(item.user_message(), item.user_name()))
            .await?;

        match reply {
            Ok(text) => {
                info!(
                    "LLM time: {:.3}s, {} asked {:?}, reply {:?}",
                    start.elapsed().as_secs_f64(),
                    item.author(),
                    item.user_message(),
                    text
                );
                item.response_text = Some(text);
                self.stats.record_responded();
                self.output.forward(item, &self.stats)
            }
            Err(e) => {
                warn!(
                    author = item.author(),
                    "Dropping message {:?}: {}",
                    item.user_message(),
                    e
                );
                Err(StageError::Recoverable(e))
            }
        }
    }
}

//! Boundary between chat sources and the priority inbox

use narrator_core::{PipelineStats, PriorityInbox, Result, WorkItem};
use std::sync::Arc;
use tracing::debug;

/// Wraps chat events into work items and submits them to the inbox
#[derive(Clone)]
pub struct IngestionAdapter {
    inbox: Arc<PriorityInbox>,
    stats: Arc<PipelineStats>,
    default_priority: i64,
}

impl IngestionAdapter {
    pub fn new(inbox: Arc<PriorityInbox>, stats: Arc<PipelineStats>, default_priority: i64) -> Self {
        Self {
            inbox,
            stats,
            default_priority,
        }
    }

    /// Submit one chat message. Waits while the inbox is full.
    pub async fn on_chat_message(&self, text: &str, author: Option<&str>) -> Result<()> {
        self.on_chat_message_with_priority(text, author, self.default_priority)
            .await
    }

    pub async fn on_chat_message_with_priority(
        &self,
        text: &str,
        author: Option<&str>,
        priority: i64,
    ) -> Result<()> {
        let item = WorkItem::new(text, author.map(str::to_string)).with_priority(priority);
        debug!(
            author = item.author(),
            priority, "Submitting chat message: {:?}", text
        );
        self.inbox.submit(item).await?;
        self.stats.record_submitted();
        Ok(())
    }
}

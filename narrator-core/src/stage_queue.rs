//! Bounded FIFO queues between pipeline stages

use crate::error::{PipelineError, Result, StageError};
use crate::stats::PipelineStats;
use crate::work_item::WorkItem;
use tokio::sync::mpsc;
use tracing::warn;

/// Create a named queue of fixed capacity
pub fn stage_queue(name: &'static str, capacity: usize) -> (StageSender, StageReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        StageSender {
            name,
            capacity,
            sender,
        },
        StageReceiver { name, receiver },
    )
}

/// Producer half. Admission never waits: a full queue rejects the item.
#[derive(Clone, Debug)]
pub struct StageSender {
    name: &'static str,
    capacity: usize,
    sender: mpsc::Sender<WorkItem>,
}

/// Rejected admission, handing the item back to the caller
#[derive(Debug)]
pub struct Rejected {
    pub item: WorkItem,
    pub error: PipelineError,
}

impl StageSender {
    /// Offer an item without waiting
    pub fn offer(&self, item: WorkItem) -> std::result::Result<(), Rejected> {
        match self.sender.try_send(item) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(item)) => Err(Rejected {
                item,
                error: PipelineError::QueueOverflow { queue: self.name },
            }),
            Err(mpsc::error::TrySendError::Closed(item)) => Err(Rejected {
                item,
                error: PipelineError::QueueClosed { queue: self.name },
            }),
        }
    }

    /// Offer an item downstream, dropping it with a single warning when the
    /// queue is full. A closed queue is fatal for the calling stage.
    pub fn forward(
        &self,
        item: WorkItem,
        stats: &PipelineStats,
    ) -> std::result::Result<(), StageError> {
        match self.offer(item) {
            Ok(()) => Ok(()),
            Err(Rejected {
                item,
                error: PipelineError::QueueOverflow { queue },
            }) => {
                stats.record_overflow();
                warn!(
                    queue,
                    author = item.author(),
                    "Queue {} full, dropping message: {:?}",
                    queue,
                    item.response_text.as_deref().unwrap_or(item.user_message())
                );
                Ok(())
            }
            Err(Rejected { error, .. }) => Err(StageError::Fatal(error)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer half, owned by the single downstream stage
#[derive(Debug)]
pub struct StageReceiver {
    name: &'static str,
    receiver: mpsc::Receiver<WorkItem>,
}

impl StageReceiver {
    /// Wait for the next item in arrival order
    pub async fn next(&mut self) -> Result<WorkItem> {
        self.receiver
            .recv()
            .await
            .ok_or(PipelineError::QueueClosed { queue: self.name })
    }

    /// Take the next item if one is already queued
    pub fn try_next(&mut self) -> Option<WorkItem> {
        self.receiver.try_recv().ok()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop accepting new items; queued items can still be drained
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

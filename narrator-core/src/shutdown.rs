//! Pipeline-wide shutdown signal

use crate::error::StageError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable shutdown signal observed by every task in the pipeline
#[derive(Clone, Debug)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Signal every holder. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal has been triggered
    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any clone of `self`, so this only ends on trigger
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }

    /// Race `fut` against the signal. Shutdown wins ties.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output, StageError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.wait() => Err(StageError::Shutdown),
            output = fut => Ok(output),
        }
    }
}

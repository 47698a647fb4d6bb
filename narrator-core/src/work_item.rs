//! The unit of data moved through the pipeline

use crate::audio::AudioArtifact;

/// One chat-triggered utterance.
///
/// Owned by exactly one stage at a time and handed downstream by move.
#[derive(Debug)]
pub struct WorkItem {
    /// Lower values are answered first
    pub priority: i64,
    user_message: String,
    user_name: Option<String>,
    /// Set by the response stage
    pub response_text: Option<String>,
    /// Set by the synthesis stage
    pub audio: Option<Box<dyn AudioArtifact>>,
}

impl WorkItem {
    pub fn new(user_message: impl Into<String>, user_name: Option<String>) -> Self {
        Self {
            priority: 0,
            user_message: user_message.into(),
            user_name,
            response_text: None,
            audio: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    /// Author for logs and requests, `anonymous` when unknown
    pub fn author(&self) -> &str {
        self.user_name.as_deref().unwrap_or("anonymous")
    }
}

//! Storage for synthesis output that failed to decode

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Receives raw synthesis output that could not be decoded
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Persist `bytes`, returning where they ended up
    async fn persist(&self, bytes: &[u8]) -> std::io::Result<PathBuf>;
}

/// Writes the latest failed payload to a fixed file, replacing the previous one
pub struct FileDiagnosticSink {
    path: PathBuf,
}

impl FileDiagnosticSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DiagnosticSink for FileDiagnosticSink {
    async fn persist(&self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, bytes).await?;
        warn!(
            "Wrote {} bytes of undecodable synthesis output to {}",
            bytes.len(),
            self.path.display()
        );
        Ok(self.path.clone())
    }
}

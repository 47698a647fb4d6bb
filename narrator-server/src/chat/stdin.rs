//! Line-oriented chat source for local runs

use super::ChatSource;
use crate::ingestion::IngestionAdapter;
use async_trait::async_trait;
use narrator_core::{PipelineError, Shutdown, StageError};
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const LINE_BUFFER: usize = 64;

/// Reads `author: message` lines from standard input
#[derive(Debug, Default)]
pub struct StdinChatSource;

impl StdinChatSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatSource for StdinChatSource {
    fn name(&self) -> &str {
        "stdin"
    }

    async fn run(&self, adapter: IngestionAdapter, shutdown: Shutdown) -> Result<(), StageError> {
        info!("⌨️  Reading chat from stdin (format: `author: message`)");
        let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
            .map_err(|e| StageError::Fatal(PipelineError::Io(e)))?;
        pump_lines(lines, &adapter, &shutdown).await
    }
}

/// Read lines from `reader` on a dedicated thread.
///
/// The thread is never joined, so a read blocked on an idle terminal cannot
/// hold the runtime open after shutdown.
pub fn spawn_line_reader<R>(reader: R) -> std::io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("chat-stdin".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read chat input: {}", e);
                        break;
                    }
                }
            }
            debug!("Chat reader thread exiting");
        })?;
    Ok(rx)
}

/// Split a line into `(author, message)`.
///
/// Lines without an `author:` prefix are anonymous.
pub fn parse_line(line: &str) -> Option<(Option<&str>, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(':') {
        Some((author, message))
            if !author.trim().is_empty()
                && !author.contains(char::is_whitespace)
                && !message.trim().is_empty() =>
        {
            Some((Some(author.trim()), message.trim()))
        }
        _ => Some((None, line)),
    }
}

/// Feed every received line to the adapter, then idle until shutdown
pub async fn pump_lines(
    mut lines: mpsc::Receiver<String>,
    adapter: &IngestionAdapter,
    shutdown: &Shutdown,
) -> Result<(), StageError> {
    while let Some(line) = shutdown.guard(lines.recv()).await? {
        if let Some((author, message)) = parse_line(&line) {
            shutdown
                .guard(adapter.on_chat_message(message, author))
                .await?
                .map_err(StageError::Fatal)?;
        }
    }

    info!("Chat input ended, waiting for shutdown");
    shutdown.wait().await;
    Err(StageError::Shutdown)
}

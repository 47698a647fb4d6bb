// Twitch chat source
// Reads channel chat over Twitch's IRC-over-websocket gateway

use super::ChatSource;
use crate::ingestion::IngestionAdapter;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use narrator_core::{ChatConfig, ConfigError, PipelineError, Shutdown, StageError};
use rand::Rng;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// A parsed IRC line relevant to chat ingestion
#[derive(Debug, PartialEq, Eq)]
pub enum IrcEvent<'a> {
    Ping(&'a str),
    Chat {
        author: &'a str,
        channel: &'a str,
        text: &'a str,
    },
    Other,
}

/// Parse one IRC line, with or without trailing CRLF or a tags prefix
pub fn parse_irc_line(line: &str) -> IrcEvent<'_> {
    let mut rest = line.trim_end_matches(['\r', '\n']);

    if let Some(payload) = rest.strip_prefix("PING ") {
        return IrcEvent::Ping(payload);
    }

    if rest.starts_with('@') {
        rest = match rest.split_once(' ') {
            Some((_, after)) => after,
            None => return IrcEvent::Other,
        };
    }

    let Some(prefixed) = rest.strip_prefix(':') else {
        return IrcEvent::Other;
    };
    let Some((prefix, after_prefix)) = prefixed.split_once(' ') else {
        return IrcEvent::Other;
    };
    let Some(params) = after_prefix.strip_prefix("PRIVMSG ") else {
        return IrcEvent::Other;
    };
    let Some((channel, text)) = params.split_once(" :") else {
        return IrcEvent::Other;
    };

    let author = prefix.split('!').next().unwrap_or(prefix);
    IrcEvent::Chat {
        author,
        channel: channel.trim_start_matches('#'),
        text,
    }
}

pub struct TwitchChatSource {
    server_url: String,
    channel: String,
    nickname: String,
    token: Option<String>,
}

impl TwitchChatSource {
    pub fn from_config(config: &ChatConfig) -> Result<Self, PipelineError> {
        let channel = config
            .channel
            .as_deref()
            .map(|c| c.trim_start_matches('#').to_lowercase())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ConfigError::ValidationError("Twitch chat requires a channel".to_string())
            })?;

        // Twitch accepts any justinfan nick for read-only anonymous access
        let nickname = match &config.nickname {
            Some(nick) => nick.to_lowercase(),
            None => format!("justinfan{}", rand::thread_rng().gen_range(10_000..100_000)),
        };

        Ok(Self {
            server_url: config.server_url.clone(),
            channel,
            nickname,
            token: config.token.clone(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Login and join commands, in send order
    pub fn handshake(&self) -> Vec<String> {
        let mut commands = Vec::with_capacity(3);
        if let Some(token) = &self.token {
            let token = token.strip_prefix("oauth:").unwrap_or(token);
            commands.push(format!("PASS oauth:{}", token));
        }
        commands.push(format!("NICK {}", self.nickname));
        commands.push(format!("JOIN #{}", self.channel));
        commands
    }
}

#[async_trait]
impl ChatSource for TwitchChatSource {
    fn name(&self) -> &str {
        "twitch"
    }

    async fn run(&self, adapter: IngestionAdapter, shutdown: Shutdown) -> Result<(), StageError> {
        let (socket, _) = shutdown
            .guard(connect_async(self.server_url.as_str()))
            .await?
            .map_err(|e| {
                StageError::Fatal(PipelineError::ChatSource(format!(
                    "Failed to connect to {}: {}",
                    self.server_url, e
                )))
            })?;
        let (mut sender, mut receiver) = socket.split();

        for command in self.handshake() {
            sender.send(Message::Text(command)).await.map_err(|e| {
                StageError::Fatal(PipelineError::ChatSource(format!("Handshake failed: {}", e)))
            })?;
        }
        info!("✅ Twitch chat connected to #{} as {}", self.channel, self.nickname);

        loop {
            let frame = match shutdown.guard(receiver.next()).await? {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    return Err(StageError::Fatal(PipelineError::ChatSource(format!(
                        "Twitch chat error: {}",
                        e
                    ))))
                }
                None => {
                    return Err(StageError::Fatal(PipelineError::ChatSource(
                        "Twitch chat connection closed".to_string(),
                    )))
                }
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => {
                    warn!("Twitch chat closed the connection");
                    continue;
                }
                _ => continue,
            };

            for line in text.lines() {
                match parse_irc_line(line) {
                    IrcEvent::Ping(payload) => {
                        debug!("Answering Twitch PING");
                        let pong = Message::Text(format!("PONG {}", payload));
                        if let Err(e) = sender.send(pong).await {
                            warn!("Failed to answer Twitch PING: {}", e);
                        }
                    }
                    IrcEvent::Chat { author, text, .. } => {
                        shutdown
                            .guard(adapter.on_chat_message(text, Some(author)))
                            .await?
                            .map_err(StageError::Fatal)?;
                    }
                    IrcEvent::Other => {}
                }
            }
        }
    }
}

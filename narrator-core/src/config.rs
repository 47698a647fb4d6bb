// Configuration for the narrator pipeline

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Response link endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address the response peer connects to
    pub bind_address: String,
    /// Value sent as `prompt_setting` with every request
    pub prompt_setting: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9877".to_string(),
            prompt_setting: "generic".to_string(),
        }
    }
}

/// Playback endpoint and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Address display clients connect to
    pub bind_address: String,
    /// Lower bound of the pause after each utterance, in seconds
    pub cooldown_min_secs: f64,
    /// Upper bound of the pause after each utterance, in seconds
    pub cooldown_max_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9876".to_string(),
            cooldown_min_secs: 2.5,
            cooldown_max_secs: 3.5,
        }
    }
}

/// Longest accepted pause after an utterance, in seconds
pub const MAX_COOLDOWN_SECS: f64 = 3600.0;

impl PlaybackConfig {
    /// Cooldown bounds, clamped to `[0, MAX_COOLDOWN_SECS]`
    pub fn cooldown_range(&self) -> (Duration, Duration) {
        let clamp = |secs: f64| {
            Duration::try_from_secs_f64(secs.min(MAX_COOLDOWN_SECS)).unwrap_or_default()
        };
        (clamp(self.cooldown_min_secs), clamp(self.cooldown_max_secs))
    }
}

/// Speech synthesis service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// URL receiving the form-encoded synthesis request
    pub endpoint: String,
    pub voice: String,
    pub speed: f32,
    pub pitch: i32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Where undecodable synthesis output is written for inspection
    pub failed_output_path: PathBuf,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/synthesize".to_string(),
            voice: "voice2".to_string(),
            speed: 1.2,
            pitch: 10,
            timeout_secs: 60,
            failed_output_path: PathBuf::from("failed_tts_output"),
        }
    }
}

/// Queue capacities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub inbox_capacity: usize,
    pub synthesis_capacity: usize,
    pub playback_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 10,
            synthesis_capacity: 5,
            playback_capacity: 5,
        }
    }
}

/// Which chat source feeds the inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSourceKind {
    /// `author: text` lines on standard input
    Stdin,
    /// Twitch IRC chat of `chat.channel`
    Twitch,
    /// No built-in source; messages arrive through the ingestion adapter only
    None,
}

/// Chat ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub source: ChatSourceKind,
    /// Twitch channel name, without the leading '#'
    pub channel: Option<String>,
    /// OAuth token; anonymous read-only login when absent
    pub token: Option<String>,
    /// Nickname paired with `token`
    pub nickname: Option<String>,
    /// IRC-over-websocket endpoint
    pub server_url: String,
    /// Priority assigned to chat messages
    pub default_priority: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            source: ChatSourceKind::Stdin,
            channel: None,
            token: None,
            nickname: None,
            server_url: "ws://irc-ws.chat.twitch.tv:80".to_string(),
            default_priority: 0,
        }
    }
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "narrator_server=debug"
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete narrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub link: LinkConfig,
    pub playback: PlaybackConfig,
    pub synthesis: SynthesisConfig,
    pub queues: QueueConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

impl NarratorConfig {
    /// Load configuration from a TOML or JSON file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration text, trying JSON first and then TOML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        if let Ok(config) = serde_json::from_str::<NarratorConfig>(content) {
            return Ok(config);
        }

        toml::from_str::<NarratorConfig>(content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Defaults overridden by `NARRATOR_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `NARRATOR_*` environment overrides on top of the current values
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(address) = lookup("NARRATOR_LINK_ADDRESS") {
            self.link.bind_address = address;
        }
        if let Some(address) = lookup("NARRATOR_PLAYBACK_ADDRESS") {
            self.playback.bind_address = address;
        }
        if let Some(endpoint) = lookup("NARRATOR_TTS_URL") {
            self.synthesis.endpoint = endpoint;
        }
        if let Some(voice) = lookup("NARRATOR_TTS_VOICE") {
            self.synthesis.voice = voice;
        }
        if let Some(channel) = lookup("NARRATOR_CHANNEL") {
            self.chat.channel = Some(channel);
        }
        if let Some(token) = lookup("NARRATOR_TWITCH_TOKEN") {
            self.chat.token = Some(token);
        }
        if let Some(level) = lookup("NARRATOR_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, address) in [
            ("link.bind_address", &self.link.bind_address),
            ("playback.bind_address", &self.playback.bind_address),
        ] {
            if address.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a socket address, got '{}'",
                    name, address
                )));
            }
        }

        let shares_port = match (
            self.link.bind_address.parse::<std::net::SocketAddr>(),
            self.playback.bind_address.parse::<std::net::SocketAddr>(),
        ) {
            // Port 0 asks the OS for a fresh port each time
            (Ok(link), Ok(playback)) => link == playback && link.port() != 0,
            _ => false,
        };
        if shares_port {
            return Err(ConfigError::ValidationError(
                "link and playback endpoints cannot share an address".to_string(),
            ));
        }

        let (min, max) = (
            self.playback.cooldown_min_secs,
            self.playback.cooldown_max_secs,
        );
        if !min.is_finite() || !max.is_finite() || min < 0.0 {
            return Err(ConfigError::ValidationError(
                "cooldown bounds must be finite and non-negative".to_string(),
            ));
        }
        if min > max {
            return Err(ConfigError::ValidationError(
                "cooldown_min_secs cannot be greater than cooldown_max_secs".to_string(),
            ));
        }
        if max > MAX_COOLDOWN_SECS {
            return Err(ConfigError::ValidationError(format!(
                "cooldown_max_secs cannot exceed {} seconds",
                MAX_COOLDOWN_SECS
            )));
        }

        if !self.synthesis.endpoint.starts_with("http://")
            && !self.synthesis.endpoint.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "synthesis.endpoint must be an http(s) URL".to_string(),
            ));
        }
        if self.synthesis.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "synthesis.timeout_secs must be > 0".to_string(),
            ));
        }
        if self.synthesis.voice.is_empty() {
            return Err(ConfigError::ValidationError(
                "synthesis.voice cannot be empty".to_string(),
            ));
        }

        if self.queues.inbox_capacity == 0
            || self.queues.synthesis_capacity == 0
            || self.queues.playback_capacity == 0
        {
            return Err(ConfigError::ValidationError(
                "queue capacities must be > 0".to_string(),
            ));
        }

        if self.chat.source == ChatSourceKind::Twitch {
            match &self.chat.channel {
                Some(channel) if !channel.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::ValidationError(
                        "chat.channel is required for the twitch source".to_string(),
                    ))
                }
            }
            if self.chat.token.is_some() && self.chat.nickname.is_none() {
                return Err(ConfigError::ValidationError(
                    "chat.nickname is required when chat.token is set".to_string(),
                ));
            }
        }

        Ok(())
    }
}

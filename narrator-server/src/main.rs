// Narrator - chat in, speech out
// Starts the response link, playback endpoint and every pipeline stage

use anyhow::Context;
use clap::{Parser, ValueEnum};
use narrator_core::{ChatSourceKind, NarratorConfig, Shutdown};
use narrator_server::{chat, Pipeline};
use narrator_spk::{FileDiagnosticSink, HttpTtsEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "narrator-server")]
#[command(about = "Narrates chat: answers messages and broadcasts the spoken reply", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log level or filter directive (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Chat source to read messages from
    #[arg(long, value_enum)]
    chat: Option<ChatArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChatArg {
    Stdin,
    Twitch,
    None,
}

impl From<ChatArg> for ChatSourceKind {
    fn from(arg: ChatArg) -> Self {
        match arg {
            ChatArg::Stdin => ChatSourceKind::Stdin,
            ChatArg::Twitch => ChatSourceKind::Twitch,
            ChatArg::None => ChatSourceKind::None,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<NarratorConfig> {
    let mut config = match &cli.config {
        Some(path) => NarratorConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => NarratorConfig::default(),
    };
    config.apply_env();

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    if let Some(chat) = cli.chat {
        config.chat.source = chat.into();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &NarratorConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config);

    info!("🚀 Starting narrator...");

    info!("🗣️  Initializing speech synthesis ({})...", config.synthesis.endpoint);
    let engine = Arc::new(HttpTtsEngine::from_config(&config.synthesis)?);
    let diagnostics = Arc::new(FileDiagnosticSink::new(
        config.synthesis.failed_output_path.clone(),
    ));
    info!("✅ Speech synthesis ready (voice: {})", config.synthesis.voice);

    let shutdown = Shutdown::new();
    let mut pipeline =
        Pipeline::new(config.clone(), engine, diagnostics).with_shutdown(shutdown.clone());
    match chat::from_config(&config.chat)? {
        Some(source) => pipeline = pipeline.with_chat_source(source),
        None => warn!("No chat source configured, messages must come from elsewhere"),
    }

    let bound = pipeline.bind().await?;

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        signal_shutdown.trigger();
    });

    bound.run().await?;
    info!("👋 Narrator stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}

// Pipeline supervisor
// Builds the shared context once, starts every task and tears them down together

use crate::chat::ChatSource;
use crate::ingestion::IngestionAdapter;
use crate::playback::PlaybackBroadcaster;
use crate::playback_stage::{Cooldown, PlaybackStage};
use crate::response_link::ResponseLink;
use crate::response_stage::ResponseStage;
use axum::Router;
use narrator_core::{
    stage_queue, NarratorConfig, PipelineError, PipelineStats, PriorityInbox, Result, Shutdown,
    StageError,
};
use narrator_spk::{DiagnosticSink, SynthesisStage, TtsEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Handles shared by every stage, created once per pipeline
#[derive(Clone)]
pub struct PipelineContext {
    pub inbox: Arc<PriorityInbox>,
    pub link: Arc<ResponseLink>,
    pub broadcaster: Arc<PlaybackBroadcaster>,
    pub stats: Arc<PipelineStats>,
    pub shutdown: Shutdown,
}

impl PipelineContext {
    pub fn new(config: &NarratorConfig, shutdown: Shutdown) -> Self {
        Self {
            inbox: Arc::new(PriorityInbox::new(config.queues.inbox_capacity)),
            link: Arc::new(ResponseLink::new(
                config.link.prompt_setting.clone(),
                shutdown.clone(),
            )),
            broadcaster: Arc::new(PlaybackBroadcaster::new(shutdown.clone())),
            stats: Arc::new(PipelineStats::new()),
            shutdown,
        }
    }
}

/// Pipeline configuration plus its pluggable collaborators
pub struct Pipeline {
    config: NarratorConfig,
    engine: Arc<dyn TtsEngine>,
    diagnostics: Arc<dyn DiagnosticSink>,
    chat: Option<Box<dyn ChatSource>>,
    shutdown: Shutdown,
}

impl Pipeline {
    pub fn new(
        config: NarratorConfig,
        engine: Arc<dyn TtsEngine>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            config,
            engine,
            diagnostics,
            chat: None,
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_chat_source(mut self, chat: Box<dyn ChatSource>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Use an externally owned shutdown signal
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Bind both listening endpoints. Nothing runs until [`BoundPipeline::run`].
    pub async fn bind(self) -> Result<BoundPipeline> {
        let link_listener = bind_listener(&self.config.link.bind_address).await?;
        let playback_listener = bind_listener(&self.config.playback.bind_address).await?;
        let context = PipelineContext::new(&self.config, self.shutdown.clone());

        Ok(BoundPipeline {
            link_addr: link_listener.local_addr()?,
            playback_addr: playback_listener.local_addr()?,
            link_listener,
            playback_listener,
            context,
            pipeline: self,
        })
    }
}

async fn bind_listener(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|source| PipelineError::Bind {
            address: address.to_string(),
            source,
        })
}

/// A pipeline whose endpoints are bound and ready to run
pub struct BoundPipeline {
    link_addr: SocketAddr,
    playback_addr: SocketAddr,
    link_listener: TcpListener,
    playback_listener: TcpListener,
    context: PipelineContext,
    pipeline: Pipeline,
}

type TaskOutcome = (&'static str, std::result::Result<(), StageError>);

impl BoundPipeline {
    pub fn link_addr(&self) -> SocketAddr {
        self.link_addr
    }

    pub fn playback_addr(&self) -> SocketAddr {
        self.playback_addr
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Adapter for pushing chat messages from outside the pipeline
    pub fn ingestion(&self) -> IngestionAdapter {
        IngestionAdapter::new(
            self.context.inbox.clone(),
            self.context.stats.clone(),
            self.pipeline.config.chat.default_priority,
        )
    }

    /// Run every task until shutdown or the first task failure.
    ///
    /// Returns the first non-shutdown error, after every task has stopped.
    pub async fn run(self) -> Result<()> {
        let adapter = self.ingestion();
        let BoundPipeline {
            link_addr,
            playback_addr,
            link_listener,
            playback_listener,
            context,
            pipeline,
        } = self;
        let config = &pipeline.config;
        let shutdown = context.shutdown.clone();

        let (synthesis_tx, synthesis_rx) =
            stage_queue("synthesis", config.queues.synthesis_capacity);
        let (playback_tx, playback_rx) = stage_queue("playback", config.queues.playback_capacity);

        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();

        info!("🔗 Response link listening on ws://{}", link_addr);
        tasks.spawn(serve(
            "response link server",
            link_listener,
            context.link.clone().router(),
            shutdown.clone(),
        ));

        info!("📺 Playback endpoint listening on ws://{}", playback_addr);
        tasks.spawn(serve(
            "playback server",
            playback_listener,
            context.broadcaster.clone().router(),
            shutdown.clone(),
        ));

        let response = ResponseStage::new(
            context.inbox.clone(),
            context.link.clone(),
            synthesis_tx,
            context.stats.clone(),
            shutdown.clone(),
        );
        tasks.spawn(async move { ("response stage", response.run().await) });

        let synthesis = SynthesisStage::new(
            pipeline.engine.clone(),
            pipeline.diagnostics.clone(),
            config.synthesis.clone(),
            synthesis_rx,
            playback_tx,
            context.stats.clone(),
            shutdown.clone(),
        );
        tasks.spawn(async move { ("synthesis stage", synthesis.run().await) });

        let playback = PlaybackStage::new(
            playback_rx,
            context.broadcaster.clone(),
            Cooldown::from_config(&config.playback),
            context.stats.clone(),
            shutdown.clone(),
        );
        tasks.spawn(async move { ("playback stage", playback.run().await) });

        if let Some(chat) = pipeline.chat {
            let chat_shutdown = shutdown.clone();
            info!("💬 Chat source: {}", chat.name());
            tasks.spawn(async move { ("chat source", chat.run(adapter, chat_shutdown).await) });
        }

        info!("✅ Pipeline running");
        let mut first_error: Option<PipelineError> = None;

        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((name, Err(StageError::Shutdown))) => {
                    debug!("{} stopped on shutdown", name);
                    None
                }
                Ok((name, Ok(()))) => {
                    info!("{} finished", name);
                    None
                }
                Ok((name, Err(StageError::Fatal(e) | StageError::Recoverable(e)))) => {
                    error!("❌ {} failed: {}", name, e);
                    Some(e)
                }
                Err(join_error) => {
                    error!("❌ Pipeline task aborted: {}", join_error);
                    Some(PipelineError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        join_error.to_string(),
                    )))
                }
            };

            if first_error.is_none() {
                first_error = failure;
            }

            if !shutdown.is_triggered() {
                info!("🛑 Stopping pipeline");
                shutdown.trigger();
            }
            context.inbox.close();
        }

        info!("📊 Pipeline stats: {:?}", context.stats.snapshot());
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Serve `router` on `listener` until shutdown
async fn serve(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: Shutdown,
) -> TaskOutcome {
    let signal = shutdown.clone();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move { signal.wait().await })
        .await;

    match result {
        Ok(()) if shutdown.is_triggered() => (name, Err(StageError::Shutdown)),
        Ok(()) => (
            name,
            Err(StageError::Fatal(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "server stopped unexpectedly",
            )))),
        ),
        Err(e) => (name, Err(StageError::Fatal(PipelineError::Io(e)))),
    }
}

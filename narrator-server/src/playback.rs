// Playback broadcaster
// Multicasts audio and speech events to every connected display client

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use narrator_core::{ConnectionId, ConnectionRegistry, PipelineError, Result, Shutdown};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Frames a client may have queued before it is treated as gone
const CLIENT_BUFFER: usize = 32;

/// Metadata pushed after each clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlaybackEvent {
    NewSpeech { prompt: String, text: String },
}

/// Frame pushed to a playback client
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackMessage {
    Audio(Bytes),
    Event(String),
}

/// A registered playback client
pub trait PlaybackClient: Send + Sync {
    /// Queue a message for this client. An error means the client is gone.
    fn send(&self, message: PlaybackMessage) -> Result<()>;
}

/// Client backed by a websocket writer task
struct SocketClient {
    outbound: mpsc::Sender<PlaybackMessage>,
}

impl PlaybackClient for SocketClient {
    fn send(&self, message: PlaybackMessage) -> Result<()> {
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                PipelineError::Io(std::io::ErrorKind::WouldBlock.into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                PipelineError::Io(std::io::ErrorKind::BrokenPipe.into())
            }
        })
    }
}

/// Dynamic set of playback clients
pub struct PlaybackBroadcaster {
    registry: ConnectionRegistry<Arc<dyn PlaybackClient>>,
    shutdown: Shutdown,
}

impl PlaybackBroadcaster {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            registry: ConnectionRegistry::unbounded("Playback"),
            shutdown,
        }
    }

    pub fn register(&self, client: Arc<dyn PlaybackClient>) -> Result<ConnectionId> {
        self.registry.register(client)
    }

    pub fn unregister(&self, connection_id: &ConnectionId) {
        self.registry.unregister(connection_id);
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Send raw audio to every client, returning how many accepted it
    pub fn broadcast_audio(&self, audio: Bytes) -> usize {
        self.broadcast(PlaybackMessage::Audio(audio))
    }

    /// Send a JSON event to every client, returning how many accepted it
    pub fn broadcast_event(&self, event: &PlaybackEvent) -> Result<usize> {
        let json = serde_json::to_string(event)?;
        Ok(self.broadcast(PlaybackMessage::Event(json)))
    }

    /// Clients whose send fails are removed; the rest still receive the message.
    pub fn broadcast(&self, message: PlaybackMessage) -> usize {
        let clients = self.registry.snapshot();
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (connection_id, client) in clients {
            match client.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Failed to send to playback client {}: {}", connection_id, e);
                    dead.push(connection_id);
                }
            }
        }

        for connection_id in dead {
            self.registry.unregister(&connection_id);
        }

        delivered
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(playback_handler))
            .with_state(self)
    }
}

async fn playback_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<Arc<PlaybackBroadcaster>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_playback_socket(socket, broadcaster))
}

async fn handle_playback_socket(socket: WebSocket, broadcaster: Arc<PlaybackBroadcaster>) {
    let (tx, mut rx) = mpsc::channel::<PlaybackMessage>(CLIENT_BUFFER);
    let connection_id = match broadcaster.register(Arc::new(SocketClient { outbound: tx })) {
        Ok(id) => id,
        Err(e) => {
            warn!("Playback connection rejected: {}", e);
            return;
        }
    };
    info!("📺 Playback client connected: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();

    let id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let frame = match message {
                PlaybackMessage::Audio(bytes) => Message::Binary(bytes.to_vec()),
                PlaybackMessage::Event(json) => Message::Text(json),
            };
            if let Err(e) = sender.send(frame).await {
                warn!("Failed to send to playback client {}: {}", id_for_send, e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Clients never talk back; read only to notice disconnects
    let id_for_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => debug!("Ignoring frame from playback client {}", id_for_recv),
                Err(e) => {
                    debug!("Playback client {} errored: {}", id_for_recv, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut recv_task => {}
        _ = broadcaster.shutdown.wait() => {
            debug!("Closing playback client {} on shutdown", connection_id);
        }
    }

    broadcaster.unregister(&connection_id);
    send_task.abort();
    recv_task.abort();
    info!("Playback client disconnected: {}", connection_id);
}

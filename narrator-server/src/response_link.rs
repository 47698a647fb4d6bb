// Response link
// Single-peer websocket used to ask the response generator for replies

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use narrator_core::{ConnectionId, ConnectionRegistry, PipelineError, Result, Shutdown};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Request frame sent to the attached peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub message: String,
    pub prompt_setting: String,
    pub person: String,
}

/// Reply frame expected back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkReply {
    pub response_text: String,
}

/// Whether a peer is currently attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Attached,
}

type PendingReply = Arc<Mutex<Option<oneshot::Sender<String>>>>;

/// Handle to the attached peer's socket tasks
#[derive(Clone)]
struct LinkPeer {
    outbound: mpsc::UnboundedSender<String>,
    pending: PendingReply,
}

/// Holds at most one peer and forwards one call at a time to it
pub struct ResponseLink {
    registry: ConnectionRegistry<LinkPeer>,
    prompt_setting: String,
    call_lock: tokio::sync::Mutex<()>,
    shutdown: Shutdown,
}

impl ResponseLink {
    pub fn new(prompt_setting: impl Into<String>, shutdown: Shutdown) -> Self {
        Self {
            registry: ConnectionRegistry::bounded("Response link", 1),
            prompt_setting: prompt_setting.into(),
            call_lock: tokio::sync::Mutex::new(()),
            shutdown,
        }
    }

    pub fn state(&self) -> LinkState {
        if self.registry.is_empty() {
            LinkState::Idle
        } else {
            LinkState::Attached
        }
    }

    /// Ask the attached peer for a reply to `user_message`.
    ///
    /// Fails with `NotConnected` when idle and `LinkClosed` when the peer goes
    /// away before replying.
    pub async fn call(&self, user_message: &str, user_name: Option<&str>) -> Result<String> {
        let _in_flight = self.call_lock.lock().await;

        let (connection_id, peer) = self.registry.first().ok_or(PipelineError::NotConnected)?;

        let request = LinkRequest {
            message: user_message.to_string(),
            prompt_setting: self.prompt_setting.clone(),
            person: user_name.unwrap_or("anonymous").to_string(),
        };
        let payload = serde_json::to_string(&request)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        *peer.pending.lock() = Some(reply_tx);

        if peer.outbound.send(payload).is_err() {
            peer.pending.lock().take();
            return Err(PipelineError::LinkClosed);
        }
        debug!("Sent request to response peer {}", connection_id);

        let raw = reply_rx.await.map_err(|_| PipelineError::LinkClosed)?;
        let reply: LinkReply = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::MalformedReply(format!("{}: {}", e, raw)))?;
        Ok(reply.response_text)
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(link_handler))
            .with_state(self)
    }
}

async fn link_handler(ws: WebSocketUpgrade, State(link): State<Arc<ResponseLink>>) -> Response {
    ws.on_upgrade(move |socket| handle_link_socket(socket, link))
}

async fn handle_link_socket(socket: WebSocket, link: Arc<ResponseLink>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let pending: PendingReply = Arc::new(Mutex::new(None));
    let peer = LinkPeer {
        outbound: tx,
        pending: pending.clone(),
    };

    let (mut sender, mut receiver) = socket.split();

    let connection_id = match link.registry.register(peer) {
        Ok(id) => id,
        Err(e) => {
            warn!("Response link connection rejected: {}", e);
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    info!("🔗 Response peer attached: {}", connection_id);

    let id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = sender.send(Message::Text(payload)).await {
                warn!("Failed to send request to response peer {}: {}", id_for_send, e);
                break;
            }
        }
        let _ = sender.close().await;
    });

    let id_for_recv = connection_id.clone();
    let pending_for_recv = pending.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => deliver_reply(&id_for_recv, &pending_for_recv, text),
                Ok(Message::Binary(_)) => {
                    warn!("Received binary frame from response peer {}, ignoring", id_for_recv);
                }
                Ok(Message::Close(_)) => {
                    debug!("Response peer {} closed the connection", id_for_recv);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Response link error from {}: {}", id_for_recv, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!("Send task completed for response peer {}", connection_id);
        }
        _ = &mut recv_task => {
            debug!("Receive task completed for response peer {}", connection_id);
        }
        _ = link.shutdown.wait() => {
            debug!("Closing response peer {} on shutdown", connection_id);
        }
    }

    detach(&link, &connection_id, &pending, send_task, recv_task);
}

fn deliver_reply(connection_id: &ConnectionId, pending: &PendingReply, text: String) {
    match pending.lock().take() {
        Some(reply_tx) => {
            if reply_tx.send(text).is_err() {
                debug!("Caller for response peer {} went away", connection_id);
            }
        }
        None => warn!(
            "Unsolicited reply from response peer {}, dropping: {}",
            connection_id, text
        ),
    }
}

/// Tear down a peer. The registry slot is freed, then the pending reply is
/// dropped so an in-flight call fails with `LinkClosed`. One of the tasks may
/// already have finished, so neither handle is awaited again.
fn detach(
    link: &ResponseLink,
    connection_id: &ConnectionId,
    pending: &PendingReply,
    send_task: tokio::task::JoinHandle<()>,
    recv_task: tokio::task::JoinHandle<()>,
) {
    link.registry.unregister(connection_id);
    if pending.lock().take().is_some() {
        warn!("Response peer {} left with a call in flight", connection_id);
    }
    send_task.abort();
    recv_task.abort();
    info!("Response peer detached: {}", connection_id);
}

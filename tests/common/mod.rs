// Shared helpers for the integration tests
#![allow(dead_code)]

use axum::{extract::State, routing::post, Form, Router};
use futures_util::{SinkExt, StreamExt};
use narrator_server::{LinkReply, LinkRequest, LinkState, ResponseLink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Mono 16-bit silent WAV
pub fn wav_bytes(sample_rate: u32, frames: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Synthesis service that answers every request with a fixed body
pub struct FakeTts {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl FakeTts {
    pub fn endpoint(&self) -> String {
        format!("http://{}/synthesize", self.addr)
    }
}

#[derive(Clone)]
struct FakeTtsState {
    body: Arc<Vec<u8>>,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn synthesize(
    State(state): State<FakeTtsState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Vec<u8> {
    state.requests.lock().push(fields);
    state.body.as_ref().clone()
}

pub async fn spawn_fake_tts(body: Vec<u8>) -> FakeTts {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = FakeTtsState {
        body: Arc::new(body),
        requests: requests.clone(),
    };
    let router = Router::new()
        .route("/synthesize", post(synthesize))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    FakeTts { addr, requests }
}

/// Serve a standalone response link on an ephemeral port
pub async fn serve_link(link: Arc<ResponseLink>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = link.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub async fn connect(addr: SocketAddr) -> Client {
    let (socket, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    socket
}

/// Response peer that answers `hi <person>` to every request and records them
pub fn spawn_greeting_peer(mut socket: Client) -> Arc<Mutex<Vec<LinkRequest>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    tokio::spawn(async move {
        while let Some(Ok(frame)) = socket.next().await {
            let Message::Text(text) = frame else { continue };
            let request: LinkRequest = serde_json::from_str(&text).unwrap();
            let reply = LinkReply {
                response_text: format!("hi {}", request.person),
            };
            recorded.lock().push(request);
            let payload = serde_json::to_string(&reply).unwrap();
            if socket.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });
    seen
}

/// Poll `condition` until it holds or a few seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

pub async fn wait_attached(link: &ResponseLink) {
    wait_until(|| link.state() == LinkState::Attached).await;
}

/// Next data frame from a client, skipping control frames
pub async fn next_frame(client: &mut Client, timeout: Duration) -> Option<Message> {
    tokio::time::timeout(timeout, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(frame)) => return Some(frame),
                _ => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

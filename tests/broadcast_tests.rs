// Playback broadcaster over real websocket clients

mod common;

use bytes::Bytes;
use common::*;
use futures_util::SinkExt;
use narrator_core::Shutdown;
use narrator_server::{PlaybackBroadcaster, PlaybackEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

async fn serve_playback(broadcaster: Arc<PlaybackBroadcaster>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = broadcaster.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_departed_client_does_not_block_the_rest() {
    let broadcaster = Arc::new(PlaybackBroadcaster::new(Shutdown::new()));
    let addr = serve_playback(broadcaster.clone()).await;

    let mut clients = Vec::new();
    for _ in 0..4 {
        clients.push(connect(addr).await);
    }
    wait_until(|| broadcaster.client_count() == 4).await;

    let mut departed = clients.remove(1);
    departed.close(None).await.unwrap();
    drop(departed);

    broadcaster.broadcast_audio(Bytes::from_static(b"RIFF-clip"));
    broadcaster
        .broadcast_event(&PlaybackEvent::NewSpeech {
            prompt: "hello".to_string(),
            text: "hi alice".to_string(),
        })
        .unwrap();

    for client in clients.iter_mut() {
        let audio = next_frame(client, Duration::from_secs(5)).await;
        assert_eq!(audio, Some(Message::Binary(b"RIFF-clip".to_vec())));
        let event = next_frame(client, Duration::from_secs(5)).await;
        assert!(matches!(
            event,
            Some(Message::Text(json)) if json.contains("\"type\":\"NewSpeech\"")
        ));
    }

    wait_until(|| broadcaster.client_count() == 3).await;
}

#[tokio::test]
async fn test_shutdown_disconnects_clients() {
    let shutdown = Shutdown::new();
    let broadcaster = Arc::new(PlaybackBroadcaster::new(shutdown.clone()));
    let addr = serve_playback(broadcaster.clone()).await;

    let mut client = connect(addr).await;
    wait_until(|| broadcaster.client_count() == 1).await;

    shutdown.trigger();
    wait_until(|| broadcaster.client_count() == 0).await;
    let frame = next_frame(&mut client, Duration::from_secs(5)).await;
    assert!(frame.map_or(true, |frame| frame.is_close()));
}

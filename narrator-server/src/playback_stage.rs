//! Playback stage: broadcasts each clip and paces utterances

use crate::playback::{PlaybackBroadcaster, PlaybackEvent};
use narrator_core::{
    PipelineError, PipelineStats, PlaybackConfig, Shutdown, StageError, StageReceiver, WorkItem,
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Uniform random pause between utterances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cooldown {
    min: Duration,
    max: Duration,
}

impl Cooldown {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn fixed(duration: Duration) -> Self {
        Self::new(duration, duration)
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        let (min, max) = config.cooldown_range();
        Self::new(min, max)
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

pub struct PlaybackStage {
    input: StageReceiver,
    broadcaster: Arc<PlaybackBroadcaster>,
    cooldown: Cooldown,
    stats: Arc<PipelineStats>,
    shutdown: Shutdown,
}

impl PlaybackStage {
    pub fn new(
        input: StageReceiver,
        broadcaster: Arc<PlaybackBroadcaster>,
        cooldown: Cooldown,
        stats: Arc<PipelineStats>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            input,
            broadcaster,
            cooldown,
            stats,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<(), StageError> {
        info!("📢 Playback stage started");
        loop {
            match self.step().await {
                Ok(()) => {}
                Err(StageError::Recoverable(e)) => {
                    warn!("Playback failed: {}", e);
                    self.stats.record_failure();
                }
                Err(StageError::Shutdown) => {
                    info!("Playback stage stopping");
                    return Err(StageError::Shutdown);
                }
                Err(StageError::Fatal(e)) => {
                    error!("Playback stage failed: {}", e);
                    return Err(StageError::Fatal(e));
                }
            }
        }
    }

    /// Play one item: audio, then its event, then wait out the clip and the cooldown
    pub async fn step(&mut self) -> Result<(), StageError> {
        let item = self.shutdown.guard(self.input.next()).await??;
        let duration = self.present(&item)?;

        self.shutdown.guard(tokio::time::sleep(duration)).await?;
        self.shutdown
            .guard(tokio::time::sleep(self.cooldown.sample()))
            .await?;
        self.stats.record_played();
        Ok(())
    }

    fn present(&self, item: &WorkItem) -> Result<Duration, PipelineError> {
        let text = item
            .response_text
            .as_deref()
            .ok_or(PipelineError::IncompleteItem("response text"))?;
        let audio = item
            .audio
            .as_ref()
            .ok_or(PipelineError::IncompleteItem("audio"))?;

        let bytes = audio.encode()?;
        let duration = audio.duration();

        let clients = self.broadcaster.broadcast_audio(bytes);
        self.broadcaster.broadcast_event(&PlaybackEvent::NewSpeech {
            prompt: item.user_message().to_string(),
            text: text.to_string(),
        })?;

        info!(
            "Playing {:.2}s to {} client(s). Prompt: {:?} Response: {:?}",
            duration.as_secs_f64(),
            clients,
            item.user_message(),
            text
        );
        Ok(duration)
    }
}

#[cfg(test)]
mod playback_stage_tests {
    use super::*;
    use crate::playback::{PlaybackClient, PlaybackMessage};
    use bytes::Bytes;
    use narrator_core::{stage_queue, AudioArtifact, StageSender};
    use parking_lot::Mutex;
    use tokio::time::Instant;

    #[derive(Debug)]
    struct Clip(Duration);

    impl AudioArtifact for Clip {
        fn encode(&self) -> narrator_core::Result<Bytes> {
            Ok(Bytes::from_static(b"clip"))
        }

        fn duration(&self) -> Duration {
            self.0
        }
    }

    #[derive(Debug)]
    struct BrokenClip;

    impl AudioArtifact for BrokenClip {
        fn encode(&self) -> narrator_core::Result<Bytes> {
            Err(PipelineError::Audio("cannot encode".to_string()))
        }

        fn duration(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    #[derive(Default)]
    struct TimedClient {
        received: Mutex<Vec<(Instant, PlaybackMessage)>>,
    }

    impl PlaybackClient for TimedClient {
        fn send(&self, message: PlaybackMessage) -> narrator_core::Result<()> {
            self.received.lock().push((Instant::now(), message));
            Ok(())
        }
    }

    fn ready(prompt: &str, audio: Box<dyn AudioArtifact>) -> WorkItem {
        let mut item = WorkItem::new(prompt, None);
        item.response_text = Some(format!("re: {}", prompt));
        item.audio = Some(audio);
        item
    }

    fn setup(cooldown: Cooldown) -> (PlaybackStage, StageSender, Arc<TimedClient>, Shutdown) {
        let shutdown = Shutdown::new();
        let broadcaster = Arc::new(PlaybackBroadcaster::new(shutdown.clone()));
        let client = Arc::new(TimedClient::default());
        broadcaster.register(client.clone()).unwrap();
        let (sender, receiver) = stage_queue("playback", 5);
        let stage = PlaybackStage::new(
            receiver,
            broadcaster,
            cooldown,
            Arc::new(PipelineStats::new()),
            shutdown.clone(),
        );
        (stage, sender, client, shutdown)
    }

    #[test]
    fn test_cooldown_sample_in_range() {
        let cooldown = Cooldown::new(Duration::from_millis(3500), Duration::from_millis(2500));
        for _ in 0..100 {
            let sample = cooldown.sample();
            assert!(sample >= Duration::from_millis(2500));
            assert!(sample <= Duration::from_millis(3500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_clip_and_cooldown() {
        let (stage, sender, client, shutdown) = setup(Cooldown::fixed(Duration::from_millis(500)));
        sender.offer(ready("first", Box::new(Clip(Duration::from_secs(2))))).unwrap();
        sender.offer(ready("second", Box::new(Clip(Duration::from_secs(2))))).unwrap();

        let task = tokio::spawn(stage.run());
        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.trigger();
        let _ = task.await;

        let received = client.received.lock();
        assert_eq!(received.len(), 4);
        let gap = received[2].0 - received[0].0;
        assert!(gap >= Duration::from_millis(2500), "gap was {:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_follows_audio() {
        let (mut stage, sender, client, _shutdown) = setup(Cooldown::fixed(Duration::ZERO));
        sender.offer(ready("hello", Box::new(Clip(Duration::from_millis(100))))).unwrap();

        stage.step().await.unwrap();

        let received = client.received.lock();
        assert_eq!(received[0].1, PlaybackMessage::Audio(Bytes::from_static(b"clip")));
        let PlaybackMessage::Event(json) = &received[1].1 else {
            panic!("expected event, got {:?}", received[1].1);
        };
        let event: PlaybackEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            PlaybackEvent::NewSpeech {
                prompt: "hello".to_string(),
                text: "re: hello".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_item_does_not_halt_stage() {
        let (stage, sender, client, shutdown) = setup(Cooldown::fixed(Duration::ZERO));
        sender.offer(ready("broken", Box::new(BrokenClip))).unwrap();
        sender.offer(WorkItem::new("no audio", None)).unwrap();
        sender.offer(ready("fine", Box::new(Clip(Duration::from_millis(100))))).unwrap();

        let task = tokio::spawn(stage.run());
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.trigger();
        let result = task.await.unwrap();

        assert!(matches!(result, Err(StageError::Shutdown)));
        assert_eq!(client.received.lock().len(), 2);
    }
}

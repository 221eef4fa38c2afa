use crate::backends::{StreamingTts, SynthesisParams, SynthesisRequest};
use crate::error::PlaybackError;
use crate::events::{Event, EventBus};
use crate::registry::{Playable, PlaybackRegistry, Registration};
use crate::segment::{is_blank, SegmentId};
use crate::sink::SharedSink;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    Idle,
    Connecting,
    Reading,
    Error,
}

/// What a controller speaks when its capability is invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub text: String,
    pub voice: String,
}

/// Everything the controllers of one program share.
#[derive(Clone)]
pub struct PlayerContext {
    pub backend: Arc<dyn StreamingTts>,
    pub sink: SharedSink,
    pub params: SynthesisParams,
    pub events: EventBus,
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct InFlight {
    // Taken by `stop`; the slot itself stays occupied until `start` returns.
    stop: Option<oneshot::Sender<()>>,
}

struct PlayerInner {
    id: SegmentId,
    ctx: PlayerContext,
    script: Mutex<Script>,
    state: Mutex<PlayerState>,
    in_flight: Mutex<Option<InFlight>>,
}

impl PlayerInner {
    fn transition(&self, state: PlayerState, error: Option<String>) {
        *lock(&self.state) = state;
        match &error {
            Some(e) => warn!(segment = %self.id, ?state, error = %e, "player state"),
            None => debug!(segment = %self.id, ?state, "player state"),
        }
        self.ctx.events.publish(Event::Player {
            id: self.id.clone(),
            state,
            error,
        });
    }

    async fn start(
        &self,
        text: &str,
        voice: &str,
        params: &SynthesisParams,
    ) -> Result<(), PlaybackError> {
        if is_blank(text) {
            debug!(segment = %self.id, "nothing to say");
            return Ok(());
        }

        let mut stop_rx = {
            let mut slot = lock(&self.in_flight);
            if slot.is_some() {
                return Err(PlaybackError::Busy);
            }
            let (tx, rx) = oneshot::channel();
            *slot = Some(InFlight { stop: Some(tx) });
            rx
        };

        let request = SynthesisRequest {
            text: text.to_string(),
            voice: voice.to_string(),
            params: params.clone(),
        };
        let result = self.stream(&request, &mut stop_rx).await;
        *lock(&self.in_flight) = None;

        match &result {
            Ok(()) => self.transition(PlayerState::Idle, None),
            Err(e) => self.transition(PlayerState::Error, Some(e.to_string())),
        }
        result
    }

    async fn stream(
        &self,
        request: &SynthesisRequest,
        stop_rx: &mut oneshot::Receiver<()>,
    ) -> Result<(), PlaybackError> {
        self.transition(PlayerState::Connecting, None);

        let mut audio = tokio::select! {
            opened = self.ctx.backend.open(request) => opened?,
            _ = &mut *stop_rx => {
                info!(segment = %self.id, "stopped while connecting");
                return Ok(());
            }
        };

        let mut reading = false;
        loop {
            tokio::select! {
                chunk = audio.next() => match chunk {
                    Some(Ok(pcm)) => {
                        if !reading {
                            reading = true;
                            self.transition(PlayerState::Reading, None);
                        }
                        lock(&*self.ctx.sink).write(&pcm)?;
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
                _ = &mut *stop_rx => {
                    info!(segment = %self.id, "stopped while reading");
                    return Ok(());
                }
            }
        }

        lock(&*self.ctx.sink).flush()
    }

    fn stop(&self) {
        let stop = lock(&self.in_flight)
            .as_mut()
            .and_then(|in_flight| in_flight.stop.take());
        if let Some(tx) = stop {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl Playable for PlayerInner {
    async fn play(&self) -> Result<(), PlaybackError> {
        let script = lock(&self.script).clone();
        self.start(&script.text, &script.voice, &self.ctx.params).await
    }

    fn stop(&self) {
        PlayerInner::stop(self)
    }
}

/// Single-segment playback controller.
///
/// Registers its play capability on construction; dropping it stops any
/// in-flight stream and unregisters.
pub struct SegmentPlayer {
    inner: Arc<PlayerInner>,
    _registration: Registration,
}

impl SegmentPlayer {
    pub fn new(
        id: SegmentId,
        script: Script,
        ctx: PlayerContext,
        registry: &PlaybackRegistry,
    ) -> Self {
        let inner = Arc::new(PlayerInner {
            id: id.clone(),
            ctx,
            script: Mutex::new(script),
            state: Mutex::new(PlayerState::Idle),
            in_flight: Mutex::new(None),
        });
        let capability: Arc<dyn Playable> = inner.clone();
        let registration = registry.register(id, &capability);
        Self {
            inner,
            _registration: registration,
        }
    }

    pub fn id(&self) -> &SegmentId {
        &self.inner.id
    }

    pub fn state(&self) -> PlayerState {
        *lock(&self.inner.state)
    }

    pub fn script(&self) -> Script {
        lock(&self.inner.script).clone()
    }

    pub fn set_script(&self, text: impl Into<String>, voice: impl Into<String>) {
        *lock(&self.inner.script) = Script {
            text: text.into(),
            voice: voice.into(),
        };
    }

    /// Render `text` with `voice`. Blank text is a no-op; a second start while
    /// one is in flight fails with [`PlaybackError::Busy`].
    pub async fn start(
        &self,
        text: &str,
        voice: &str,
        params: &SynthesisParams,
    ) -> Result<(), PlaybackError> {
        self.inner.start(text, voice, params).await
    }

    pub async fn play(&self) -> Result<(), PlaybackError> {
        Playable::play(self.inner.as_ref()).await
    }

    pub fn stop(&self) {
        self.inner.stop();
    }
}

impl Drop for SegmentPlayer {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::AudioStream;
    use crate::sink::{self, NullSink};
    use crate::voices::Voice;
    use futures_util::stream;
    use std::time::Duration;
    use tokio::sync::broadcast;

    enum Behavior {
        Chunks(Vec<Vec<u8>>),
        FailOpen,
        FailMidway,
        Hang,
    }

    struct FakeTts(Behavior);

    #[async_trait]
    impl StreamingTts for FakeTts {
        fn id(&self) -> &'static str {
            "fake"
        }

        fn sample_rate(&self) -> u32 {
            24000
        }

        async fn open(&self, _request: &SynthesisRequest) -> Result<AudioStream, PlaybackError> {
            match &self.0 {
                Behavior::Chunks(chunks) => {
                    Ok(stream::iter(chunks.clone().into_iter().map(Ok)).boxed())
                }
                Behavior::FailOpen => Err(PlaybackError::Connection("refused".into())),
                Behavior::FailMidway => Ok(stream::iter(vec![
                    Ok(vec![0, 0]),
                    Err(PlaybackError::Stream("decode".into())),
                ])
                .boxed()),
                Behavior::Hang => Ok(stream::pending().boxed()),
            }
        }

        async fn list_voices(&self) -> Result<Vec<Voice>, PlaybackError> {
            Ok(Vec::new())
        }
    }

    fn player(script: Behavior) -> (SegmentPlayer, PlaybackRegistry, broadcast::Receiver<Event>, SharedSink) {
        let events = EventBus::new();
        let rx = events.subscribe();
        let sink = sink::shared(NullSink::default());
        let ctx = PlayerContext {
            backend: Arc::new(FakeTts(script)),
            sink: sink.clone(),
            params: SynthesisParams::default(),
            events,
        };
        let registry = PlaybackRegistry::new();
        let p = SegmentPlayer::new(
            SegmentId::from("seg"),
            Script {
                text: "Hello".into(),
                voice: "en-Emma_woman".into(),
            },
            ctx,
            &registry,
        );
        (p, registry, rx, sink)
    }

    fn states(rx: &mut broadcast::Receiver<Event>) -> Vec<PlayerState> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let Event::Player { state, .. } = ev {
                out.push(state);
            }
        }
        out
    }

    #[tokio::test]
    async fn natural_completion_walks_the_state_machine() {
        let (p, _reg, mut rx, _sink) = player(Behavior::Chunks(vec![vec![1, 0], vec![2, 0]]));
        p.play().await.unwrap();
        assert_eq!(
            states(&mut rx),
            vec![PlayerState::Connecting, PlayerState::Reading, PlayerState::Idle]
        );
        assert_eq!(p.state(), PlayerState::Idle);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_transitions() {
        let (p, _reg, mut rx, _sink) = player(Behavior::Chunks(vec![vec![1, 0]]));
        p.start("   ", "en-Emma_woman", &SynthesisParams::default())
            .await
            .unwrap();
        assert!(states(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn connection_failure_ends_in_error() {
        let (p, _reg, mut rx, _sink) = player(Behavior::FailOpen);
        let err = p.play().await.unwrap_err();
        assert_eq!(err, PlaybackError::Connection("refused".into()));
        assert_eq!(states(&mut rx), vec![PlayerState::Connecting, PlayerState::Error]);
        assert_eq!(p.state(), PlayerState::Error);
    }

    #[tokio::test]
    async fn stream_failure_after_audio_ends_in_error() {
        let (p, _reg, mut rx, _sink) = player(Behavior::FailMidway);
        assert!(p.play().await.is_err());
        assert_eq!(
            states(&mut rx),
            vec![PlayerState::Connecting, PlayerState::Reading, PlayerState::Error]
        );
    }

    #[tokio::test]
    async fn stop_unblocks_a_hung_stream() {
        let (p, registry, _rx, _sink) = player(Behavior::Hang);
        let capability = registry.lookup(p.id()).unwrap();
        let pending = tokio::spawn(async move { capability.play().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(p.state(), PlayerState::Connecting);
        p.stop();

        let outcome = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("start never settled")
            .unwrap();
        assert!(outcome.is_ok());
        assert_eq!(p.state(), PlayerState::Idle);

        // idempotent while idle
        p.stop();
    }

    #[tokio::test]
    async fn second_start_is_busy() {
        let (p, registry, _rx, _sink) = player(Behavior::Hang);
        let capability = registry.lookup(p.id()).unwrap();
        let first = tokio::spawn(async move { capability.play().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(p.play().await, Err(PlaybackError::Busy));
        p.stop();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dropping_the_player_unregisters() {
        let (p, registry, _rx, _sink) = player(Behavior::Chunks(vec![]));
        let id = p.id().clone();
        assert!(registry.contains(&id));
        drop(p);
        assert!(!registry.contains(&id));
    }

    #[tokio::test]
    async fn set_script_changes_what_play_renders() {
        let (p, _reg, _rx, _sink) = player(Behavior::Chunks(vec![vec![1, 0]]));
        p.set_script("", "en-Emma_woman");
        assert_eq!(p.script().text, "");
        // blank script: nothing to do
        p.play().await.unwrap();
        assert_eq!(p.state(), PlayerState::Idle);
    }
}

//! Program facade: keeps the segment store, the mounted controllers and the
//! playback registry in step, and drives runs over them.

use crate::backends::{StreamingTts, SynthesisParams};
use crate::document::{self, PodcastDocument};
use crate::error::{DocumentError, PlaybackError, RunError};
use crate::events::{Event, EventBus};
use crate::orchestrator::{Orchestrator, RunReport};
use crate::player::{PlayerContext, PlayerState, Script, SegmentPlayer};
use crate::registry::PlaybackRegistry;
use crate::segment::{Segment, SegmentField, SegmentId, SegmentStore};
use crate::sink::SharedSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct Podcast {
    store: SegmentStore,
    registry: PlaybackRegistry,
    players: HashMap<SegmentId, SegmentPlayer>,
    orchestrator: Orchestrator,
    ctx: PlayerContext,
}

impl Podcast {
    pub fn new(
        backend: Arc<dyn StreamingTts>,
        sink: SharedSink,
        params: SynthesisParams,
        default_voice: &str,
    ) -> Self {
        let events = EventBus::new();
        let mut podcast = Self {
            store: SegmentStore::new(default_voice, events.clone()),
            registry: PlaybackRegistry::new(),
            players: HashMap::new(),
            orchestrator: Orchestrator::new(events.clone()),
            ctx: PlayerContext {
                backend,
                sink,
                params,
                events,
            },
        };
        podcast.remount();
        podcast
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.orchestrator = self.orchestrator.with_pacing(pacing);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        self.store.segments()
    }

    pub fn registry(&self) -> &PlaybackRegistry {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.ctx.events.subscribe()
    }

    pub fn player_state(&self, id: &SegmentId) -> Option<PlayerState> {
        self.players.get(id).map(SegmentPlayer::state)
    }

    fn mount(&mut self, segment: &Segment) {
        let player = SegmentPlayer::new(
            segment.id.clone(),
            Script {
                text: segment.text.clone(),
                voice: segment.voice.clone(),
            },
            self.ctx.clone(),
            &self.registry,
        );
        self.players.insert(segment.id.clone(), player);
    }

    /// Rebuild controllers so exactly the store's segments are mounted.
    fn remount(&mut self) {
        // Old controllers go first so their guards cannot race new registrations.
        self.players.clear();
        let segments = self.store.segments().to_vec();
        for segment in &segments {
            self.mount(segment);
        }
    }

    pub fn append(&mut self, voice: Option<&str>) -> SegmentId {
        let id = self.store.append(voice);
        if let Some(segment) = self.store.get(&id).cloned() {
            self.mount(&segment);
        }
        id
    }

    pub fn remove(&mut self, id: &SegmentId) -> bool {
        let removed = self.store.remove(id);
        if removed {
            self.players.remove(id);
        }
        removed
    }

    pub fn update(&mut self, id: &SegmentId, field: SegmentField, value: impl Into<String>) -> bool {
        if !self.store.update(id, field, value) {
            return false;
        }
        if let (Some(segment), Some(player)) = (self.store.get(id), self.players.get(id)) {
            player.set_script(segment.text.clone(), segment.voice.clone());
        }
        true
    }

    pub fn export(&self) -> PodcastDocument {
        PodcastDocument::export(self.store.segments())
    }

    /// Replace the whole program. On error the program is left untouched.
    pub fn import(&mut self, raw: &[u8]) -> Result<usize, DocumentError> {
        let segments = document::import(raw)?;
        let count = segments.len();
        self.store.replace_all(segments);
        self.remount();
        tracing::info!(count, "imported program");
        Ok(count)
    }

    /// Play one segment on its own; failures reach the caller.
    pub async fn play_segment(&self, id: &SegmentId) -> Result<(), PlaybackError> {
        match self.players.get(id) {
            Some(player) => player.play().await,
            None => Ok(()),
        }
    }

    pub fn stop_segment(&self, id: &SegmentId) {
        if let Some(player) = self.players.get(id) {
            player.stop();
        }
    }

    pub async fn play_all(&self) -> Result<RunReport, RunError> {
        let segments = self.store.segments().to_vec();
        self.orchestrator.run(&segments, &self.registry).await
    }

    pub fn controls(&self) -> PlaybackControls {
        PlaybackControls {
            orchestrator: self.orchestrator.clone(),
            registry: self.registry.clone(),
        }
    }
}

/// Clonable handle for stopping a run from another task.
#[derive(Clone)]
pub struct PlaybackControls {
    orchestrator: Orchestrator,
    registry: PlaybackRegistry,
}

impl PlaybackControls {
    /// Stop before the next segment; the current one plays out.
    pub fn cancel(&self) -> bool {
        self.orchestrator.cancel()
    }

    /// Cancel the run and cut the in-flight segment short.
    pub fn interrupt(&self) -> bool {
        let cancelled = self.orchestrator.cancel();
        if let Some(capability) = self
            .orchestrator
            .current_segment()
            .and_then(|id| self.registry.lookup(&id))
        {
            capability.stop();
        }
        cancelled
    }

    pub fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.orchestrator.current_index()
    }
}

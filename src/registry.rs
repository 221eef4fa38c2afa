//! Live map from segment id to the "play" capability of whichever controller
//! currently represents that segment.
//!
//! The registry only holds weak references. A controller registers when it is
//! built and the returned [`Registration`] removes the entry when dropped, so an
//! entry can never outlive its owner.

use crate::error::PlaybackError;
use crate::segment::SegmentId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// "Render and play this segment now."
#[async_trait]
pub trait Playable: Send + Sync {
    /// Resolves when playback completes or is stopped, fails on stream errors.
    async fn play(&self) -> Result<(), PlaybackError>;

    /// Terminate an in-flight `play`. No-op when idle.
    fn stop(&self);
}

type Entries = HashMap<SegmentId, Weak<dyn Playable>>;

#[derive(Clone, Default)]
pub struct PlaybackRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store (or overwrite) the capability for `id`.
    pub fn register(&self, id: SegmentId, capability: &Arc<dyn Playable>) -> Registration {
        let weak = Arc::downgrade(capability);
        if self.entries().insert(id.clone(), weak.clone()).is_some() {
            tracing::debug!(segment = %id, "replaced playback registration");
        }
        Registration {
            registry: self.clone(),
            id,
            capability: weak,
        }
    }

    pub fn unregister(&self, id: &SegmentId) -> bool {
        self.entries().remove(id).is_some()
    }

    /// Remove the entry only if it still points at `capability`.
    fn unregister_if(&self, id: &SegmentId, capability: &Weak<dyn Playable>) {
        let mut entries = self.entries();
        if entries
            .get(id)
            .is_some_and(|current| Weak::ptr_eq(current, capability))
        {
            entries.remove(id);
        }
    }

    /// Absent (or already dropped) capabilities yield `None`.
    pub fn lookup(&self, id: &SegmentId) -> Option<Arc<dyn Playable>> {
        self.entries().get(id).and_then(Weak::upgrade)
    }

    pub fn contains(&self, id: &SegmentId) -> bool {
        self.lookup(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries().values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped registration; dropping it unregisters.
#[must_use = "dropping a Registration unregisters the capability immediately"]
pub struct Registration {
    registry: PlaybackRegistry,
    id: SegmentId,
    capability: Weak<dyn Playable>,
}

impl Registration {
    pub fn id(&self) -> &SegmentId {
        &self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister_if(&self.id, &self.capability);
    }
}

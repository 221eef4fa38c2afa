//! Sequential "play everything" runs.
//!
//! One run walks the program in order, invokes each segment's registered
//! capability and waits for it, then pauses before the next request so the
//! TTS service can release its resources. Cancellation is cooperative: it is
//! checked at the top of every iteration and before the pause, and an
//! in-flight segment is never interrupted by it.

use crate::error::{PlaybackError, RunError};
use crate::events::{Event, EventBus, RunProgress};
use crate::registry::PlaybackRegistry;
use crate::segment::{Segment, SegmentId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Gap between the end of one segment and the request for the next.
pub const PACING_INTERVAL: Duration = Duration::from_millis(500);

/// Cancellation state of a single run. The flag only ever goes false -> true.
#[derive(Default)]
pub struct RunState {
    cancelled: AtomicBool,
    wake: Notify,
}

impl RunState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.wake.notify_one();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of one run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunReport {
    /// Capability invoked and completed.
    pub played: Vec<SegmentId>,
    /// Capability invoked and failed; the run carried on.
    pub failed: Vec<(SegmentId, PlaybackError)>,
    /// Blank text, never looked up.
    pub skipped: Vec<SegmentId>,
    /// Non-blank but no capability registered.
    pub missing: Vec<SegmentId>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn invoked(&self) -> usize {
        self.played.len() + self.failed.len()
    }

    /// Tells an empty program apart from one cancelled before anything played.
    pub fn invoked_any(&self) -> bool {
        self.invoked() > 0
    }
}

#[derive(Default)]
struct Shared {
    active: Mutex<Option<Arc<RunState>>>,
    cursor: Mutex<Option<(usize, SegmentId)>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets the run-level state when a run ends, including when its future is dropped.
struct ActiveRun<'a> {
    shared: &'a Shared,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        *lock(&self.shared.cursor) = None;
        *lock(&self.shared.active) = None;
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
    pacing: Duration,
    events: EventBus,
}

impl Orchestrator {
    pub fn new(events: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            pacing: PACING_INTERVAL,
            events,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn is_running(&self) -> bool {
        lock(&self.shared.active).is_some()
    }

    /// Position of the active segment, `None` when idle.
    pub fn current_index(&self) -> Option<usize> {
        lock(&self.shared.cursor).as_ref().map(|(i, _)| *i)
    }

    pub fn current_segment(&self) -> Option<SegmentId> {
        lock(&self.shared.cursor).as_ref().map(|(_, id)| id.clone())
    }

    /// Cancel the active run, if any. Returns whether a run was signalled.
    pub fn cancel(&self) -> bool {
        match lock(&self.shared.active).as_ref() {
            Some(state) => {
                info!("cancelling playback run");
                state.cancel();
                true
            }
            None => false,
        }
    }

    /// Play every segment in order. A second run while one is active is rejected.
    pub async fn run(
        &self,
        segments: &[Segment],
        registry: &PlaybackRegistry,
    ) -> Result<RunReport, RunError> {
        self.run_with(RunState::new(), segments, registry).await
    }

    /// Like [`run`](Self::run) with a caller-owned run state, which may
    /// already be cancelled.
    pub async fn run_with(
        &self,
        state: Arc<RunState>,
        segments: &[Segment],
        registry: &PlaybackRegistry,
    ) -> Result<RunReport, RunError> {
        {
            let mut active = lock(&self.shared.active);
            if active.is_some() {
                return Err(RunError::AlreadyRunning);
            }
            *active = Some(state.clone());
        }
        let guard = ActiveRun {
            shared: &self.shared,
        };

        info!(total = segments.len(), "playback run started");
        self.events.publish(Event::Run(RunProgress::Started {
            total: segments.len(),
        }));

        let mut report = RunReport::default();
        let last = segments.len().saturating_sub(1);

        for (index, segment) in segments.iter().enumerate() {
            if state.is_cancelled() {
                break;
            }
            if segment.is_blank() {
                debug!(index, segment = %segment.id, "skipping blank segment");
                report.skipped.push(segment.id.clone());
                continue;
            }

            *lock(&self.shared.cursor) = Some((index, segment.id.clone()));
            self.events.publish(Event::Run(RunProgress::Active {
                index,
                id: segment.id.clone(),
            }));

            match registry.lookup(&segment.id) {
                None => {
                    debug!(index, segment = %segment.id, "no playback registered, skipping");
                    report.missing.push(segment.id.clone());
                }
                Some(capability) => match capability.play().await {
                    Ok(()) => report.played.push(segment.id.clone()),
                    Err(e) => {
                        warn!(index, segment = %segment.id, error = %e, "segment failed, continuing");
                        self.events.publish(Event::Run(RunProgress::SegmentFailed {
                            index,
                            id: segment.id.clone(),
                            error: e.to_string(),
                        }));
                        report.failed.push((segment.id.clone(), e));
                    }
                },
            }

            if index < last && !state.is_cancelled() {
                tokio::select! {
                    _ = tokio::time::sleep(self.pacing) => {}
                    _ = state.wake.notified() => {}
                }
            }
        }

        report.cancelled = state.is_cancelled();
        drop(guard);

        info!(
            played = report.played.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "playback run finished"
        );
        self.events.publish(Event::Run(RunProgress::Finished {
            played: report.played.len(),
            failed: report.failed.len(),
            cancelled: report.cancelled,
        }));
        Ok(report)
    }
}

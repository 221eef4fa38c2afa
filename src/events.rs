//! Observation surface for a presentation layer.
//!
//! Store mutations, controller transitions and run progress are all published
//! on one broadcast channel. Nothing in the core waits on a subscriber.

use crate::player::PlayerState;
use crate::segment::{SegmentField, SegmentId};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StoreChange {
    Appended(SegmentId),
    Removed(SegmentId),
    Updated { id: SegmentId, field: SegmentField },
    Replaced { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunProgress {
    Started { total: usize },
    Active { index: usize, id: SegmentId },
    SegmentFailed { index: usize, id: SegmentId, error: String },
    Finished { played: usize, failed: usize, cancelled: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    Store(StoreChange),
    Player {
        id: SegmentId,
        state: PlayerState,
        error: Option<String>,
    },
    Run(RunProgress),
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: Event) {
        // No receivers is fine: nobody is watching.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(Event::Store(StoreChange::Replaced { count: 1 }));
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::Run(RunProgress::Started { total: 2 }));
        bus.publish(Event::Store(StoreChange::Replaced { count: 2 }));

        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Run(RunProgress::Started { total: 2 })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Store(StoreChange::Replaced { count: 2 })
        );
    }
}

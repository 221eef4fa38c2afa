use crate::events::{Event, EventBus, StoreChange};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque segment identity. Never reused within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SegmentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SegmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub text: String,
    pub voice: String,
}

impl Segment {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            id: SegmentId::generate(),
            text: text.into(),
            voice: voice.into(),
        }
    }

    /// Blank segments are skipped by a run and rejected by a controller.
    pub fn is_blank(&self) -> bool {
        is_blank(&self.text)
    }
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentField {
    Text,
    Voice,
}

/// Ordered program of segments. Always holds at least one segment.
pub struct SegmentStore {
    segments: Vec<Segment>,
    fallback_voice: String,
    events: EventBus,
}

impl SegmentStore {
    pub fn new(fallback_voice: impl Into<String>, events: EventBus) -> Self {
        let fallback_voice = fallback_voice.into();
        Self {
            segments: vec![Segment::new("", fallback_voice.clone())],
            fallback_voice,
            events,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| &s.id == id)
    }

    pub fn position(&self, id: &SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| &s.id == id)
    }

    /// Append an empty segment at the end and return its fresh id.
    pub fn append(&mut self, voice: Option<&str>) -> SegmentId {
        let voice = voice
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.fallback_voice)
            .to_string();
        let segment = Segment::new("", voice);
        let id = segment.id.clone();
        self.segments.push(segment);
        self.events.publish(Event::Store(StoreChange::Appended(id.clone())));
        id
    }

    /// Returns `false` when nothing was removed, including the refused
    /// removal of the last remaining segment.
    pub fn remove(&mut self, id: &SegmentId) -> bool {
        if self.segments.len() <= 1 {
            return false;
        }
        let Some(index) = self.position(id) else {
            return false;
        };
        self.segments.remove(index);
        self.events.publish(Event::Store(StoreChange::Removed(id.clone())));
        true
    }

    pub fn update(&mut self, id: &SegmentId, field: SegmentField, value: impl Into<String>) -> bool {
        let Some(segment) = self.segments.iter_mut().find(|s| &s.id == id) else {
            return false;
        };
        match field {
            SegmentField::Text => segment.text = value.into(),
            SegmentField::Voice => segment.voice = value.into(),
        }
        self.events.publish(Event::Store(StoreChange::Updated {
            id: id.clone(),
            field,
        }));
        true
    }

    /// Wholesale replacement used by import. An empty list leaves a single
    /// fresh segment behind so the store never drops to zero.
    pub fn replace_all(&mut self, segments: Vec<Segment>) {
        self.segments = segments;
        if self.segments.is_empty() {
            self.segments
                .push(Segment::new("", self.fallback_voice.clone()));
        }
        self.events.publish(Event::Store(StoreChange::Replaced {
            count: self.segments.len(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn store() -> SegmentStore {
        SegmentStore::new("en-Emma_woman", EventBus::new())
    }

    #[test]
    fn starts_with_one_blank_segment() {
        let s = store();
        assert_eq!(s.len(), 1);
        assert!(s.segments()[0].is_blank());
        assert_eq!(s.segments()[0].voice, "en-Emma_woman");
    }

    #[test]
    fn append_uses_given_voice_or_fallback() {
        let mut s = store();
        let a = s.append(Some("en-James_man"));
        let b = s.append(None);
        let c = s.append(Some(""));
        assert_eq!(s.get(&a).unwrap().voice, "en-James_man");
        assert_eq!(s.get(&b).unwrap().voice, "en-Emma_woman");
        assert_eq!(s.get(&c).unwrap().voice, "en-Emma_woman");
        assert_eq!(s.position(&c), Some(3));
    }

    #[test]
    fn removing_last_segment_is_refused() {
        let mut s = store();
        let only = s.segments()[0].id.clone();
        assert!(!s.remove(&only));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let mut s = store();
        assert!(!s.update(&SegmentId::from("missing"), SegmentField::Text, "x"));
        let id = s.segments()[0].id.clone();
        assert!(s.update(&id, SegmentField::Text, "Hello"));
        assert!(s.update(&id, SegmentField::Voice, "en-Carter_man"));
        assert_eq!(s.get(&id).unwrap().text, "Hello");
        assert_eq!(s.get(&id).unwrap().voice, "en-Carter_man");
    }

    #[test]
    fn blank_detection_covers_whitespace() {
        assert!(is_blank(""));
        assert!(is_blank("  \n\t"));
        assert!(!is_blank(" a "));
    }

    #[test]
    fn replace_all_with_nothing_keeps_one_segment() {
        let mut s = store();
        s.replace_all(Vec::new());
        assert_eq!(s.len(), 1);
    }

    #[tokio::test]
    async fn mutations_are_published() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut s = SegmentStore::new("en-Emma_woman", bus);
        let id = s.append(None);
        s.update(&id, SegmentField::Text, "hi");
        s.remove(&id);

        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Store(StoreChange::Appended(id.clone()))
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::Store(StoreChange::Updated {
                id: id.clone(),
                field: SegmentField::Text
            })
        );
        assert_eq!(rx.recv().await.unwrap(), Event::Store(StoreChange::Removed(id)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append,
        Remove(usize),
        Edit(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Append),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8).prop_map(Op::Edit),
        ]
    }

    proptest! {
        #[test]
        fn never_empty_and_ids_never_repeat(ops in proptest::collection::vec(op(), 0..64)) {
            let mut s = store();
            let mut seen: HashSet<SegmentId> = s.segments().iter().map(|x| x.id.clone()).collect();

            for op in ops {
                match op {
                    Op::Append => {
                        let id = s.append(None);
                        prop_assert!(seen.insert(id));
                    }
                    Op::Remove(i) => {
                        let id = s.segments()[i % s.len()].id.clone();
                        let before = s.len();
                        let removed = s.remove(&id);
                        prop_assert_eq!(removed, before > 1);
                    }
                    Op::Edit(i) => {
                        let id = s.segments()[i % s.len()].id.clone();
                        prop_assert!(s.update(&id, SegmentField::Text, "text"));
                    }
                }
                prop_assert!(s.len() >= 1);
                let unique: HashSet<_> = s.segments().iter().map(|x| &x.id).collect();
                prop_assert_eq!(unique.len(), s.len());
            }
        }
    }
}

//! voicecast - render an ordered program of text segments, each bound to its
//! own voice, through a streaming TTS service.

pub mod backends;
pub mod config_loader;
pub mod document;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod player;
pub mod podcast;
pub mod registry;
pub mod segment;
pub mod sink;
pub mod voices;

pub use backends::{StreamingTts, SynthesisParams, SynthesisRequest};
pub use document::PodcastDocument;
pub use error::{DocumentError, PlaybackError, RunError};
pub use events::{Event, EventBus};
pub use orchestrator::{Orchestrator, RunReport, RunState, PACING_INTERVAL};
pub use player::{PlayerState, SegmentPlayer};
pub use podcast::{PlaybackControls, Podcast};
pub use registry::{Playable, PlaybackRegistry, Registration};
pub use segment::{Segment, SegmentField, SegmentId, SegmentStore};

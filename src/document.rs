//! Versioned transport document for a program.
//!
//! ```json
//! { "segments": [{ "id": "...", "text": "...", "voice": "en-Emma_woman" }],
//!   "created_at": "2025-01-01T00:00:00Z", "version": "1.0.0" }
//! ```
//!
//! Import keeps unique ids as-is. Missing ids, and every repeat of an id
//! already seen in the same document, get a fresh one.

use crate::error::DocumentError;
use crate::segment::{Segment, SegmentId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

pub const DOCUMENT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct PodcastDocument {
    pub segments: Vec<Segment>,
    pub created_at: String,
    pub version: String,
}

impl PodcastDocument {
    pub fn export(segments: &[Segment]) -> Self {
        Self::export_at(segments, Utc::now())
    }

    pub fn export_at(segments: &[Segment], created_at: DateTime<Utc>) -> Self {
        Self {
            segments: segments.to_vec(),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            version: DOCUMENT_VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    voice: String,
}

/// Parse a document and return its segments, ready for `replace_all`.
pub fn import(raw: &[u8]) -> Result<Vec<Segment>, DocumentError> {
    let doc: Value = serde_json::from_slice(raw)?;

    let items = doc
        .get("segments")
        .ok_or_else(|| DocumentError::InvalidSchema("missing \"segments\"".to_string()))?
        .as_array()
        .ok_or_else(|| DocumentError::InvalidSchema("\"segments\" is not a list".to_string()))?;

    if items.is_empty() {
        return Err(DocumentError::InvalidSchema(
            "\"segments\" is empty".to_string(),
        ));
    }
    if let Some(version) = doc.get("version").and_then(Value::as_str) {
        if version != DOCUMENT_VERSION {
            tracing::debug!(version, "importing document with a different version");
        }
    }

    let mut seen = HashSet::new();
    let mut segments = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let raw = RawSegment::deserialize(item).map_err(|e| {
            DocumentError::InvalidSchema(format!("segment {}: {}", index, e))
        })?;

        let id = match raw.id {
            Some(RawId::Text(s)) if !s.trim().is_empty() => Some(SegmentId::from(s)),
            Some(RawId::Number(n)) => Some(SegmentId::from(n.to_string())),
            _ => None,
        }
        .filter(|id| !seen.contains(id))
        .unwrap_or_else(|| {
            tracing::debug!(index, "assigning fresh id to imported segment");
            SegmentId::generate()
        });
        seen.insert(id.clone());

        segments.push(Segment {
            id,
            text: raw.text,
            voice: raw.voice,
        });
    }
    Ok(segments)
}

pub fn load(path: &Path) -> Result<Vec<Segment>, DocumentError> {
    import(&std::fs::read(path)?)
}

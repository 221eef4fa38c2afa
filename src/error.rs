use thiserror::Error;

/// Failure while rendering a single segment through the TTS service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("could not connect to TTS service: {0}")]
    Connection(String),
    #[error("audio stream failed: {0}")]
    Stream(String),
    #[error("audio sink failed: {0}")]
    Sink(String),
    #[error("segment is already playing")]
    Busy,
}

/// Import-time failures. The store is never touched when one of these is returned.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is not well-formed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("document does not match the podcast schema: {0}")]
    InvalidSchema(String),
    #[error("document I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("a playback run is already in progress")]
    AlreadyRunning,
}

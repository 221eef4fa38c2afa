use super::{AudioStream, StreamingTts, SynthesisRequest};
use crate::config_loader::Settings;
use crate::error::PlaybackError;
use crate::voices::Voice;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;

/// Streaming TTS service reached over HTTP.
///
/// `GET {base}/stream?text=..&voice=..&cfg=..&steps=..` answers with a chunked
/// body of raw PCM; `GET {base}/config` lists the voices the server knows.
pub struct HttpStreamingTts {
    client: reqwest::Client,
    base_url: String,
    sample_rate: u32,
}

impl HttpStreamingTts {
    pub fn new(
        base_url: &str,
        sample_rate: u32,
        connect_timeout: Duration,
    ) -> Result<Self, PlaybackError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| PlaybackError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sample_rate,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, PlaybackError> {
        Self::new(
            &settings.tts_url,
            settings.sample_rate,
            Duration::from_secs(settings.connect_timeout_secs),
        )
    }
}

#[async_trait]
impl StreamingTts for HttpStreamingTts {
    fn id(&self) -> &'static str {
        "http-stream"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn open(&self, request: &SynthesisRequest) -> Result<AudioStream, PlaybackError> {
        let url = format!("{}/stream", self.base_url);
        tracing::debug!(%url, voice = %request.voice, "opening tts stream");

        let resp = self
            .client
            .get(&url)
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(|e| PlaybackError::Connection(e.to_string()))?
            .error_for_status()
            .map_err(|e| PlaybackError::Connection(e.to_string()))?;

        let stream = resp.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| PlaybackError::Stream(e.to_string()))
        });
        Ok(stream.boxed())
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, PlaybackError> {
        let url = format!("{}/config", self.base_url);
        let json: Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PlaybackError::Connection(e.to_string()))?
            .error_for_status()
            .map_err(|e| PlaybackError::Connection(e.to_string()))?
            .json()
            .await
            .map_err(|e| PlaybackError::Stream(format!("Failed to parse voice list: {}", e)))?;

        let voices = json
            .get("voices")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str())
                    .map(Voice::parse)
                    .collect()
            })
            .unwrap_or_default();
        Ok(voices)
    }
}

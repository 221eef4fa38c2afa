pub mod espeak;
pub mod http;

use crate::config_loader::Settings;
use crate::error::PlaybackError;
use crate::voices::Voice;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stream of raw 16-bit little-endian mono PCM chunks.
pub type AudioStream = BoxStream<'static, Result<Vec<u8>, PlaybackError>>;

/// Synthesis knobs forwarded untouched to the TTS service.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub cfg_scale: f32,
    pub inference_steps: u32,
    pub model: Option<String>,
    pub device: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            cfg_scale: 1.5,
            inference_steps: 5,
            model: None,
            device: None,
            extra: BTreeMap::new(),
        }
    }
}

impl SynthesisParams {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cfg_scale: settings.cfg_scale,
            inference_steps: settings.inference_steps,
            model: Some(settings.tts_model.clone()).filter(|m| !m.is_empty()),
            device: Some(settings.tts_device.clone()).filter(|d| !d.is_empty()),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub params: SynthesisParams,
}

impl SynthesisRequest {
    /// Flatten into query pairs: text, voice, cfg, steps, then the opaque extras.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("text".to_string(), self.text.clone()),
            ("voice".to_string(), self.voice.clone()),
            ("cfg".to_string(), self.params.cfg_scale.to_string()),
            ("steps".to_string(), self.params.inference_steps.to_string()),
        ];
        if let Some(model) = &self.params.model {
            pairs.push(("model".to_string(), model.clone()));
        }
        if let Some(device) = &self.params.device {
            pairs.push(("device".to_string(), device.clone()));
        }
        for (k, v) in &self.params.extra {
            pairs.push((k.clone(), v.clone()));
        }
        pairs
    }
}

/// Trait that all streaming speech backends must implement.
/// Dropping the returned stream must terminate the underlying request.
#[async_trait]
pub trait StreamingTts: Send + Sync {
    /// Returns the unique ID of the backend (e.g., "http-stream")
    fn id(&self) -> &'static str;

    /// Sample rate of the PCM the backend emits
    fn sample_rate(&self) -> u32;

    /// Open a streaming synthesis for one request
    async fn open(&self, request: &SynthesisRequest) -> Result<AudioStream, PlaybackError>;

    /// Voices the backend advertises, empty if it has no catalog
    async fn list_voices(&self) -> Result<Vec<Voice>, PlaybackError>;
}

/// Pick a backend according to `tts_backend`.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn StreamingTts>, PlaybackError> {
    match settings.tts_backend.as_str() {
        "espeak" => Ok(Arc::new(espeak::EspeakBackend::from_settings(settings))),
        "http" => Ok(Arc::new(http::HttpStreamingTts::from_settings(settings)?)),
        other => {
            tracing::warn!(backend = other, "unknown tts_backend, using http");
            Ok(Arc::new(http::HttpStreamingTts::from_settings(settings)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_carry_params_in_order() {
        let mut params = SynthesisParams {
            model: Some("m".into()),
            device: Some("cpu".into()),
            ..SynthesisParams::default()
        };
        params.extra.insert("seed".into(), "7".into());
        let req = SynthesisRequest {
            text: "Hello".into(),
            voice: "en-Emma_woman".into(),
            params,
        };
        let keys: Vec<_> = req.query_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["text", "voice", "cfg", "steps", "model", "device", "seed"]);
        assert_eq!(req.query_pairs()[2].1, "1.5");
    }

    #[test]
    fn params_from_settings_drop_empty_values() {
        let mut settings = Settings::default();
        settings.tts_device = String::new();
        let p = SynthesisParams::from_settings(&settings);
        assert_eq!(p.device, None);
        assert_eq!(p.inference_steps, settings.inference_steps);
    }
}

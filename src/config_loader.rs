use config::{Config, File};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::sync::RwLock;

const DEFAULT_VOICES: &[&str] = &[
    "en-Carter_man",
    "en-Davis_man",
    "en-Emma_woman",
    "en-Frank_man",
    "en-Grace_woman",
    "en-Mike_man",
    "in-Samuel_man",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    // TTS service
    pub tts_backend: String, // "http" or "espeak"
    pub tts_url: String,
    pub tts_model: String,
    pub tts_device: String, // "cuda", "cpu", "mps"
    pub cfg_scale: f32,
    pub inference_steps: u32,
    pub sample_rate: u32,
    pub connect_timeout_secs: u64,
    pub espeak_binary: String,
    // Program playback
    pub pacing_ms: u64,
    pub default_voice: String,
    pub voices: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tts_backend: "http".to_string(),
            tts_url: "http://127.0.0.1:3000".to_string(),
            tts_model: "microsoft/VibeVoice-Realtime-0.5B".to_string(),
            tts_device: "cuda".to_string(),
            cfg_scale: 1.5,
            inference_steps: 5,
            sample_rate: 24000,
            connect_timeout_secs: 10,
            espeak_binary: "espeak-ng".to_string(),
            pacing_ms: 500,
            default_voice: "en-Emma_woman".to_string(),
            voices: DEFAULT_VOICES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

lazy_static! {
    pub static ref SETTINGS: RwLock<Settings> =
        RwLock::new(Settings::new().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default settings");
            Settings::default()
        }));
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let user_config = dirs::config_dir()
            .map(|d| d.join("voicecast").join("Voicecast"))
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        let builder = Config::builder()
            .set_default("tts_backend", "http")?
            .set_default("tts_url", "http://127.0.0.1:3000")?
            .set_default("tts_model", "microsoft/VibeVoice-Realtime-0.5B")?
            .set_default("tts_device", "cuda")?
            .set_default("cfg_scale", 1.5)?
            .set_default("inference_steps", 5)?
            .set_default("sample_rate", 24000)?
            .set_default("connect_timeout_secs", 10)?
            .set_default("espeak_binary", "espeak-ng")?
            .set_default("pacing_ms", 500)?
            .set_default("default_voice", "en-Emma_woman")?
            .set_default(
                "voices",
                DEFAULT_VOICES.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
            )?
            // Local config file (if exists)
            .add_source(File::with_name("Voicecast").required(false))
            .add_source(File::with_name(&user_config).required(false))
            // Environment variables (e.g. VOICECAST_TTS_URL)
            .add_source(config::Environment::with_prefix("VOICECAST"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.cfg_scale <= 0.0 {
            return Err(config::ConfigError::Message(format!(
                "Invalid cfg_scale: {}. Must be positive",
                self.cfg_scale
            )));
        }
        if self.inference_steps == 0 {
            return Err(config::ConfigError::Message(
                "inference_steps must be greater than 0".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(config::ConfigError::Message(
                "sample_rate must be greater than 0".to_string(),
            ));
        }
        if self.default_voice.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "default_voice must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_load() {
        let settings = Settings::new().expect("Failed to load settings");
        assert!(settings.inference_steps > 0);
        assert!(!settings.voices.is_empty());
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        std::env::set_var("VOICECAST_PACING_MS", "250");
        let settings = Settings::new();
        std::env::remove_var("VOICECAST_PACING_MS");
        assert_eq!(settings.unwrap().pacing_ms, 250);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut s = Settings::default();
        assert!(s.validate().is_ok());
        s.cfg_scale = 0.0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.inference_steps = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.default_voice = "  ".to_string();
        assert!(s.validate().is_err());
    }
}

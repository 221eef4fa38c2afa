use super::{AudioStream, StreamingTts, SynthesisRequest};
use crate::config_loader::Settings;
use crate::error::PlaybackError;
use crate::voices::{Gender, Voice};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

const WAV_HEADER_LEN: usize = 44;
const CHUNK_LEN: usize = 4096;
const ESPEAK_RATE: u32 = 22050;

/// Local fallback: streams `espeak-ng --stdout` as it synthesizes.
/// Catalog voices map to "<lang>+f3" / "<lang>+m3".
pub struct EspeakBackend {
    binary: String,
}

impl EspeakBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.espeak_binary.clone())
    }

    fn espeak_voice(voice: &str) -> String {
        let voice = Voice::parse(voice);
        let lang = if voice.language == "unknown" {
            "en".to_string()
        } else {
            voice.language
        };
        match voice.gender {
            Some(Gender::Woman) => format!("{}+f3", lang),
            Some(Gender::Man) => format!("{}+m3", lang),
            None => lang,
        }
    }

    /// Command line for one request. The text goes after `--` so a leading
    /// dash is spoken instead of parsed as an option.
    fn args(request: &SynthesisRequest) -> Vec<String> {
        vec![
            "--stdout".to_string(),
            "-v".to_string(),
            Self::espeak_voice(&request.voice),
            "--".to_string(),
            request.text.clone(),
        ]
    }
}

struct Reader {
    child: Child,
    stdout: ChildStdout,
    header_left: usize,
}

#[async_trait]
impl StreamingTts for EspeakBackend {
    fn id(&self) -> &'static str {
        "espeak-ng"
    }

    fn sample_rate(&self) -> u32 {
        ESPEAK_RATE
    }

    async fn open(&self, request: &SynthesisRequest) -> Result<AudioStream, PlaybackError> {
        let mut child = Command::new(&self.binary)
            .args(Self::args(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlaybackError::Connection(format!("Failed to run {}: {}", self.binary, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlaybackError::Connection("espeak stdout unavailable".to_string()))?;

        let reader = Reader {
            child,
            stdout,
            header_left: WAV_HEADER_LEN,
        };

        let audio = stream::unfold(Some(reader), |state| async move {
            let mut reader = state?;
            loop {
                let mut buf = vec![0u8; CHUNK_LEN];
                match reader.stdout.read(&mut buf).await {
                    Ok(0) => {
                        return match reader.child.wait().await {
                            Ok(status) if status.success() => None,
                            Ok(status) => Some((
                                Err(PlaybackError::Stream(format!("espeak exited with {}", status))),
                                None,
                            )),
                            Err(e) => Some((Err(PlaybackError::Stream(e.to_string())), None)),
                        };
                    }
                    Ok(n) => {
                        buf.truncate(n);
                        let skip = reader.header_left.min(buf.len());
                        reader.header_left -= skip;
                        buf.drain(..skip);
                        if buf.is_empty() {
                            continue;
                        }
                        return Some((Ok(buf), Some(reader)));
                    }
                    Err(e) => return Some((Err(PlaybackError::Stream(e.to_string())), None)),
                }
            }
        });

        Ok(audio.boxed())
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, PlaybackError> {
        Ok(Vec::new())
    }
}

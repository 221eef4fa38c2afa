//! voicecast - play a multi-voice program through a streaming TTS service.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use voicecast::backends::{self, StreamingTts, SynthesisParams};
use voicecast::config_loader::{self, Settings};
use voicecast::document::{self, PodcastDocument};
use voicecast::segment::{Segment, SegmentField};
use voicecast::sink::{self, NullSink, SharedSink, WavSink};
use voicecast::voices::{self, Voice};
use voicecast::Podcast;

/// Multi-voice program player
#[derive(Parser)]
#[command(name = "voicecast")]
#[command(author = "StarTuz")]
#[command(version)]
#[command(about = "Render an ordered program of voiced text segments", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play every segment of a program document, in order
    Play {
        /// Program document (JSON)
        document: PathBuf,
        /// Write the rendered program to a WAV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Speak one piece of text
    Say {
        /// Text to speak
        text: String,
        /// Voice to use (optional)
        #[arg(short, long)]
        voice: Option<String>,
        /// Write the audio to a WAV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available voices, grouped by language
    Voices,

    /// Validate a program document and summarize it
    Check {
        /// Program document (JSON)
        document: PathBuf,
    },

    /// Write a new program document with one empty segment
    Init {
        /// Where to write the document
        document: PathBuf,
        /// Voice for the first segment
        #[arg(short, long)]
        voice: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "voicecast=debug" } else { "voicecast=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_sink(output: Option<&Path>, sample_rate: u32) -> Result<SharedSink, Box<dyn Error>> {
    Ok(match output {
        Some(path) => sink::shared(WavSink::create(path, sample_rate)?),
        None => sink::shared(NullSink::default()),
    })
}

fn build_podcast(
    settings: &Settings,
    backend: Arc<dyn StreamingTts>,
    output: Option<&Path>,
) -> Result<Podcast, Box<dyn Error>> {
    let sink = open_sink(output, backend.sample_rate())?;
    let podcast = Podcast::new(
        backend,
        sink,
        SynthesisParams::from_settings(settings),
        &settings.default_voice,
    )
    .with_pacing(Duration::from_millis(settings.pacing_ms));
    Ok(podcast)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = config_loader::SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default();

    match cli.command {
        Commands::Play { document: path, output } => {
            let raw = std::fs::read(&path)?;
            let backend = backends::from_settings(&settings)?;
            let mut podcast = build_podcast(&settings, backend, output.as_deref())?;
            let count = podcast.import(&raw)?;
            println!("Playing {} segments from {}", count, path.display());

            let controls = podcast.controls();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("Interrupted, stopping...");
                    controls.interrupt();
                }
            });

            let report = podcast.play_all().await?;
            println!(
                "Played {}, failed {}, skipped {} blank{}",
                report.played.len(),
                report.failed.len(),
                report.skipped.len(),
                if report.cancelled { " (cancelled)" } else { "" }
            );
            for (id, err) in &report.failed {
                eprintln!("  segment {}: {}", id, err);
            }
        }
        Commands::Say {
            text,
            voice,
            output,
        } => {
            let backend = backends::from_settings(&settings)?;
            let mut podcast = build_podcast(&settings, backend, output.as_deref())?;
            let id = podcast.segments()[0].id.clone();
            podcast.update(&id, SegmentField::Text, text);
            if let Some(v) = voice {
                podcast.update(&id, SegmentField::Voice, v);
            }

            let registry = podcast.registry().clone();
            let stop_id = id.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    if let Some(capability) = registry.lookup(&stop_id) {
                        capability.stop();
                    }
                }
            });

            podcast.play_segment(&id).await?;
        }
        Commands::Voices => {
            let backend = backends::from_settings(&settings)?;
            let ids: Vec<String> = match backend.list_voices().await {
                Ok(list) if !list.is_empty() => list.into_iter().map(|v| v.id).collect(),
                Ok(_) => settings.voices.clone(),
                Err(e) => {
                    tracing::warn!(error = %e, "voice list unavailable, using configured voices");
                    settings.voices.clone()
                }
            };
            for (language, list) in voices::group_by_language(&ids) {
                println!("{}:", language);
                for Voice { id, name, .. } in list {
                    println!("  {:<24} {}", id, name);
                }
            }
        }
        Commands::Check { document: path } => {
            let segments = document::load(&path)?;
            let blank = segments.iter().filter(|s| s.is_blank()).count();
            println!(
                "{}: {} segments ({} blank)",
                path.display(),
                segments.len(),
                blank
            );
            for (i, s) in segments.iter().enumerate() {
                let preview: String = s.text.chars().take(48).collect();
                println!("  {:>3} [{}] {}", i + 1, s.voice, preview);
            }
        }
        Commands::Init { document: path, voice } => {
            let voice = voice.unwrap_or_else(|| settings.default_voice.clone());
            PodcastDocument::export(&[Segment::new("", voice)]).save(&path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

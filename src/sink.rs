//! Where streamed PCM ends up.

use crate::error::PlaybackError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub trait AudioSink: Send {
    /// Accept one chunk of 16-bit little-endian mono PCM.
    fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError>;

    fn flush(&mut self) -> Result<(), PlaybackError>;
}

/// One sink shared by every controller of a program.
pub type SharedSink = Arc<Mutex<dyn AudioSink>>;

pub fn shared<S: AudioSink + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

/// Discards audio, counting what went through.
#[derive(Debug, Default)]
pub struct NullSink {
    pub bytes: usize,
}

impl AudioSink for NullSink {
    fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        self.bytes += pcm.len();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }
}

pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    // odd trailing byte of the previous chunk
    carry: Option<u8>,
}

impl WavSink {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, PlaybackError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec).map_err(|e| PlaybackError::Sink(e.to_string()))?;
        Ok(Self {
            writer,
            carry: None,
        })
    }
}

impl AudioSink for WavSink {
    fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        let mut bytes = pcm;
        if let Some(lo) = self.carry.take() {
            let Some((&hi, rest)) = bytes.split_first() else {
                self.carry = Some(lo);
                return Ok(());
            };
            self.writer
                .write_sample(i16::from_le_bytes([lo, hi]))
                .map_err(|e| PlaybackError::Sink(e.to_string()))?;
            bytes = rest;
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            self.writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| PlaybackError::Sink(e.to_string()))?;
        }
        self.carry = pairs.remainder().first().copied();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PlaybackError> {
        self.writer
            .flush()
            .map_err(|e| PlaybackError::Sink(e.to_string()))
    }
}

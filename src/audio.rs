//! Synthesized speech payloads
//!
//! The speech model returns raw little-endian 16-bit PCM. [`SpeechAudio`]
//! keeps those bytes together with their format and can write them out as
//! a WAV file with `hound`.

use crate::error::{Result, WestlineError};
use base64::Engine;
use std::io::{Seek, Write};
use std::path::Path;

/// Sample rate of the speech model's output
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Channel count of the speech model's output
pub const SPEECH_CHANNELS: u16 = 1;

/// Raw PCM speech audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    /// Little-endian signed 16-bit samples, interleaved by channel
    pub pcm: Vec<u8>,
    /// Samples per second
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl SpeechAudio {
    /// Wrap PCM bytes in the speech model's default format
    pub fn from_pcm(pcm: Vec<u8>) -> Self {
        Self {
            pcm,
            sample_rate: SPEECH_SAMPLE_RATE,
            channels: SPEECH_CHANNELS,
        }
    }

    /// Decode a base64 PCM payload
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not valid base64
    pub fn from_base64(payload: &str) -> Result<Self> {
        let pcm = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| WestlineError::Gateway(format!("Invalid audio payload: {}", e)))?;
        Ok(Self::from_pcm(pcm))
    }

    /// Decoded samples; a trailing odd byte is ignored
    pub fn samples(&self) -> Vec<i16> {
        self.pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Samples scaled to `[-1.0, 1.0)`
    pub fn normalized_samples(&self) -> Vec<f32> {
        self.samples()
            .into_iter()
            .map(|s| f32::from(s) / 32768.0)
            .collect()
    }

    /// Playback length
    pub fn duration(&self) -> std::time::Duration {
        let frames = self.pcm.len() as u64 / 2 / u64::from(self.channels.max(1));
        std::time::Duration::from_millis(frames * 1000 / u64::from(self.sample_rate.max(1)))
    }

    /// Write the audio as a 16-bit PCM WAV stream
    pub fn write_wav<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut wav = hound::WavWriter::new(writer, spec).map_err(WestlineError::Audio)?;
        for sample in self.samples() {
            wav.write_sample(sample).map_err(WestlineError::Audio)?;
        }
        wav.finalize().map_err(WestlineError::Audio)?;
        Ok(())
    }

    /// Write the audio to a WAV file at `path`
    pub fn save_wav(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(WestlineError::Io)?;
        self.write_wav(std::io::BufWriter::new(file))
    }
}

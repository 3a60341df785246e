//! PCM16 sample decoder.
//!
//! The synthesis service returns signed 16-bit little-endian mono PCM. Each
//! sample `s` becomes the float `s / 32768.0`, so the output lies in
//! `[-1.0, 1.0)` and decoding the same bytes always yields identical floats.

use crate::error::{Result, SpeechError};
use std::time::Duration;

/// Width of one PCM16 sample in bytes.
const SAMPLE_WIDTH: usize = 2;

/// A decoded, playable block of mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioUnit {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioUnit {
    /// Wraps already-normalized samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always 1: the synthesis service produces mono audio.
    pub fn channel_count(&self) -> u16 {
        1
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length at the unit's sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Decodes raw PCM16 little-endian mono bytes into an [`AudioUnit`].
///
/// # Errors
/// Returns `SpeechError::Decode` if the byte length is not a multiple of the
/// sample width or the sample rate is zero.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32) -> Result<AudioUnit> {
    if bytes.len() % SAMPLE_WIDTH != 0 {
        return Err(SpeechError::Decode {
            message: format!(
                "payload of {} bytes is not a multiple of the {}-byte sample width",
                bytes.len(),
                SAMPLE_WIDTH
            ),
        });
    }
    if sample_rate == 0 {
        return Err(SpeechError::Decode {
            message: "sample rate must be positive".to_string(),
        });
    }

    let samples = bytes
        .chunks_exact(SAMPLE_WIDTH)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioUnit::new(samples, sample_rate))
}

/// Encodes samples as PCM16 little-endian bytes, the inverse of [`decode_pcm16`]'s input.
pub fn encode_pcm16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

//! WAV file output and sample-rate conversion.
//!
//! `WavOutputBackend` "plays" each unit by writing it to its own numbered WAV
//! file in a directory, then reports the unit as finished straight away.
//! Useful for headless machines and for checking what the service returned.

use crate::audio::decoder::AudioUnit;
use crate::audio::output::{ActiveSource, OnEnded, OutputBackend, OutputDevice, apply_gain};
use crate::error::{Result, SpeechError};
use std::path::{Path, PathBuf};

/// Backend writing one `chunk-NNN.wav` per started unit into a directory.
#[derive(Debug, Clone)]
pub struct WavOutputBackend {
    dir: PathBuf,
}

impl WavOutputBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the `n`th file written by this backend.
    pub fn chunk_path(&self, n: usize) -> PathBuf {
        chunk_path(&self.dir, n)
    }
}

impl OutputBackend for WavOutputBackend {
    fn open(&self) -> Result<Box<dyn OutputDevice>> {
        std::fs::create_dir_all(&self.dir).map_err(|e| SpeechError::AudioOutput {
            message: format!("Failed to create {}: {}", self.dir.display(), e),
        })?;
        Ok(Box::new(WavOutput {
            dir: self.dir.clone(),
            written: 0,
        }))
    }
}

struct WavOutput {
    dir: PathBuf,
    written: usize,
}

fn chunk_path(dir: &Path, n: usize) -> PathBuf {
    dir.join(format!("chunk-{:03}.wav", n))
}

impl OutputDevice for WavOutput {
    fn start(
        &mut self,
        unit: AudioUnit,
        gain: f32,
        on_ended: OnEnded,
    ) -> Result<Box<dyn ActiveSource>> {
        let path = chunk_path(&self.dir, self.written);
        write_wav(&path, &unit, gain)?;
        self.written += 1;

        // The file is complete; nothing is left to play.
        on_ended();
        Ok(Box::new(WrittenFile))
    }
}

struct WrittenFile;

impl ActiveSource for WrittenFile {
    fn stop(&mut self) {}
}

fn write_wav(path: &Path, unit: &AudioUnit, gain: f32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: unit.channel_count(),
        sample_rate: unit.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let to_output_error = |e: hound::Error| SpeechError::AudioOutput {
        message: format!("Failed to write {}: {}", path.display(), e),
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(to_output_error)?;
    for sample in apply_gain(unit.samples(), gain) {
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .map_err(to_output_error)?;
    }
    writer.finalize().map_err(to_output_error)
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

//! Speaker output using CPAL (Cross-Platform Audio Library).

use crate::audio::decoder::AudioUnit;
use crate::audio::output::{ActiveSource, OnEnded, OutputBackend, OutputDevice, apply_gain};
use crate::audio::wav::resample;
use crate::error::{Result, SpeechError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for desktop sound servers.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful for speech output.
const FILTERED_PATTERNS: &[&str] = &["surround", "rear:", "center:", "side:", "S/PDIF"];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List audio output devices, marking preferred ones with "\[recommended\]".
///
/// # Errors
/// Returns `SpeechError::AudioOutput` if device enumeration fails.
pub fn list_output_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.output_devices();
        (host, devices)
    });
    let _host = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| SpeechError::AudioOutput {
        message: format!("Failed to enumerate output devices: {}", e),
    })?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                names.push(format!("{} [recommended]", name));
            } else {
                names.push(name);
            }
        }
    }

    Ok(names)
}

fn find_output_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host
                .output_devices()
                .map_err(|e| SpeechError::AudioOutput {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;
            for device in devices {
                if let Ok(dev_name) = device.name()
                    && dev_name == name
                {
                    return Ok(device);
                }
            }
            return Err(SpeechError::AudioDeviceNotFound {
                device: name.to_string(),
            });
        }

        if let Ok(devices) = host.output_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_output_device()
            .ok_or_else(|| SpeechError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Opens the system speaker (or a named output device) through CPAL.
#[derive(Debug, Clone, Default)]
pub struct CpalOutputBackend {
    device_name: Option<String>,
}

impl CpalOutputBackend {
    /// Backend for a named device, or the best default when `None`.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl OutputBackend for CpalOutputBackend {
    fn open(&self) -> Result<Box<dyn OutputDevice>> {
        let device = find_output_device(self.device_name.as_deref())?;
        let config = device
            .default_output_config()
            .map_err(|e| SpeechError::AudioOutput {
                message: format!("Failed to query default output config: {}", e),
            })?;
        tracing::debug!(
            channels = config.channels(),
            rate = config.sample_rate().0,
            format = ?config.sample_format(),
            "opened output device"
        );
        Ok(Box::new(CpalOutput { device, config }))
    }
}

struct CpalOutput {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

/// Read position into a unit being played, shared with the audio callback.
struct Playhead {
    samples: Vec<f32>,
    position: usize,
    on_ended: Option<OnEnded>,
}

/// Copy the next frames into `data`, duplicating mono into every channel.
///
/// Fires the end callback once the last sample has been handed to the device.
fn fill<T: Copy>(playhead: &Mutex<Playhead>, data: &mut [T], channels: usize, convert: fn(f32) -> T) {
    let callback = {
        let Ok(mut head) = playhead.lock() else {
            return;
        };
        for frame in data.chunks_mut(channels.max(1)) {
            let sample = match head.samples.get(head.position) {
                Some(&s) => {
                    head.position += 1;
                    s
                }
                None => 0.0,
            };
            frame.fill(convert(sample));
        }
        if head.position >= head.samples.len() {
            head.on_ended.take()
        } else {
            None
        }
    };

    if let Some(callback) = callback {
        callback();
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is owned by exactly one `CpalSource` and only touched
/// from the player task that owns that source.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

impl OutputDevice for CpalOutput {
    fn start(
        &mut self,
        unit: AudioUnit,
        gain: f32,
        on_ended: OnEnded,
    ) -> Result<Box<dyn ActiveSource>> {
        use cpal::SampleFormat;

        let device_rate = self.config.sample_rate().0;
        let channels = self.config.channels() as usize;
        let samples = apply_gain(
            &resample(unit.samples(), unit.sample_rate(), device_rate),
            gain,
        );

        let playhead = Arc::new(Mutex::new(Playhead {
            samples,
            position: 0,
            on_ended: Some(on_ended),
        }));
        let stream_config: cpal::StreamConfig = self.config.clone().into();
        let err_callback = |err| {
            tracing::warn!("Audio output stream error: {}", err);
        };

        let head = Arc::clone(&playhead);
        let stream = match self.config.sample_format() {
            SampleFormat::F32 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill(&head, data, channels, |s| s);
                },
                err_callback,
                None,
            ),
            SampleFormat::I16 => self.device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill(&head, data, channels, |s| (s * i16::MAX as f32) as i16);
                },
                err_callback,
                None,
            ),
            fmt => {
                return Err(SpeechError::AudioOutput {
                    message: format!(
                        "Unsupported output sample format: {:?}. \
                         Try specifying a device with --device.",
                        fmt
                    ),
                });
            }
        }
        .map_err(|e| SpeechError::AudioOutput {
            message: format!("Failed to build output stream: {}", e),
        })?;

        stream.play().map_err(|e| SpeechError::AudioOutput {
            message: format!("Failed to start output stream: {}", e),
        })?;

        Ok(Box::new(CpalSource {
            stream: Some(SendableStream(stream)),
            playhead,
        }))
    }
}

struct CpalSource {
    stream: Option<SendableStream>,
    playhead: Arc<Mutex<Playhead>>,
}

impl ActiveSource for CpalSource {
    fn stop(&mut self) {
        if let Ok(mut head) = self.playhead.lock() {
            head.on_ended = None;
        }
        if let Some(stream) = self.stream.take()
            && let Err(e) = stream.0.pause()
        {
            tracing::debug!("Failed to pause output stream: {}", e);
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Output device abstraction.
//!
//! The player needs very little from an audio output: open the device once,
//! start a decoded unit through a gain stage with an end-of-playback callback,
//! and stop a started source. Stopping a source disarms its callback.

use crate::audio::decoder::AudioUnit;
use crate::error::{Result, SpeechError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Callback fired at most once when a source plays to its natural end.
pub type OnEnded = Box<dyn FnOnce() + Send + 'static>;

/// Opens output devices. The player opens lazily on first playback.
pub trait OutputBackend: Send + Sync {
    /// Open the device. Fails with a device error if it is unavailable.
    fn open(&self) -> Result<Box<dyn OutputDevice>>;
}

/// An opened audio output.
pub trait OutputDevice: Send {
    /// Connect `unit` through a gain stage set to `gain` and start playing it.
    ///
    /// `on_ended` must be called exactly once if the source plays to its end,
    /// and never once [`ActiveSource::stop`] has been called.
    fn start(
        &mut self,
        unit: AudioUnit,
        gain: f32,
        on_ended: OnEnded,
    ) -> Result<Box<dyn ActiveSource>>;
}

/// A started source: the only handle able to silence it.
pub trait ActiveSource: Send {
    /// Disarm the end-of-playback callback and stop output. Idempotent.
    fn stop(&mut self);
}

/// Scale samples by `gain`, clamping the result to `[-1.0, 1.0]`.
pub fn apply_gain(samples: &[f32], gain: f32) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| (s * gain).clamp(-1.0, 1.0))
        .collect()
}

/// Something the mock output observed.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// The backend opened a device.
    Opened,
    /// A source started.
    Started {
        source: usize,
        frames: usize,
        gain: f32,
    },
    /// A source was stopped before (or after) its end.
    Stopped { source: usize },
    /// A source played to its end and fired its callback.
    Ended { source: usize },
}

struct MockSlot {
    on_ended: Option<OnEnded>,
    live: bool,
}

#[derive(Default)]
struct MockState {
    events: Vec<OutputEvent>,
    slots: Vec<MockSlot>,
    open_failure: Option<String>,
    start_failure: Option<String>,
}

/// Recording output backend for tests.
///
/// Clones share state: keep one clone in the test and hand another to the player.
#[derive(Clone, Default)]
pub struct MockOutput {
    state: Arc<Mutex<MockState>>,
}

impl MockOutput {
    /// Create a mock output that opens and starts successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail when opened
    pub fn with_open_failure(self, message: &str) -> Self {
        self.lock().open_failure = Some(message.to_string());
        self
    }

    /// Configure the mock to fail when starting a source
    pub fn with_start_failure(self, message: &str) -> Self {
        self.lock().start_failure = Some(message.to_string());
        self
    }

    /// Everything observed so far, in order.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.lock().events.clone()
    }

    /// Number of times the backend opened a device.
    pub fn open_count(&self) -> usize {
        self.count(|e| matches!(e, OutputEvent::Opened))
    }

    /// Number of sources started.
    pub fn started_count(&self) -> usize {
        self.count(|e| matches!(e, OutputEvent::Started { .. }))
    }

    /// Number of sources currently audible.
    pub fn live_count(&self) -> usize {
        self.lock().slots.iter().filter(|s| s.live).count()
    }

    /// Gains of all started sources, in start order.
    pub fn gains(&self) -> Vec<f32> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                OutputEvent::Started { gain, .. } => Some(*gain),
                _ => None,
            })
            .collect()
    }

    /// Play the most recent live source to its end, firing its callback.
    ///
    /// Returns false if no live source exists.
    pub fn finish_active(&self) -> bool {
        let callback = {
            let mut state = self.lock();
            let Some(id) = state.slots.iter().rposition(|s| s.live) else {
                return false;
            };
            let slot = &mut state.slots[id];
            slot.live = false;
            let callback = slot.on_ended.take();
            state.events.push(OutputEvent::Ended { source: id });
            callback
        };

        if let Some(callback) = callback {
            callback();
        }
        true
    }

    fn count(&self, pred: impl Fn(&OutputEvent) -> bool) -> usize {
        self.lock().events.iter().filter(|e| pred(e)).count()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OutputBackend for MockOutput {
    fn open(&self) -> Result<Box<dyn OutputDevice>> {
        let mut state = self.lock();
        if let Some(message) = &state.open_failure {
            return Err(SpeechError::AudioOutput {
                message: message.clone(),
            });
        }
        state.events.push(OutputEvent::Opened);
        Ok(Box::new(self.clone()))
    }
}

impl OutputDevice for MockOutput {
    fn start(
        &mut self,
        unit: AudioUnit,
        gain: f32,
        on_ended: OnEnded,
    ) -> Result<Box<dyn ActiveSource>> {
        let mut state = self.lock();
        if let Some(message) = &state.start_failure {
            return Err(SpeechError::AudioOutput {
                message: message.clone(),
            });
        }

        let source = state.slots.len();
        state.slots.push(MockSlot {
            on_ended: Some(on_ended),
            live: true,
        });
        state.events.push(OutputEvent::Started {
            source,
            frames: unit.frame_count(),
            gain,
        });

        Ok(Box::new(MockSource {
            output: self.clone(),
            source,
        }))
    }
}

struct MockSource {
    output: MockOutput,
    source: usize,
}

impl ActiveSource for MockSource {
    fn stop(&mut self) {
        let mut state = self.output.lock();
        let slot = &mut state.slots[self.source];
        slot.on_ended = None;
        if slot.live {
            slot.live = false;
            state.events.push(OutputEvent::Stopped {
                source: self.source,
            });
        }
    }
}

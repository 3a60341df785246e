//! Observable player state, playback events and speech preferences.

use crate::config::SpeechConfig;
use crate::defaults;
use crate::error::ErrorKind;
use crate::player::session::{Phase, Session};
use crate::synth::voice::{Language, resolve_voice};

/// Snapshot of the player as the UI sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerState {
    /// A run is underway and at least one chunk of it has been audible.
    pub is_playing: bool,
    /// Waiting for synthesized audio.
    pub is_loading: bool,
    /// The current text produced at least one segment (repeat/replay available).
    pub has_audio: bool,
    /// Chunk being loaded or played, if any.
    pub current_index: Option<usize>,
    /// Number of segments in the current text.
    pub chunk_count: usize,
}

impl PlayerState {
    pub(crate) fn of(session: &Session) -> Self {
        let current_index = match session.phase() {
            Phase::Idle => None,
            Phase::Loading { index } | Phase::Playing { index } => Some(index),
        };
        Self {
            is_playing: session.is_playing(),
            is_loading: session.is_loading(),
            has_audio: session.has_audio(),
            current_index,
            chunk_count: session.segments().len(),
        }
    }

    /// Neither playing nor loading.
    pub fn is_idle(&self) -> bool {
        !self.is_playing && !self.is_loading
    }
}

/// Progress notifications, in the order the player handled them.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A synthesis request for chunk `index` went out.
    ChunkLoading { index: usize, text: String },
    /// Chunk `index` became audible.
    ChunkStarted { index: usize },
    /// Chunk `index` played to its end.
    ChunkFinished { index: usize },
    /// Chunk `index` could not be played; the run stopped.
    ChunkFailed {
        index: usize,
        kind: ErrorKind,
        message: String,
    },
    /// A synthesis result arrived for a run that was stopped or replaced.
    StaleResultDiscarded { index: usize },
    /// The last chunk finished.
    Finished,
    /// Playback was stopped.
    Stopped,
}

/// Voice, language and gain used for upcoming chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechPreferences {
    pub voice: String,
    pub language: Language,
    pub volume: f32,
}

impl SpeechPreferences {
    /// Voice to request from the service for the configured language.
    pub fn effective_voice(&self) -> String {
        resolve_voice(&self.voice, self.language)
    }
}

impl Default for SpeechPreferences {
    fn default() -> Self {
        Self {
            voice: defaults::DEFAULT_VOICE.to_string(),
            language: Language::default(),
            volume: defaults::DEFAULT_VOLUME,
        }
    }
}

impl From<&SpeechConfig> for SpeechPreferences {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            language: config.language,
            volume: config.volume,
        }
    }
}

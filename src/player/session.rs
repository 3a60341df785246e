//! Playback session: segment queue, position, and the generation token.
//!
//! `Session` is the pure state machine behind the player. It performs no
//! I/O: entering `Loading(i)` hands back a [`FetchRequest`] for the caller to
//! run, and every asynchronous completion is reported back together with the
//! [`Generation`] it was issued under. A completion whose generation is no
//! longer current is rejected and leaves the session untouched.
//!
//! ```text
//! Idle ──play/repeat/replay──▶ Loading(i) ──audio accepted──▶ Playing(i)
//!   ▲                              │                              │
//!   │◀──────── failure ────────────┘                              │ ended
//!   │◀──────── last chunk ended ──────────────────────────────────┤
//!   │                                   Loading(i+1) ◀────────────┘
//!   └◀──────── stop (from any state) ─────────────────────────────
//! ```

use crate::chunker::{Segment, TextChunker};
use std::fmt;

/// Cancellation epoch. Work issued under an older generation is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Where the session is in the advance cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Waiting for synthesized audio of chunk `index`.
    Loading { index: usize },
    /// Chunk `index` is audible.
    Playing { index: usize },
}

/// A synthesis call the session wants made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: Generation,
    pub index: usize,
    pub text: String,
}

/// What happened when a chunk finished playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The notification belonged to an older generation or a stopped session.
    Stale,
    /// The next chunk must be fetched.
    Next(FetchRequest),
    /// The last chunk finished; the session is idle.
    Finished,
}

/// Segment queue plus cancellation state.
#[derive(Debug, Default)]
pub struct Session {
    chunker: TextChunker,
    segments: Vec<Segment>,
    current_index: usize,
    generation: Generation,
    stopped: bool,
    phase: Phase,
    /// Set once a chunk of the current run became audible; cleared on idle.
    playing: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunker(chunker: TextChunker) -> Self {
        Self {
            chunker,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// True once the current text produced at least one segment.
    pub fn has_audio(&self) -> bool {
        !self.segments.is_empty()
    }

    /// True from the first audible chunk of a run until the run ends or stops.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    /// Whether work issued under `generation` may still act.
    pub fn is_current(&self, generation: Generation) -> bool {
        !self.stopped && generation == self.generation
    }

    /// Stop: invalidate all outstanding work and go idle.
    ///
    /// The segment queue and position are kept for repeat/replay.
    pub fn stop(&mut self) {
        self.generation = self.generation.next();
        self.stopped = true;
        self.phase = Phase::Idle;
        self.playing = false;
    }

    /// Replace the queue with the segments of `text` and start at chunk 0.
    ///
    /// Returns `None` (and stays idle) if `text` has nothing to speak.
    pub fn play_text(&mut self, text: &str) -> Option<FetchRequest> {
        self.stop();
        self.segments = self.chunker.segments(text);
        self.current_index = 0;
        if self.segments.is_empty() {
            return None;
        }
        Some(self.begin(0))
    }

    /// Stop, then load the current chunk again under a new generation.
    pub fn repeat_current(&mut self) -> Option<FetchRequest> {
        if self.segments.is_empty() {
            return None;
        }
        self.stop();
        Some(self.begin(self.current_index))
    }

    /// Stop, then load chunk 0 under a new generation.
    pub fn replay_all(&mut self) -> Option<FetchRequest> {
        if self.segments.is_empty() {
            return None;
        }
        self.stop();
        Some(self.begin(0))
    }

    /// Synthesized audio for `index` arrived and is about to be started.
    ///
    /// Returns false, changing nothing, if the audio is stale.
    pub fn accept_audio(&mut self, generation: Generation, index: usize) -> bool {
        if !self.is_current(generation) || self.phase != (Phase::Loading { index }) {
            return false;
        }
        self.phase = Phase::Playing { index };
        self.playing = true;
        true
    }

    /// Chunk `index` played to its end.
    pub fn playback_ended(&mut self, generation: Generation, index: usize) -> Advance {
        if !self.is_current(generation) || self.phase != (Phase::Playing { index }) {
            return Advance::Stale;
        }

        let next = index + 1;
        if next < self.segments.len() {
            Advance::Next(self.begin_within_generation(next))
        } else {
            self.phase = Phase::Idle;
            self.playing = false;
            Advance::Finished
        }
    }

    /// Synthesis, decoding or output failed for work under `generation`.
    ///
    /// Goes idle without advancing. Returns false if the failure is stale.
    pub fn fail(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.phase = Phase::Idle;
        self.playing = false;
        true
    }

    /// Mint a fresh generation and enter `Loading(index)`.
    fn begin(&mut self, index: usize) -> FetchRequest {
        self.generation = self.generation.next();
        self.stopped = false;
        self.begin_within_generation(index)
    }

    fn begin_within_generation(&mut self, index: usize) -> FetchRequest {
        self.current_index = index;
        self.phase = Phase::Loading { index };
        FetchRequest {
            generation: self.generation,
            index,
            text: self.segments[index].text.clone(),
        }
    }
}

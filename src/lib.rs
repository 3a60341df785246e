//! agrispeak - Chunked speech playback for analysis read-outs
//!
//! Splits text into sentence-aligned chunks, synthesizes them one at a time
//! and plays them back in order, with stop, repeat and replay transport.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod chunker;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod player;
pub mod synth;

// Composition root - needs the CLI and the HTTP synthesizer
#[cfg(all(feature = "cli", feature = "http"))]
pub mod app;

// Core traits (synthesize → decode → output)
pub use audio::output::{ActiveSource, OutputBackend, OutputDevice};
pub use synth::client::Synthesizer;

// Player
pub use player::controller::{PlayerConfig, SpeechPlayer};
pub use player::state::{PlaybackEvent, PlayerState, SpeechPreferences};

// Building blocks
pub use audio::decoder::{AudioUnit, decode_pcm16};
pub use chunker::{ChunkerConfig, TextChunker, chunk};
pub use synth::voice::{Language, resolve_voice};

// Error handling
pub use error::{ErrorKind, Result, SpeechError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

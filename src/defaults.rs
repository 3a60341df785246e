//! Default configuration constants for agrispeak.
//!
//! Shared between the config layer, the synthesis client and the player so the
//! values agree everywhere.

/// Sample rate of the PCM16 payload returned by the synthesis service, in Hz.
pub const SAMPLE_RATE: u32 = 24000;

/// A chunk is flushed once its buffered text grows past this many characters.
pub const MIN_CHUNK_CHARS: usize = 60;

/// Default synthesis voice.
pub const DEFAULT_VOICE: &str = "Puck";

/// Voice used for Hindi and Marathi when the default voice is configured.
pub const INDIC_VOICE: &str = "Kore";

/// Default playback gain (0.0 to 1.0).
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Default synthesis endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/tts";

/// Capacity of the playback event broadcast channel.
///
/// Slow subscribers past this many events see `RecvError::Lagged`.
pub const EVENT_CAPACITY: usize = 64;

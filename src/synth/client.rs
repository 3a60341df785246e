//! Synthesis client trait.

use crate::error::Result;
use crate::synth::voice::Language;
use async_trait::async_trait;

/// Turns one text segment into raw PCM16 little-endian mono bytes.
///
/// Implementations return `SpeechError::Synthesis` when the remote call fails
/// or yields no audio. Calls may take arbitrarily long; the player never
/// relies on cancelling them.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str, language: Language) -> Result<Vec<u8>>;
}

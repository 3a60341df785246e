//! Text chunker: splits analysis text into speakable segments.
//!
//! Text is cut after runs of sentence terminators (`.`, `!`, `?`) so a chunk
//! never ends mid-sentence. Consecutive sentences are merged into one chunk
//! until the buffered text grows past `min_chunk_chars`; whatever is left at
//! the end becomes a final, possibly short, chunk. No characters other than
//! whitespace at chunk edges are ever dropped.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// A bounded span of text synthesized and played as one audio unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in playback order, starting at 0.
    pub index: usize,
    /// Non-empty text of the segment.
    pub text: String,
}

/// Configuration for the chunker.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkerConfig {
    /// A buffered chunk is flushed once it holds more than this many characters.
    pub min_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chunk_chars: defaults::MIN_CHUNK_CHARS,
        }
    }
}

/// Splits text into sentence-aligned chunks.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    /// Creates a chunker with the default threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chunker with a custom configuration.
    pub fn with_config(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Returns the chunker configuration.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits `text` into ordered chunk strings.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffered_chars = 0usize;

        for fragment in sentence_fragments(text) {
            buffer.push_str(fragment);
            buffered_chars += fragment.chars().count();
            if buffered_chars > self.config.min_chunk_chars {
                push_trimmed(&mut chunks, &buffer);
                buffer.clear();
                buffered_chars = 0;
            }
        }

        push_trimmed(&mut chunks, &buffer);
        chunks
    }

    /// Splits `text` into indexed segments in playback order.
    pub fn segments(&self, text: &str) -> Vec<Segment> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Segment { index, text })
            .collect()
    }
}

/// Splits `text` into chunks with the default threshold.
pub fn chunk(text: &str) -> Vec<String> {
    TextChunker::new().chunk(text)
}

fn push_trimmed(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Yields sentence-like fragments, each ending after a run of terminators.
///
/// The fragments partition `text` exactly: concatenating them gives back the input.
fn sentence_fragments(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }

        let end = match rest.find(is_terminator) {
            Some(start) => {
                let after = &rest[start..];
                let run = after
                    .find(|c: char| !is_terminator(c))
                    .unwrap_or(after.len());
                start + run
            }
            None => rest.len(),
        };

        let (fragment, tail) = rest.split_at(end);
        rest = tail;
        Some(fragment)
    })
}

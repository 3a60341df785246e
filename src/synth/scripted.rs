//! Scripted synthesizer for tests.
//!
//! Every `synthesize` call parks until the test answers it through the
//! paired [`SynthesisQueue`], which makes completion order and timing fully
//! controllable: answer late, out of order, or not at all.

use crate::audio::decoder::encode_pcm16;
use crate::error::{Result, SpeechError};
use crate::synth::client::Synthesizer;
use crate::synth::voice::Language;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// One synthesis call waiting for an answer.
#[derive(Debug)]
pub struct PendingSynthesis {
    pub text: String,
    pub voice: String,
    pub language: Language,
    reply: oneshot::Sender<Result<Vec<u8>>>,
}

impl PendingSynthesis {
    /// Answer with raw PCM bytes.
    pub fn respond(self, bytes: Vec<u8>) {
        // The caller may have gone away; that is fine for a test double.
        let _unused = self.reply.send(Ok(bytes));
    }

    /// Answer with `frames` samples of a constant PCM16 value.
    pub fn respond_with_frames(self, frames: usize, value: i16) {
        self.respond(encode_pcm16(&vec![value; frames]));
    }

    /// Answer with a synthesis error.
    pub fn fail(self, message: &str) {
        let _unused = self.reply.send(Err(SpeechError::Synthesis {
            message: message.to_string(),
        }));
    }
}

/// Synthesizer half: hand this to the player.
#[derive(Debug, Clone)]
pub struct ScriptedSynthesizer {
    calls: mpsc::UnboundedSender<PendingSynthesis>,
}

/// Test half: receives calls in the order they were made.
#[derive(Debug)]
pub struct SynthesisQueue {
    calls: mpsc::UnboundedReceiver<PendingSynthesis>,
}

impl ScriptedSynthesizer {
    pub fn new() -> (Self, SynthesisQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { calls: tx }, SynthesisQueue { calls: rx })
    }
}

impl SynthesisQueue {
    /// Wait for the next call.
    pub async fn next(&mut self) -> Option<PendingSynthesis> {
        self.calls.recv().await
    }

    /// Take the next call if one has already been made.
    pub fn try_next(&mut self) -> Option<PendingSynthesis> {
        self.calls.try_recv().ok()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str, language: Language) -> Result<Vec<u8>> {
        let (reply, answer) = oneshot::channel();
        self.calls
            .send(PendingSynthesis {
                text: text.to_string(),
                voice: voice.to_string(),
                language,
                reply,
            })
            .map_err(|_| SpeechError::Synthesis {
                message: "scripted synthesizer queue closed".to_string(),
            })?;

        answer.await.unwrap_or_else(|_| {
            Err(SpeechError::Synthesis {
                message: "scripted call dropped without an answer".to_string(),
            })
        })
    }
}

//! Transport controller: the public face of the speech player.
//!
//! All session state lives in a single engine task that drains one event
//! queue. Public operations, synthesis completions and end-of-playback
//! notifications are all events on that queue, and each is handled to
//! completion before the next is looked at, so no two handlers ever touch the
//! session or the output at the same time.
//!
//! Synthesis runs in spawned tasks that post their result back as an event
//! tagged with the generation it was issued under. The engine re-checks that
//! generation before decoding or touching the output, so a result that comes
//! back after `stop`, `play_text`, `repeat_current_chunk` or `replay_all` is
//! dropped without side effects.

use crate::audio::decoder::{AudioUnit, decode_pcm16};
use crate::audio::output::{ActiveSource, OnEnded, OutputBackend, OutputDevice};
use crate::chunker::{ChunkerConfig, TextChunker};
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, SpeechError};
use crate::player::session::{Advance, FetchRequest, Generation, Phase, Session};
use crate::player::state::{PlaybackEvent, PlayerState, SpeechPreferences};
use crate::synth::client::Synthesizer;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Configuration for a [`SpeechPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Voice, language and gain for upcoming chunks.
    pub preferences: SpeechPreferences,
    /// How text is split into chunks.
    pub chunker: ChunkerConfig,
    /// Sample rate of the synthesis service's PCM payload.
    pub sample_rate: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preferences: SpeechPreferences::default(),
            chunker: ChunkerConfig::default(),
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl From<&Config> for PlayerConfig {
    fn from(config: &Config) -> Self {
        Self {
            preferences: SpeechPreferences::from(&config.speech),
            chunker: ChunkerConfig {
                min_chunk_chars: config.speech.min_chunk_chars,
            },
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

enum Event {
    PlayText(String),
    Stop,
    RepeatCurrent,
    ReplayAll,
    SetPreferences(SpeechPreferences),
    Synthesized {
        generation: Generation,
        index: usize,
        result: Result<Vec<u8>>,
    },
    Ended {
        generation: Generation,
        index: usize,
    },
    Shutdown,
}

/// Handle to a running speech player.
///
/// Operations return immediately; progress is observed through
/// [`SpeechPlayer::state`], [`SpeechPlayer::subscribe`] and
/// [`SpeechPlayer::subscribe_events`]. Dropping the handle stops playback
/// and releases the output device.
pub struct SpeechPlayer {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<PlayerState>,
    notifications: broadcast::Sender<PlaybackEvent>,
    engine: Option<JoinHandle<()>>,
}

impl SpeechPlayer {
    /// Start the player engine on the current tokio runtime.
    ///
    /// The output device is opened lazily, on the first chunk that is ready
    /// to play.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn(
        synthesizer: Arc<dyn Synthesizer>,
        output: Arc<dyn OutputBackend>,
        config: PlayerConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlayerState::default());
        let (notifications, _) = broadcast::channel(defaults::EVENT_CAPACITY);

        let engine = Engine {
            session: Session::with_chunker(TextChunker::with_config(config.chunker)),
            synthesizer,
            backend: output,
            device: None,
            active: None,
            preferences: config.preferences,
            sample_rate: config.sample_rate,
            events: events_tx.clone(),
            state: state_tx,
            notifications: notifications.clone(),
            pending: Vec::new(),
        };
        let handle = tokio::spawn(engine.run(events_rx));

        Self {
            events: events_tx,
            state: state_rx,
            notifications,
            engine: Some(handle),
        }
    }

    /// Replace the current text and start speaking it from the first chunk.
    pub fn play_text(&self, text: impl Into<String>) {
        self.send(Event::PlayText(text.into()));
    }

    /// Stop playback. Safe to call at any time, any number of times.
    pub fn stop(&self) {
        self.send(Event::Stop);
    }

    /// Play the current chunk again. No-op if there is no text.
    pub fn repeat_current_chunk(&self) {
        self.send(Event::RepeatCurrent);
    }

    /// Play the current text again from the first chunk. No-op if there is no text.
    pub fn replay_all(&self) {
        self.send(Event::ReplayAll);
    }

    /// Change voice, language or volume for chunks fetched from now on.
    pub fn set_preferences(&self, preferences: SpeechPreferences) {
        self.send(Event::SetPreferences(preferences));
    }

    /// Current state snapshot.
    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading
    }

    pub fn has_audio(&self) -> bool {
        self.state().has_audio
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.state.clone()
    }

    /// Receive playback events from now on.
    ///
    /// Events are sent after the state they describe has been published.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.notifications.subscribe()
    }

    /// Stop playback, release the output device and wait for the engine to exit.
    pub async fn shutdown(mut self) {
        self.send(Event::Shutdown);
        if let Some(engine) = self.engine.take()
            && let Err(e) = engine.await
        {
            tracing::warn!("speech player engine ended abnormally: {}", e);
        }
    }

    fn send(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::debug!("speech player engine is gone; ignoring command");
        }
    }
}

impl Drop for SpeechPlayer {
    fn drop(&mut self) {
        if self.engine.take().is_some() {
            self.send(Event::Shutdown);
        }
    }
}

struct Engine {
    session: Session,
    synthesizer: Arc<dyn Synthesizer>,
    backend: Arc<dyn OutputBackend>,
    /// Opened on first use, released when the engine exits.
    device: Option<Box<dyn OutputDevice>>,
    /// At most one source is ever audible.
    active: Option<Box<dyn ActiveSource>>,
    preferences: SpeechPreferences,
    sample_rate: u32,
    events: mpsc::UnboundedSender<Event>,
    state: watch::Sender<PlayerState>,
    notifications: broadcast::Sender<PlaybackEvent>,
    /// Events raised by the handler in progress, sent once state is published.
    pending: Vec<PlaybackEvent>,
}

impl Engine {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = inbox.recv().await {
            let shutdown = matches!(event, Event::Shutdown);
            self.handle(event);
            self.publish();
            if shutdown {
                break;
            }
        }
        tracing::debug!("speech player engine stopped");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::PlayText(text) => {
                self.teardown_active();
                match self.session.play_text(&text) {
                    Some(request) => self.fetch(request),
                    None => tracing::debug!("nothing to speak"),
                }
            }
            Event::Stop | Event::Shutdown => {
                let was_active = !PlayerState::of(&self.session).is_idle();
                self.stop();
                if was_active {
                    self.notify(PlaybackEvent::Stopped);
                }
            }
            Event::RepeatCurrent => {
                if self.session.has_audio() {
                    self.teardown_active();
                }
                if let Some(request) = self.session.repeat_current() {
                    self.fetch(request);
                }
            }
            Event::ReplayAll => {
                if self.session.has_audio() {
                    self.teardown_active();
                }
                if let Some(request) = self.session.replay_all() {
                    self.fetch(request);
                }
            }
            Event::SetPreferences(preferences) => {
                self.preferences = preferences;
            }
            Event::Synthesized {
                generation,
                index,
                result,
            } => self.on_synthesized(generation, index, result),
            Event::Ended { generation, index } => self.on_ended(generation, index),
        }
    }

    fn stop(&mut self) {
        self.teardown_active();
        self.session.stop();
    }

    /// Silence and drop the audible source, disarming its end notification.
    fn teardown_active(&mut self) {
        if let Some(mut source) = self.active.take() {
            source.stop();
        }
    }

    fn fetch(&mut self, request: FetchRequest) {
        tracing::debug!(
            generation = %request.generation,
            index = request.index,
            "requesting synthesis"
        );
        self.notify(PlaybackEvent::ChunkLoading {
            index: request.index,
            text: request.text.clone(),
        });

        let synthesizer = Arc::clone(&self.synthesizer);
        let events = self.events.clone();
        let voice = self.preferences.effective_voice();
        let language = self.preferences.language;

        tokio::spawn(async move {
            let result = synthesizer
                .synthesize(&request.text, &voice, language)
                .await;
            let done = Event::Synthesized {
                generation: request.generation,
                index: request.index,
                result,
            };
            if events.send(done).is_err() {
                tracing::debug!("speech player engine is gone; dropping synthesis result");
            }
        });
    }

    fn on_synthesized(&mut self, generation: Generation, index: usize, result: Result<Vec<u8>>) {
        if !self.session.is_current(generation) || self.session.phase() != (Phase::Loading { index })
        {
            tracing::debug!(%generation, index, "discarding stale synthesis result");
            self.notify(PlaybackEvent::StaleResultDiscarded { index });
            return;
        }

        let unit = match result.and_then(|bytes| decode_pcm16(&bytes, self.sample_rate)) {
            Ok(unit) => unit,
            Err(e) => return self.fail(generation, index, e),
        };

        self.teardown_active();
        if let Err(e) = self.start(generation, index, unit) {
            self.fail(generation, index, e);
        }
    }

    fn start(&mut self, generation: Generation, index: usize, unit: AudioUnit) -> Result<()> {
        let device = match self.device.take() {
            Some(device) => device,
            None => self.backend.open()?,
        };
        let device = self.device.insert(device);

        let events = self.events.clone();
        let on_ended: OnEnded = Box::new(move || {
            if events.send(Event::Ended { generation, index }).is_err() {
                tracing::trace!("speech player engine is gone; dropping end of playback");
            }
        });

        let duration = unit.duration();
        let source = device.start(unit, self.preferences.volume, on_ended)?;
        self.active = Some(source);

        if !self.session.accept_audio(generation, index) {
            self.teardown_active();
            return Err(SpeechError::Other(format!(
                "chunk {} was no longer loading when its audio started",
                index
            )));
        }

        tracing::info!(%generation, index, ?duration, "chunk started");
        self.notify(PlaybackEvent::ChunkStarted { index });
        Ok(())
    }

    fn on_ended(&mut self, generation: Generation, index: usize) {
        match self.session.playback_ended(generation, index) {
            Advance::Stale => {
                tracing::debug!(%generation, index, "ignoring stale end of playback");
            }
            Advance::Next(request) => {
                self.teardown_active();
                self.notify(PlaybackEvent::ChunkFinished { index });
                self.fetch(request);
            }
            Advance::Finished => {
                self.teardown_active();
                tracing::info!(%generation, "all chunks played");
                self.notify(PlaybackEvent::ChunkFinished { index });
                self.notify(PlaybackEvent::Finished);
            }
        }
    }

    /// Log a chunk failure and go idle without advancing.
    fn fail(&mut self, generation: Generation, index: usize, error: SpeechError) {
        tracing::warn!(%generation, index, kind = %error.kind(), "chunk playback failed: {}", error);
        if self.session.fail(generation) {
            self.notify(PlaybackEvent::ChunkFailed {
                index,
                kind: error.kind(),
                message: error.to_string(),
            });
        }
    }

    fn notify(&mut self, event: PlaybackEvent) {
        self.pending.push(event);
    }

    /// Publish the state, then the events raised while reaching it.
    fn publish(&mut self) {
        let next = PlayerState::of(&self.session);
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        for event in self.pending.drain(..) {
            if self.notifications.send(event).is_err() {
                tracing::trace!("no playback event subscribers");
            }
        }
    }
}

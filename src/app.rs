//! Speech application entry point.
//!
//! Wires the configured synthesizer and output into a [`SpeechPlayer`],
//! drives it from the terminal and renders its progress.

use crate::audio::output::OutputBackend;
use crate::audio::wav::WavOutputBackend;
use crate::chunker::{ChunkerConfig, TextChunker};
use crate::cli::SpeakArgs;
use crate::config::Config;
use crate::error::{Result, SpeechError};
use crate::player::controller::{PlayerConfig, SpeechPlayer};
use crate::player::state::PlaybackEvent;
use crate::synth::http::HttpSynthesizer;
use owo_colors::OwoColorize;
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

/// Single-letter commands accepted while speaking interactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Stop,
    Repeat,
    ReplayAll,
    PlayAgain,
    Quit,
}

/// Parse one line of interactive input.
pub fn parse_transport_command(line: &str) -> Option<TransportCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "stop" => Some(TransportCommand::Stop),
        "r" | "repeat" => Some(TransportCommand::Repeat),
        "a" | "all" | "replay" => Some(TransportCommand::ReplayAll),
        "p" | "play" => Some(TransportCommand::PlayAgain),
        "q" | "quit" | "exit" => Some(TransportCommand::Quit),
        _ => None,
    }
}

const TRANSPORT_HELP: &str = "Commands: [s]top  [r]epeat chunk  replay [a]ll  [p]lay again  [q]uit";

/// Apply `speak` flags on top of the loaded configuration.
pub fn apply_speak_overrides(config: &mut Config, args: &SpeakArgs) -> Result<()> {
    if let Some(voice) = &args.voice {
        config.speech.voice = voice.clone();
    }
    if let Some(language) = &args.language {
        config.speech.language = language.parse()?;
    }
    if let Some(volume) = args.volume {
        config.speech.volume = volume;
    }
    if let Some(device) = &args.device {
        config.output.device = Some(device.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.service.endpoint = endpoint.clone();
    }
    if let Some(timeout) = args.timeout {
        config.service.timeout_secs = Some(timeout);
    }
    config.validate()
}

/// Use `text` if given, otherwise read all of stdin.
pub fn read_text(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Pick where audio goes: WAV files when a directory is given, speakers otherwise.
pub fn select_output(config: &Config, wav_dir: Option<&Path>) -> Result<Arc<dyn OutputBackend>> {
    if let Some(dir) = wav_dir {
        return Ok(Arc::new(WavOutputBackend::new(dir)));
    }

    #[cfg(feature = "cpal-audio")]
    {
        Ok(Arc::new(crate::audio::playback::CpalOutputBackend::new(
            config.output.device.clone(),
        )))
    }

    #[cfg(not(feature = "cpal-audio"))]
    {
        let _unused = config;
        Err(SpeechError::AudioOutput {
            message: "built without speaker output; use --wav-dir".to_string(),
        })
    }
}

/// Render a playback event for the terminal, or `None` if it should stay silent.
pub fn render_event(event: &PlaybackEvent, chunk_count: usize, verbosity: u8) -> Option<String> {
    match event {
        PlaybackEvent::ChunkLoading { index, text } => Some(format!(
            "{} {}",
            format!("[{}/{}]", index + 1, chunk_count).dimmed(),
            text
        )),
        PlaybackEvent::ChunkStarted { index } if verbosity >= 1 => {
            Some(format!("  {} chunk {}", "▶".green(), index + 1))
        }
        PlaybackEvent::ChunkFinished { index } if verbosity >= 1 => {
            Some(format!("  {} chunk {}", "✓".dimmed(), index + 1))
        }
        PlaybackEvent::ChunkFailed {
            index,
            kind,
            message,
        } => Some(
            format!("Chunk {} failed ({}): {}", index + 1, kind, message)
                .red()
                .to_string(),
        ),
        PlaybackEvent::StaleResultDiscarded { index } if verbosity >= 2 => Some(
            format!("  discarded late audio for chunk {}", index + 1)
                .dimmed()
                .to_string(),
        ),
        PlaybackEvent::Finished => Some("Done.".green().to_string()),
        PlaybackEvent::Stopped => Some("Stopped.".yellow().to_string()),
        _ => None,
    }
}

/// Run the speak command: chunk → synthesize → play, with optional transport keys.
///
/// Interactive when the text came from the command line and stdin is a
/// terminal; otherwise plays once and returns when the text is finished.
pub async fn run_speak_command(
    mut config: Config,
    args: SpeakArgs,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    apply_speak_overrides(&mut config, &args)?;
    let interactive = args.text.is_some() && std::io::stdin().is_terminal();
    let text = read_text(args.text)?;
    if !player_has_work(&config, &text) {
        if !quiet {
            eprintln!("Nothing to speak.");
        }
        return Ok(());
    }

    let synthesizer = Arc::new(HttpSynthesizer::new(&config.service)?);
    let output = select_output(&config, args.wav_dir.as_deref())?;
    tracing::debug!(endpoint = synthesizer.endpoint(), "synthesis service");

    let player = SpeechPlayer::spawn(synthesizer, output, PlayerConfig::from(&config));
    let mut events = player.subscribe_events();
    player.play_text(text.clone());

    let outcome = if interactive {
        if !quiet {
            eprintln!("{}", TRANSPORT_HELP.dimmed());
        }
        drive_interactive(&player, &mut events, &text, quiet, verbosity).await
    } else {
        follow_until_done(&player, &mut events, quiet, verbosity).await
    };

    player.shutdown().await;
    outcome
}

fn player_has_work(config: &Config, text: &str) -> bool {
    let chunker = TextChunker::with_config(ChunkerConfig {
        min_chunk_chars: config.speech.min_chunk_chars,
    });
    !chunker.chunk(text).is_empty()
}

fn show(event: &PlaybackEvent, player: &SpeechPlayer, quiet: bool, verbosity: u8) {
    if quiet {
        return;
    }
    if let Some(line) = render_event(event, player.state().chunk_count, verbosity) {
        eprintln!("{}", line);
    }
}

async fn follow_until_done(
    player: &SpeechPlayer,
    events: &mut tokio::sync::broadcast::Receiver<PlaybackEvent>,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    show(&event, player, quiet, verbosity);
                    match event {
                        PlaybackEvent::Finished | PlaybackEvent::Stopped => return Ok(()),
                        PlaybackEvent::ChunkFailed { index, message, .. } => {
                            return Err(SpeechError::Other(format!(
                                "playback stopped at chunk {}: {}",
                                index + 1,
                                message
                            )));
                        }
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::debug!("skipped {} playback events", n),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn drive_interactive(
    player: &SpeechPlayer,
    events: &mut tokio::sync::broadcast::Receiver<PlaybackEvent>,
    text: &str,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match parse_transport_command(&line) {
                    Some(TransportCommand::Stop) => player.stop(),
                    Some(TransportCommand::Repeat) => player.repeat_current_chunk(),
                    Some(TransportCommand::ReplayAll) => player.replay_all(),
                    Some(TransportCommand::PlayAgain) => player.play_text(text),
                    Some(TransportCommand::Quit) => return Ok(()),
                    None if line.trim().is_empty() => {}
                    None => eprintln!("{}", TRANSPORT_HELP.dimmed()),
                }
            }
            event = events.recv() => match event {
                Ok(event) => show(&event, player, quiet, verbosity),
                Err(RecvError::Lagged(n)) => tracing::debug!("skipped {} playback events", n),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Print the chunks `text` would be spoken in.
pub fn run_chunk_command(config: &Config, text: Option<String>, min_chars: Option<usize>) -> Result<()> {
    let text = read_text(text)?;
    let chunker = TextChunker::with_config(ChunkerConfig {
        min_chunk_chars: min_chars.unwrap_or(config.speech.min_chunk_chars),
    });

    for segment in chunker.segments(&text) {
        println!(
            "{} {}",
            format!("[{}]", segment.index).dimmed(),
            segment.text
        );
    }
    Ok(())
}

//! Command-line interface for agrispeak
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Chunked speech playback for analysis read-outs
#[derive(Parser, Debug)]
#[command(
    name = "agrispeak",
    version,
    about = "Chunked speech playback for analysis read-outs"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: chunk progress, -vv: engine diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Speak text chunk by chunk (reads stdin when TEXT is omitted)
    Speak(SpeakArgs),

    /// Print the chunks a text would be spoken in
    Chunk {
        /// Text to split (reads stdin when omitted)
        text: Option<String>,

        /// Minimum characters per chunk before a sentence boundary closes it
        #[arg(long, value_name = "CHARS")]
        min_chars: Option<usize>,
    },

    /// List audio output devices
    Devices,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Arguments for `agrispeak speak`
#[derive(clap::Args, Debug, Default)]
pub struct SpeakArgs {
    /// Text to speak
    pub text: Option<String>,

    /// Voice name (e.g., Puck, Kore)
    #[arg(long, value_name = "VOICE")]
    pub voice: Option<String>,

    /// Language code: en, hi or mr
    #[arg(long, short = 'l', value_name = "LANG")]
    pub language: Option<String>,

    /// Playback gain between 0.0 and 1.0
    #[arg(long, value_name = "GAIN")]
    pub volume: Option<f32>,

    /// Audio output device name
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Write each chunk to DIR as a WAV file instead of playing it
    #[arg(long, value_name = "DIR")]
    pub wav_dir: Option<PathBuf>,

    /// Synthesis request timeout. Examples: 30s, 2m
    #[arg(long, short = 't', value_name = "DURATION", value_parser = parse_timeout_secs)]
    pub timeout: Option<u64>,

    /// Synthesis service endpoint URL
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file, environment and defaults merged)
    Show,
    /// Print the configuration file path
    Path,
}

/// Parse a timeout string into whole seconds.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `2m`), and compound (`1m30s`).
fn parse_timeout_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

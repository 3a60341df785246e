//! Error types for agrispeak.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Synthesis errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Decoding errors
    #[error("Audio decode failed: {message}")]
    Decode { message: String },

    // Output device errors
    #[error("Audio output device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio output failed: {message}")]
    AudioOutput { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`SpeechError`], used in logs and playback events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Synthesis,
    Decode,
    Device,
    Config,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Synthesis => "synthesis",
            ErrorKind::Decode => "decode",
            ErrorKind::Device => "device",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl SpeechError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpeechError::Synthesis { .. } => ErrorKind::Synthesis,
            SpeechError::Decode { .. } => ErrorKind::Decode,
            SpeechError::AudioDeviceNotFound { .. } | SpeechError::AudioOutput { .. } => {
                ErrorKind::Device
            }
            SpeechError::ConfigFileNotFound { .. }
            | SpeechError::ConfigParse { .. }
            | SpeechError::ConfigInvalidValue { .. }
            | SpeechError::Config(_) => ErrorKind::Config,
            SpeechError::Io(_) | SpeechError::Other(_) => ErrorKind::Other,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SpeechError>;

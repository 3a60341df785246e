use crate::defaults;
use crate::error::{Result, SpeechError};
use crate::synth::voice::Language;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub service: ServiceConfig,
    pub output: OutputConfig,
}

/// Voice, language and playback preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub voice: String,
    pub language: Language,
    pub volume: f32,
    pub min_chunk_chars: usize,
}

/// Synthesis service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub endpoint: String,
    /// Per-request timeout; `None` waits as long as the service takes.
    pub timeout_secs: Option<u64>,
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub device: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: defaults::DEFAULT_VOICE.to_string(),
            language: Language::default(),
            volume: defaults::DEFAULT_VOLUME,
            min_chunk_chars: defaults::MIN_CHUNK_CHARS,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::DEFAULT_ENDPOINT.to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    ///
    /// # Errors
    /// `ConfigFileNotFound` if the file does not exist, `Config` for invalid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpeechError::ConfigFileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(SpeechError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - AGRISPEAK_VOICE → speech.voice
    /// - AGRISPEAK_LANGUAGE → speech.language (ignored if not a known code)
    /// - AGRISPEAK_ENDPOINT → service.endpoint
    /// - AGRISPEAK_OUTPUT_DEVICE → output.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(voice) = std::env::var("AGRISPEAK_VOICE")
            && !voice.is_empty()
        {
            self.speech.voice = voice;
        }

        if let Ok(language) = std::env::var("AGRISPEAK_LANGUAGE")
            && !language.is_empty()
        {
            match language.parse() {
                Ok(language) => self.speech.language = language,
                Err(e) => tracing::warn!("Ignoring AGRISPEAK_LANGUAGE: {}", e),
            }
        }

        if let Ok(endpoint) = std::env::var("AGRISPEAK_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.service.endpoint = endpoint;
        }

        if let Ok(device) = std::env::var("AGRISPEAK_OUTPUT_DEVICE")
            && !device.is_empty()
        {
            self.output.device = Some(device);
        }

        self
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.speech.volume) {
            return Err(SpeechError::ConfigInvalidValue {
                key: "speech.volume".to_string(),
                message: format!("{} is not between 0.0 and 1.0", self.speech.volume),
            });
        }

        if self.speech.min_chunk_chars == 0 {
            return Err(SpeechError::ConfigInvalidValue {
                key: "speech.min_chunk_chars".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let endpoint = self.service.endpoint.as_str();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(SpeechError::ConfigInvalidValue {
                key: "service.endpoint".to_string(),
                message: format!("'{}' is not an http(s) URL", endpoint),
            });
        }

        if self.service.timeout_secs == Some(0) {
            return Err(SpeechError::ConfigInvalidValue {
                key: "service.timeout_secs".to_string(),
                message: "must be positive when set".to_string(),
            });
        }

        Ok(())
    }

    /// Serialize to TOML, as written by `agrispeak config show`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SpeechError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/agrispeak/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("agrispeak").join("config.toml"))
            .ok_or_else(|| SpeechError::Other("Could not determine config directory".to_string()))
    }
}

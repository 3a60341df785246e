//! Languages and voice selection for the synthesis service.

use crate::defaults;
use crate::error::SpeechError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the analysis text can be spoken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Mr,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Hi, Language::Mr];

    /// ISO 639-1 code sent to the synthesis service.
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Mr => "mr",
        }
    }

    /// Whether the language needs the Indic voice by default.
    pub fn is_indic(self) -> bool {
        matches!(self, Language::Hi | Language::Mr)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| SpeechError::ConfigInvalidValue {
                key: "language".to_string(),
                message: format!("unsupported language '{}' (expected en, hi or mr)", s),
            })
    }
}

/// Pick the voice actually requested from the service.
///
/// An empty or default voice is swapped for the Indic voice when speaking
/// Hindi or Marathi; any explicitly chosen voice is kept as is.
pub fn resolve_voice(voice: &str, language: Language) -> String {
    let voice = voice.trim();
    if voice.is_empty() || voice == defaults::DEFAULT_VOICE {
        if language.is_indic() {
            defaults::INDIC_VOICE.to_string()
        } else {
            defaults::DEFAULT_VOICE.to_string()
        }
    } else {
        voice.to_string()
    }
}

//! Voice catalog and prompt formatting.
//!
//! The model was fine-tuned on a closed set of speakers; the voice tag is
//! written verbatim into the prompt ahead of the text:
//!
//! ```text
//! <|audio|>tara: Hello there.<|eot_id|>
//! ```

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// Marker that opens an audio-generation turn.
pub const PROMPT_START: &str = "<|audio|>";

/// End-of-turn marker closing the prompt.
pub const PROMPT_END: &str = "<|eot_id|>";

/// Non-verbal tags the model renders when they appear inline in the text.
pub const EMOTION_TAGS: &[&str] = &[
    "<laugh>", "<chuckle>", "<sigh>", "<gasp>", "<yawn>", "<groan>", "<cough>", "<sniffle>",
];

/// A speaker from the fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Voice {
    #[default]
    Tara,
    Leah,
    Jess,
    Leo,
    Dan,
    Mia,
    Zac,
    Zoe,
}

impl Voice {
    pub const ALL: [Voice; 8] = [
        Voice::Tara,
        Voice::Leah,
        Voice::Jess,
        Voice::Leo,
        Voice::Dan,
        Voice::Mia,
        Voice::Zac,
        Voice::Zoe,
    ];

    /// The tag the model expects in the prompt.
    pub fn tag(self) -> &'static str {
        match self {
            Voice::Tara => "tara",
            Voice::Leah => "leah",
            Voice::Jess => "jess",
            Voice::Leo => "leo",
            Voice::Dan => "dan",
            Voice::Mia => "mia",
            Voice::Zac => "zac",
            Voice::Zoe => "zoe",
        }
    }

    /// All catalog tags, in catalog order.
    pub fn tags() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.tag()).collect()
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Voice {
    type Err = Error;

    /// Tags are matched exactly (they are lowercase in the catalog).
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.tag() == s)
            .ok_or_else(|| Error::UnknownVoice { voice: s.to_string(), available: Self::tags() })
    }
}

/// Build the model input for `text` spoken by `voice`.
///
/// Input validation (non-empty text) is the caller's job; see [`validate_text`].
pub fn format_prompt(voice: Voice, text: &str) -> String {
    format!("{PROMPT_START}{}: {text}{PROMPT_END}", voice.tag())
}

/// Trim `text` and reject it when nothing is left.
pub fn validate_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::EmptyText);
    }
    Ok(text)
}

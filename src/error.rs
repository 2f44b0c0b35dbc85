//! Error taxonomy for the decode pipeline.
//!
//! Token-level and window-level problems never show up here: a malformed
//! custom token or an out-of-range window is skipped by the stage that sees
//! it.  What remains is input validation, the terminal "no audio" outcome and
//! resource failures from the token source, the codec or the filesystem.

use thiserror::Error;

/// Errors surfaced to callers of the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// No text was provided, or the text was whitespace only.
    #[error("no text to synthesise (provide --text or --file)")]
    EmptyText,

    /// The voice tag is not part of the fixed catalog.
    #[error("unknown voice '{voice}'. Available: {}", available.join(", "))]
    UnknownVoice { voice: String, available: Vec<&'static str> },

    /// Generation ended without a single decodable window.
    #[error("no audio generated")]
    NoAudio,

    /// The codec decoder failed while decoding a window.
    #[error("codec error: {0}")]
    Codec(String),

    /// The token source failed while producing the next token.
    #[error("token source error: {0}")]
    TokenSource(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Token sources — the pull side of the pipeline.
//!
//! The generative model is only ever seen through [`TokenSource`]: a lazy,
//! finite sequence of vocabulary ids, each renderable as text.  Pulling the
//! next id is the only place the pipeline waits; a source backed by a running
//! model blocks there while the model computes.
//!
//! | Source            | Backing                                          |
//! |-------------------|--------------------------------------------------|
//! | [`ScriptedSource`]| in-memory id list (recorded generations, tests)  |
//! | [`LineSource`]    | any `BufRead`, one token per line (files, stdin) |
//! | [`ChannelSource`] | `mpsc::Receiver` fed by a generator thread       |

use std::{collections::HashMap, io::BufRead, sync::mpsc::Receiver};

use tracing::debug;

use crate::{
    config::SamplingParams,
    error::{Error, Result},
    tokenize::render_token,
};

/// Vocabulary id emitted by the model.
pub type TokenId = u32;

/// `<|eot_id|>`.
pub const END_OF_TURN_ID: TokenId = 128_009;

/// Ids that end generation, but only after audio has started: the
/// model emits some of them as preamble before the first audio token.
pub const TERMINATOR_IDS: [TokenId; 4] = [END_OF_TURN_ID, 128_257, 128_260, 128_261];

/// A lazy sequence of generated tokens.
pub trait TokenSource {
    /// Pull the next token, blocking until it is available.
    ///
    /// `Ok(None)` means the source is exhausted (model end-of-generation or
    /// the source's own token budget).
    fn next_token(&mut self) -> Result<Option<TokenId>>;

    /// Text rendering of `id`.
    fn token_text(&self, id: TokenId) -> String {
        render_token(id)
    }
}

impl<S: TokenSource + ?Sized> TokenSource for Box<S> {
    fn next_token(&mut self) -> Result<Option<TokenId>> {
        (**self).next_token()
    }

    fn token_text(&self, id: TokenId) -> String {
        (**self).token_text(id)
    }
}

/// A generative model that can be started on a prompt.
pub trait SpeechModel {
    /// Begin generating for `prompt`, producing at most `max_tokens` tokens
    /// of any kind (the engine passes [`GenerationConfig::source_budget`]).
    ///
    /// [`GenerationConfig::source_budget`]: crate::config::GenerationConfig::source_budget
    fn start<'a>(
        &'a self,
        prompt: &str,
        sampling: &SamplingParams,
        max_tokens: usize,
    ) -> Result<Box<dyn TokenSource + 'a>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// ScriptedSource
// ─────────────────────────────────────────────────────────────────────────────

/// Replays a fixed list of ids.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    ids: Vec<TokenId>,
    pos: usize,
    max_tokens: usize,
}

impl ScriptedSource {
    pub fn new(ids: Vec<TokenId>) -> Self {
        Self { ids, pos: 0, max_tokens: usize::MAX }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl TokenSource for ScriptedSource {
    fn next_token(&mut self) -> Result<Option<TokenId>> {
        if self.pos >= self.max_tokens {
            return Ok(None);
        }
        let id = self.ids.get(self.pos).copied();
        self.pos += 1;
        Ok(id)
    }
}

/// A [`SpeechModel`] that ignores the prompt and replays a recorded
/// generation.
#[derive(Debug, Clone)]
pub struct ReplayModel {
    ids: Vec<TokenId>,
}

impl ReplayModel {
    pub fn new(ids: Vec<TokenId>) -> Self {
        Self { ids }
    }
}

impl SpeechModel for ReplayModel {
    fn start<'a>(
        &'a self,
        prompt: &str,
        sampling: &SamplingParams,
        max_tokens: usize,
    ) -> Result<Box<dyn TokenSource + 'a>> {
        debug!(prompt, ?sampling, max_tokens, "replaying recorded generation");
        Ok(Box::new(ScriptedSource::new(self.ids.clone()).with_max_tokens(max_tokens)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LineSource
// ─────────────────────────────────────────────────────────────────────────────

/// Reads one token per line from a buffered reader.
///
/// Line format: `ID` or `ID<whitespace>TEXT`.  When `TEXT` is given it is
/// used as the token's rendering; otherwise the default custom-token
/// rendering applies.  Blank lines and lines starting with `#` are skipped.
/// Invalid UTF-8 in `TEXT` is replaced, not rejected; such text simply fails
/// to map to an audio index.
pub struct LineSource<R> {
    reader: R,
    line_no: usize,
    pulled: usize,
    max_tokens: usize,
    texts: HashMap<TokenId, String>,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line_no: 0, pulled: 0, max_tokens: usize::MAX, texts: HashMap::new() }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn parse_line(&mut self, line: &str) -> Result<TokenId> {
        let (id, text) = match line.split_once(char::is_whitespace) {
            Some((id, text)) => (id, Some(text.trim())),
            None => (line, None),
        };
        let id: TokenId = id.parse().map_err(|_| {
            Error::TokenSource(format!("line {}: expected a token id, got {:?}", self.line_no, line))
        })?;
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.texts.insert(id, text.to_string());
        }
        Ok(id)
    }
}

impl<R: BufRead> TokenSource for LineSource<R> {
    fn next_token(&mut self) -> Result<Option<TokenId>> {
        if self.pulled >= self.max_tokens {
            return Ok(None);
        }
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            // Byte-fallback tokens can carry partial UTF-8; only the id must be clean.
            let line = String::from_utf8_lossy(&buf);
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let id = self.parse_line(trimmed)?;
            self.pulled += 1;
            return Ok(Some(id));
        }
    }

    fn token_text(&self, id: TokenId) -> String {
        self.texts.get(&id).cloned().unwrap_or_else(|| render_token(id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChannelSource
// ─────────────────────────────────────────────────────────────────────────────

/// Pulls ids from a channel; a closed channel ends generation.
pub struct ChannelSource {
    rx: Receiver<TokenId>,
    pulled: usize,
    max_tokens: usize,
}

impl ChannelSource {
    pub fn new(rx: Receiver<TokenId>) -> Self {
        Self { rx, pulled: 0, max_tokens: usize::MAX }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl TokenSource for ChannelSource {
    fn next_token(&mut self) -> Result<Option<TokenId>> {
        if self.pulled >= self.max_tokens {
            return Ok(None);
        }
        match self.rx.recv() {
            Ok(id) => {
                self.pulled += 1;
                Ok(Some(id))
            }
            Err(_) => Ok(None),
        }
    }
}

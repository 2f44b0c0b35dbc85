//! Token classifier — decides which generated tokens are audio and when
//! generation is over.
//!
//! ```text
//!            audio token                 terminator
//! PreAudio ──────────────▶ InAudio ─────────────────▶ Done
//!    │  ▲                     │
//!    └──┘ terminator          └── audio token count reaches the cap ─▶ Done
//!         (preamble, ignored)
//! ```
//!
//! The model emits several terminator-valued tokens before audio begins, so a
//! terminator only ends generation once at least one audio token has been
//! accepted.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{source::TokenId, tokenize::map_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    PreAudio,
    InAudio,
    Done,
}

/// Why the classifier reached [`ClassifierState::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A terminator arrived after audio had started.
    Terminator,
    /// The accepted-token cap was reached; output is truncated, not failed.
    TokenCap,
    /// The source ran dry before either of the above.
    SourceExhausted,
}

/// Outcome of classifying one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An audio token mapped to this codebook index; append it.
    Accept(i64),
    /// Not audio (control preamble, text, malformed or non-positive index).
    Skip,
    /// Generation is complete; stop pulling.
    Stop,
}

/// The per-call classifier state machine.
#[derive(Debug)]
pub struct TokenClassifier {
    state: ClassifierState,
    accepted: usize,
    max_tokens: usize,
    stop_ids: HashSet<TokenId>,
    stop_reason: Option<StopReason>,
}

impl TokenClassifier {
    pub fn new(stop_ids: impl IntoIterator<Item = TokenId>, max_tokens: usize) -> Self {
        Self {
            state: ClassifierState::PreAudio,
            accepted: 0,
            max_tokens,
            stop_ids: stop_ids.into_iter().collect(),
            stop_reason: None,
        }
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// Audio tokens accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn is_done(&self) -> bool {
        self.state == ClassifierState::Done
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Classify token `id`.  `text` renders it and is only called for
    /// non-terminators.
    pub fn classify(&mut self, id: TokenId, text: impl FnOnce() -> String) -> Step {
        if self.is_done() {
            return Step::Stop;
        }

        let step = if self.stop_ids.contains(&id) {
            match self.state {
                ClassifierState::InAudio => {
                    debug!(id, accepted = self.accepted, "terminator after audio");
                    self.finish(StopReason::Terminator);
                    return Step::Stop;
                }
                _ => {
                    debug!(id, "terminator before audio ignored");
                    Step::Skip
                }
            }
        } else {
            match map_token(&text(), self.accepted) {
                Some(index) if index > 0 => {
                    if self.state == ClassifierState::PreAudio {
                        debug!("first audio token");
                        self.state = ClassifierState::InAudio;
                    }
                    self.accepted += 1;
                    Step::Accept(index)
                }
                _ => Step::Skip,
            }
        };

        if self.accepted >= self.max_tokens {
            warn!(max_tokens = self.max_tokens, "audio token cap reached, truncating");
            self.finish(StopReason::TokenCap);
        }
        step
    }

    /// Record that the source ended on its own.
    pub fn source_exhausted(&mut self) {
        if !self.is_done() {
            self.finish(StopReason::SourceExhausted);
        }
    }

    fn finish(&mut self, reason: StopReason) {
        self.state = ClassifierState::Done;
        self.stop_reason = Some(reason);
    }
}

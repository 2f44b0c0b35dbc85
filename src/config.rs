//! Generation settings.
//!
//! Every field has a default matching the reference Orpheus setup, so a JSON
//! file only needs the keys it wants to change:
//!
//! ```json
//! { "max_tokens": 4096, "sampling": { "temperature": 0.7 }, "quantize": "wrap" }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::codec::QuantizePolicy;
use crate::source::{TokenId, TERMINATOR_IDS};

/// Upper bound on accepted audio tokens.
pub const DEFAULT_MAX_TOKENS: usize = 8192;

/// Upper bound on tokens pulled from the source, audio or not.
pub const DEFAULT_CONTEXT_TOKENS: usize = 16_384;

/// Sampling knobs forwarded untouched to the token source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self { temperature: 0.6, top_p: 0.9, repetition_penalty: 1.1 }
    }
}

/// Settings for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Cap on accepted audio tokens; reaching it truncates the output.
    pub max_tokens: usize,
    /// Pull budget handed to the token source.  Preamble and control tokens
    /// count against it, so it should leave headroom above `max_tokens`.
    pub context_tokens: usize,
    pub sampling: SamplingParams,
    /// Ids that end generation once audio has started.
    pub stop_token_ids: Vec<TokenId>,
    pub quantize: QuantizePolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            context_tokens: DEFAULT_CONTEXT_TOKENS,
            sampling: SamplingParams::default(),
            stop_token_ids: TERMINATOR_IDS.to_vec(),
            quantize: QuantizePolicy::default(),
        }
    }
}

impl GenerationConfig {
    /// Read a (partial) config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read config: {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Tokens a source may produce: `context_tokens`, never below `max_tokens`.
    pub fn source_budget(&self) -> usize {
        self.context_tokens.max(self.max_tokens)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_tokens == 0 {
            return Err(crate::Error::Config("max_tokens must be positive".into()));
        }
        if !(self.sampling.top_p > 0.0 && self.sampling.top_p <= 1.0) {
            return Err(crate::Error::Config(format!(
                "top_p must be in (0, 1], got {}",
                self.sampling.top_p
            )));
        }
        if self.sampling.temperature < 0.0 {
            return Err(crate::Error::Config(format!(
                "temperature must be non-negative, got {}",
                self.sampling.temperature
            )));
        }
        Ok(())
    }
}

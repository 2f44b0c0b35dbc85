//! HuggingFace Hub codec downloader.
//!
//! Fetches `config.json` and the decoder ONNX graph of a SNAC export, checks
//! the sample rate, then constructs a [`SnacOnnx`].

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use hf_hub::api::sync::Api;
use serde::Deserialize;
use tracing::info;

use crate::{model::SnacOnnx, writer::SAMPLE_RATE};

/// Default SNAC export.
pub const DEFAULT_CODEC_REPO: &str = "onnx-community/snac_24khz-ONNX";

/// Decoder graph inside [`DEFAULT_CODEC_REPO`].
pub const DEFAULT_DECODER_FILE: &str = "onnx/decoder_model.onnx";

/// The subset of a SNAC `config.json` the pipeline depends on.
#[derive(Debug, Deserialize)]
pub struct CodecConfig {
    pub sampling_rate: u32,

    /// Samples per coarse code step; informational.
    #[serde(default)]
    pub hop_length: Option<u32>,
}

fn hf_download(api: &Api, repo_id: &str, filename: &str) -> Result<PathBuf> {
    let repo = api.model(repo_id.to_string());
    repo.get(filename)
        .with_context(|| format!("Failed to download '{}' from '{}'", filename, repo_id))
}

/// Download (or reuse from cache) a SNAC decoder and load it.
///
/// Files are cached in the HuggingFace Hub cache directory
/// (`~/.cache/huggingface/hub` by default).
///
/// ```no_run
/// let codec = orpheus_tts::download::load_codec_from_hub(
///     orpheus_tts::download::DEFAULT_CODEC_REPO,
///     orpheus_tts::download::DEFAULT_DECODER_FILE,
/// ).unwrap();
/// ```
pub fn load_codec_from_hub(repo_id: &str, decoder_file: &str) -> Result<SnacOnnx> {
    info!(repo_id, "fetching codec config");
    let api = Api::new().context("Failed to initialise HuggingFace Hub client")?;

    let config_path = hf_download(&api, repo_id, "config.json")?;
    let config_bytes = std::fs::read(&config_path)
        .with_context(|| format!("Cannot read config: {}", config_path.display()))?;
    let config: CodecConfig =
        serde_json::from_slice(&config_bytes).context("Failed to parse codec config.json")?;
    check_config(&config)?;

    info!(decoder_file, "fetching codec decoder");
    let model_path = hf_download(&api, repo_id, decoder_file)?;
    SnacOnnx::load(&model_path)
}

/// [`load_codec_from_hub`] with the default repository and file.
pub fn load_default_codec() -> Result<SnacOnnx> {
    load_codec_from_hub(DEFAULT_CODEC_REPO, DEFAULT_DECODER_FILE)
}

fn check_config(config: &CodecConfig) -> Result<()> {
    if config.sampling_rate != SAMPLE_RATE {
        bail!(
            "Unsupported codec sample rate {} Hz, expected {} Hz",
            config.sampling_rate,
            SAMPLE_RATE
        );
    }
    Ok(())
}

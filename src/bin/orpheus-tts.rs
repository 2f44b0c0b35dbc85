//! `orpheus-tts` — decode Orpheus token streams into WAV.
//!
//! Usage:
//!   orpheus-tts voices
//!   orpheus-tts prompt --voice leah --text "Hello world" --json
//!   my-generator | orpheus-tts decode --tokens - --output output.wav
//!   orpheus-tts decode --tokens run.tokens --codec-model snac_decoder.onnx

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orpheus_tts::{
    download::{load_codec_from_hub, DEFAULT_CODEC_REPO, DEFAULT_DECODER_FILE},
    voice::{format_prompt, validate_text, EMOTION_TAGS},
    Engine, GenerationConfig, LineSource, QuantizePolicy, SamplingParams, SnacOnnx, Voice,
};

#[derive(Debug, Parser)]
#[command(name = "orpheus-tts")]
#[command(about = "Decode Orpheus speech-token streams into 24 kHz WAV via SNAC")]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List voices and inline emotion tags.
    Voices,
    /// Print the model prompt for a text.
    Prompt(PromptArgs),
    /// Decode a token stream into a WAV file.
    Decode(DecodeArgs),
}

#[derive(Debug, Clone, Args)]
struct TextInput {
    /// Text to synthesise.
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
    /// Text file to synthesise.
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,
}

impl TextInput {
    fn read(&self) -> Result<String> {
        let text = match (&self.text, &self.file) {
            (_, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read text file: {}", path.display()))?,
            (Some(text), None) => text.clone(),
            (None, None) => String::new(),
        };
        Ok(validate_text(&text)?.to_string())
    }
}

#[derive(Debug, Args)]
struct PromptArgs {
    #[command(flatten)]
    text: TextInput,
    #[arg(long, default_value_t = Voice::default().tag().to_string())]
    voice: String,
    /// Emit a JSON request with the sampling parameters for an external generator.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    overrides: ConfigOverrides,
    #[command(flatten)]
    sampling: SamplingOverrides,
}

#[derive(Debug, Args)]
struct DecodeArgs {
    /// Token stream: one id per line (`ID` or `ID TEXT`); `-` reads stdin.
    #[arg(long)]
    tokens: PathBuf,
    #[arg(long, default_value = "output.wav")]
    output: PathBuf,
    /// Local SNAC decoder ONNX file (skips the HuggingFace download).
    #[arg(long, conflicts_with = "codec_repo")]
    codec_model: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_CODEC_REPO)]
    codec_repo: String,
    #[arg(long, default_value = DEFAULT_DECODER_FILE)]
    codec_file: String,
    #[command(flatten)]
    overrides: ConfigOverrides,
}

/// Settings that shape the decode itself.
#[derive(Debug, Args)]
struct ConfigOverrides {
    /// JSON generation config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Audio token cap.
    #[arg(long)]
    max_tokens: Option<usize>,
    #[arg(long, value_enum)]
    quantize: Option<QuantizePolicy>,
}

impl ConfigOverrides {
    fn resolve(&self) -> Result<GenerationConfig> {
        self.resolve_with(|_| {})
    }

    fn resolve_with(&self, extra: impl FnOnce(&mut GenerationConfig)) -> Result<GenerationConfig> {
        let mut config = match &self.config {
            Some(path) => GenerationConfig::from_json_file(path)?,
            None => GenerationConfig::default(),
        };
        if let Some(v) = self.max_tokens {
            config.max_tokens = v;
        }
        if let Some(v) = self.quantize {
            config.quantize = v;
        }
        extra(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Settings only an external generator consumes; `prompt` forwards them.
#[derive(Debug, Args)]
struct SamplingOverrides {
    /// Total tokens the generator may emit, preamble included.
    #[arg(long)]
    context_tokens: Option<usize>,
    #[arg(long)]
    temperature: Option<f32>,
    #[arg(long)]
    top_p: Option<f32>,
    #[arg(long)]
    repetition_penalty: Option<f32>,
}

impl SamplingOverrides {
    fn apply(&self, config: &mut GenerationConfig) {
        if let Some(v) = self.context_tokens {
            config.context_tokens = v;
        }
        if let Some(v) = self.temperature {
            config.sampling.temperature = v;
        }
        if let Some(v) = self.top_p {
            config.sampling.top_p = v;
        }
        if let Some(v) = self.repetition_penalty {
            config.sampling.repetition_penalty = v;
        }
    }
}

/// Request object printed by `prompt --json`.
#[derive(Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    max_tokens: usize,
    #[serde(flatten)]
    sampling: SamplingParams,
    stop_token_ids: &'a [u32],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Voices => {
            println!("Available voices: {}", Voice::tags().join(", "));
            println!("Default: {}", Voice::default());
            println!("\nEmotion tags: {}", EMOTION_TAGS.join(" "));
            Ok(())
        }
        Commands::Prompt(args) => run_prompt(args),
        Commands::Decode(args) => run_decode(args),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn run_prompt(args: PromptArgs) -> Result<()> {
    let text = args.text.read()?;
    let voice: Voice = args.voice.parse()?;
    let config = args.overrides.resolve_with(|c| args.sampling.apply(c))?;
    let prompt = format_prompt(voice, &text);

    if args.json {
        let request = GenerationRequest {
            prompt: &prompt,
            max_tokens: config.source_budget(),
            sampling: config.sampling,
            stop_token_ids: &config.stop_token_ids,
        };
        println!("{}", serde_json::to_string_pretty(&request)?);
    } else {
        println!("{prompt}");
    }
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    // Input problems surface before any model is loaded.
    let config = args.overrides.resolve()?;
    let reader: Box<dyn BufRead> = if args.tokens.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.tokens)
            .with_context(|| format!("Cannot open token stream: {}", args.tokens.display()))?;
        Box::new(BufReader::new(file))
    };

    let codec = match &args.codec_model {
        Some(path) => SnacOnnx::load(path)?,
        None => load_codec_from_hub(&args.codec_repo, &args.codec_file)?,
    };
    let engine = Engine::new(codec, config)?;

    let mut source = LineSource::new(reader);
    let decoded = engine.decode_stream(&mut source)?;
    let summary = decoded.write_wav(&args.output)?;

    info!(
        windows = decoded.stats.windows,
        dropped = decoded.stats.dropped_windows,
        audio_tokens = decoded.stats.audio_tokens,
        stop = ?decoded.stats.stop_reason,
        "decode complete"
    );
    println!("{:.1}s audio → {}", summary.duration_secs, args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_decode_rejects_sampling_flags() {
        for flag in ["--temperature", "--top-p", "--repetition-penalty", "--context-tokens"] {
            let parsed = Cli::try_parse_from(["orpheus-tts", "decode", "--tokens", "-", flag, "0.5"]);
            assert!(parsed.is_err(), "decode accepted {flag}");
        }
    }

    #[test]
    fn test_prompt_applies_sampling_flags() {
        let cli = Cli::try_parse_from([
            "orpheus-tts", "prompt", "--text", "hi", "--temperature", "0.7", "--max-tokens", "100",
        ])
        .unwrap();
        let Commands::Prompt(args) = cli.command else {
            panic!("expected prompt subcommand");
        };
        let config = args.overrides.resolve_with(|c| args.sampling.apply(c)).unwrap();
        assert_eq!(config.sampling.temperature, 0.7);
        assert_eq!(config.max_tokens, 100);
    }
}

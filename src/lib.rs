//! # orpheus_tts
//!
//! Streaming decoder for [Orpheus](https://github.com/canopyai/Orpheus-TTS)
//! style speech models: the language model speaks in `<custom_token_N>`
//! tokens, this crate turns that live token stream into 24 kHz 16-bit mono
//! WAV through the [SNAC](https://github.com/hubertsiuzdak/snac) codec.
//!
//! ## Quick start
//!
//! ```no_run
//! use orpheus_tts::{download, Engine, GenerationConfig, LineSource};
//!
//! // Fetch the SNAC decoder from HuggingFace (cached after first run)
//! let codec = download::load_default_codec().unwrap();
//! let engine = Engine::new(codec, GenerationConfig::default()).unwrap();
//!
//! // Token ids, one per line, as the model generates them
//! let stdin = std::io::stdin().lock();
//! let audio = engine.decode_stream(&mut LineSource::new(stdin)).unwrap();
//! audio.write_wav(std::path::Path::new("output.wav")).unwrap();
//! ```
//!
//! With a model bound to [`SpeechModel`], [`Engine::synthesize_to_file`]
//! formats the prompt for a [`Voice`], runs the model and writes the file.
//!
//! ## Plugging in a language model
//!
//! The crate does not run the language model itself.  Any generator that
//! yields token ids (a llama.cpp binding, an HTTP client streaming from an
//! inference server) becomes a [`SpeechModel`] by running on its own thread
//! and feeding a [`ChannelSource`]:
//!
//! ```
//! use std::sync::mpsc::{self, Sender};
//! use orpheus_tts::{
//!     tokenize::audio_token_id, ChannelSource, Engine, GenerationConfig, Result,
//!     SamplingParams, SnacCodes, SpeechModel, TokenSource, Voice,
//! };
//!
//! struct ThreadedModel<F>(F);
//!
//! impl<F> SpeechModel for ThreadedModel<F>
//! where
//!     F: Fn(String, Sender<u32>) + Clone + Send + 'static,
//! {
//!     fn start<'a>(
//!         &'a self,
//!         prompt: &str,
//!         _sampling: &SamplingParams,
//!         max_tokens: usize,
//!     ) -> Result<Box<dyn TokenSource + 'a>> {
//!         let (tx, rx) = mpsc::channel();
//!         let (generate, prompt) = (self.0.clone(), prompt.to_string());
//!         std::thread::spawn(move || generate(prompt, tx));
//!         Ok(Box::new(ChannelSource::new(rx).with_max_tokens(max_tokens)))
//!     }
//! }
//!
//! // Stand-in generator: one window of audio, then end-of-turn.
//! let model = ThreadedModel(|prompt: String, tx: Sender<u32>| {
//!     assert!(prompt.starts_with("<|audio|>tara: "));
//!     for pos in 0..28 {
//!         let _ = tx.send(audio_token_id(100, pos));
//!     }
//!     let _ = tx.send(128_009);
//! });
//!
//! // Stand-in codec; use `download::load_default_codec()` for real audio.
//! let codec = |_: &SnacCodes| -> Result<Vec<f32>> { Ok(vec![0.1; 8192]) };
//! let engine = Engine::new(codec, GenerationConfig::default())?;
//!
//! let dir = tempfile::tempdir()?;
//! let report = engine.synthesize_to_file(&model, Voice::Tara, "Hello", &dir.path().join("hi.wav"))?;
//! assert_eq!(report.wav.samples, 2048);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Pipeline
//! 1. **Prompt** — `<|audio|>{voice}: {text}<|eot_id|>`.
//! 2. **Classify** — skip preamble terminators, accept `<custom_token_N>`
//!    audio tokens, stop on a terminator once audio started or at the cap.
//! 3. **Map** — `N - 10 - (i mod 7) * 4096` gives the codebook index.
//! 4. **Buffer** — every completed frame past the fourth yields a 28-index
//!    window (last four frames).
//! 5. **Decode** — deinterleave into 4/8/16 SNAC codes, range-check, run the
//!    codec, keep the second frame's 2048 samples, quantize to 16-bit.
//! 6. **Write** — concatenate segments into a single WAV.

// Codec download from HuggingFace Hub is desktop-only; mobile apps bundle the
// decoder graph and load it through the C ABI.
#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod download;

// C FFI for iOS / Android.
pub mod ffi;

pub mod classify;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod tokenize;
pub mod voice;
pub mod writer;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use codec::{CodecDecoder, QuantizePolicy, SnacCodes};
pub use config::{GenerationConfig, SamplingParams};
pub use error::{Error, Result};
pub use model::SnacOnnx;
pub use pipeline::{DecodedAudio, Engine, GenerationStats, SynthesisReport};
pub use source::{ChannelSource, LineSource, ReplayModel, ScriptedSource, SpeechModel, TokenSource};
pub use voice::Voice;

/// Audio sample rate of the generated WAV.
pub use writer::SAMPLE_RATE;

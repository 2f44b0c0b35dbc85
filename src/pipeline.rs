//! The generation loop.
//!
//! ```text
//! TokenSource ─▶ TokenClassifier ─▶ FrameBuffer ─▶ codec bridge ─▶ StreamWriter
//!   (pull)        (map + accept)     (window?)      (decode/PCM)     (collect)
//! ```
//!
//! One thread drives everything.  Pulling the next token is the only place
//! the loop waits on the model; codec calls are synchronous, so windows are
//! decoded strictly in the order their frames complete.

use std::{path::Path, time::Instant};

use tracing::{debug, info};

use crate::{
    classify::{Step, StopReason, TokenClassifier},
    codec::{decode_window, CodecDecoder},
    config::GenerationConfig,
    error::{Error, Result},
    frame::FrameBuffer,
    source::{SpeechModel, TokenSource},
    voice::{format_prompt, validate_text, Voice},
    writer::{StreamWriter, WavSummary, SAMPLE_RATE},
};

/// Counters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationStats {
    pub stop_reason: StopReason,
    /// Tokens pulled from the source, audio or not.
    pub tokens_pulled: usize,
    /// Audio tokens accepted into the frame buffer.
    pub audio_tokens: usize,
    /// Windows handed to the codec bridge.
    pub windows: usize,
    /// Windows dropped for out-of-range indices or short decodes.
    pub dropped_windows: usize,
}

/// Audio produced by one call, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub audio: StreamWriter,
    pub stats: GenerationStats,
}

impl DecodedAudio {
    pub fn write_wav(&self, path: &Path) -> Result<WavSummary> {
        self.audio.write_wav(path)
    }
}

/// Summary returned after a successful file write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisReport {
    pub stats: GenerationStats,
    pub wav: WavSummary,
    pub elapsed_secs: f32,
}

/// Long-lived pipeline context: the codec and the generation settings.
///
/// Build once, then run any number of generation calls against it.
pub struct Engine {
    codec: Box<dyn CodecDecoder>,
    config: GenerationConfig,
}

impl Engine {
    pub fn new(codec: impl CodecDecoder + 'static, config: GenerationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { codec: Box::new(codec), config })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Change the audio token cap for subsequent calls; zero is ignored.
    pub fn set_max_tokens(&mut self, max_tokens: usize) {
        if max_tokens > 0 {
            self.config.max_tokens = max_tokens;
        }
    }

    /// Drain `source` through the pipeline.
    ///
    /// Fails with [`Error::NoAudio`] when not a single window decoded.
    pub fn decode_stream(&self, source: &mut dyn TokenSource) -> Result<DecodedAudio> {
        let mut classifier =
            TokenClassifier::new(self.config.stop_token_ids.iter().copied(), self.config.max_tokens);
        let mut frames = FrameBuffer::with_capacity(self.config.max_tokens.min(1 << 16));
        let mut audio = StreamWriter::new(SAMPLE_RATE);
        let mut tokens_pulled = 0usize;
        let mut windows = 0usize;
        let mut dropped_windows = 0usize;

        while !classifier.is_done() {
            let Some(id) = source.next_token()? else {
                classifier.source_exhausted();
                break;
            };
            tokens_pulled += 1;

            match classifier.classify(id, || source.token_text(id)) {
                Step::Accept(index) => {
                    if let Some(window) = frames.push(index) {
                        windows += 1;
                        match decode_window(self.codec.as_ref(), window, self.config.quantize)? {
                            Some(segment) => audio.push(segment),
                            None => dropped_windows += 1,
                        }
                    }
                }
                Step::Skip => {}
                Step::Stop => break,
            }
        }

        let stats = GenerationStats {
            stop_reason: classifier.stop_reason().unwrap_or(StopReason::SourceExhausted),
            tokens_pulled,
            audio_tokens: classifier.accepted(),
            windows,
            dropped_windows,
        };
        debug!(?stats, "generation finished");

        if audio.is_empty() {
            return Err(Error::NoAudio);
        }
        Ok(DecodedAudio { audio, stats })
    }

    /// Format the prompt, run `model` on it and write the result to `output`.
    ///
    /// Input is validated before the model is started.  No file is written
    /// when generation produces no audio.
    pub fn synthesize_to_file(
        &self,
        model: &dyn SpeechModel,
        voice: Voice,
        text: &str,
        output: &Path,
    ) -> Result<SynthesisReport> {
        let text = validate_text(text)?;
        let prompt = format_prompt(voice, text);
        info!(%voice, text = %preview(text), "generating");

        let start = Instant::now();
        let mut source = model.start(&prompt, &self.config.sampling, self.config.source_budget())?;
        let decoded = self.decode_stream(&mut source)?;
        let elapsed_secs = start.elapsed().as_secs_f32();

        let wav = decoded.write_wav(output)?;
        info!(
            audio_secs = format_args!("{:.1}", wav.duration_secs),
            elapsed_secs = format_args!("{:.1}", elapsed_secs),
            rtf = format_args!("{:.2}", elapsed_secs / wav.duration_secs.max(f32::EPSILON)),
            stop = ?decoded.stats.stop_reason,
            "synthesis complete"
        );
        Ok(SynthesisReport { stats: decoded.stats, wav, elapsed_secs })
    }
}

/// First 80 characters of `text` for log lines.
fn preview(text: &str) -> String {
    match text.char_indices().nth(80) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::SnacCodes,
        source::{ReplayModel, ScriptedSource, END_OF_TURN_ID},
        tokenize::audio_token_id,
    };

    fn flat_codec(level: f32) -> impl CodecDecoder {
        move |_: &SnacCodes| -> Result<Vec<f32>> { Ok(vec![level; 8192]) }
    }

    fn audio_ids(n: usize, index: u32) -> Vec<u32> {
        (0..n).map(|pos| audio_token_id(index, pos)).collect()
    }

    #[test]
    fn test_preamble_then_audio_then_stop() {
        let engine = Engine::new(flat_codec(0.25), GenerationConfig::default()).unwrap();
        let mut ids = vec![128_259, 128_257, 128_261];
        ids.extend(audio_ids(35, 100));
        ids.push(END_OF_TURN_ID);
        ids.extend(audio_ids(7, 100)); // never reached

        let decoded = engine.decode_stream(&mut ScriptedSource::new(ids)).unwrap();
        assert_eq!(decoded.stats.stop_reason, StopReason::Terminator);
        assert_eq!(decoded.stats.audio_tokens, 35);
        assert_eq!(decoded.stats.windows, 2);
        assert_eq!(decoded.audio.segment_count(), 2);
        assert_eq!(decoded.audio.sample_count(), 2 * 2048);
    }

    #[test]
    fn test_source_exhausted_still_succeeds() {
        let engine = Engine::new(flat_codec(0.1), GenerationConfig::default()).unwrap();
        let decoded = engine.decode_stream(&mut ScriptedSource::new(audio_ids(30, 9))).unwrap();
        assert_eq!(decoded.stats.stop_reason, StopReason::SourceExhausted);
        assert_eq!(decoded.audio.segment_count(), 1);
    }

    #[test]
    fn test_no_audio_is_terminal() {
        let engine = Engine::new(flat_codec(0.1), GenerationConfig::default()).unwrap();
        let err = engine.decode_stream(&mut ScriptedSource::new(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::NoAudio));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GenerationConfig { max_tokens: 0, ..Default::default() };
        assert!(Engine::new(flat_codec(0.0), config).is_err());
    }

    #[test]
    fn test_synthesize_rejects_empty_text_before_model() {
        struct NeverStarted;
        impl SpeechModel for NeverStarted {
            fn start<'a>(
                &'a self,
                _: &str,
                _: &crate::config::SamplingParams,
                _: usize,
            ) -> Result<Box<dyn TokenSource + 'a>> {
                panic!("model must not start on invalid input")
            }
        }
        let engine = Engine::new(flat_codec(0.0), GenerationConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = engine
            .synthesize_to_file(&NeverStarted, Voice::Tara, "   ", &dir.path().join("x.wav"))
            .unwrap_err();
        assert!(matches!(err, Error::EmptyText));
    }

    #[test]
    fn test_preamble_does_not_eat_audio_budget() {
        let config = GenerationConfig { max_tokens: 28, ..Default::default() };
        let engine = Engine::new(flat_codec(0.5), config).unwrap();
        let mut ids = vec![128_259, 128_257, 128_260];
        ids.extend(audio_ids(100, 7));
        let dir = tempfile::tempdir().unwrap();
        let report = engine
            .synthesize_to_file(&ReplayModel::new(ids), Voice::Leah, "Hi.", &dir.path().join("p.wav"))
            .unwrap();
        assert_eq!(report.stats.stop_reason, StopReason::TokenCap);
        assert_eq!(report.stats.audio_tokens, 28);
        assert_eq!(report.stats.windows, 1);
    }

    #[test]
    fn test_synthesize_to_file() {
        let engine = Engine::new(flat_codec(0.5), GenerationConfig::default()).unwrap();
        let model = ReplayModel::new(audio_ids(28, 4000));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        let report = engine.synthesize_to_file(&model, Voice::Mia, "Hi there.", &path).unwrap();
        assert_eq!(report.wav.samples, 2048);
        assert!(path.exists());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(100);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 83);
        assert_eq!(preview("short"), "short");
    }
}

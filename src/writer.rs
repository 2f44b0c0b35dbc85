//! Stream writer — collects decoded segments and writes the WAV container.

use std::{
    fs::{self, File},
    io::{BufWriter, Seek, Write},
    path::Path,
};

use tracing::info;

use crate::error::{Error, Result};

/// Audio sample rate produced by the SNAC 24 kHz decoder.
pub const SAMPLE_RATE: u32 = 24_000;

/// One decoded window's worth of little-endian 16-bit mono PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    bytes: Vec<u8>,
}

impl AudioSegment {
    /// Wrap PCM bytes; a trailing odd byte is not a sample and is dropped.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.truncate(bytes.len() & !1);
        Self { bytes }
    }

    pub fn from_samples(samples: &[i16]) -> Self {
        Self { bytes: samples.iter().flat_map(|s| s.to_le_bytes()).collect() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn sample_count(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]]))
    }
}

/// Facts about a written file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavSummary {
    pub segments: usize,
    pub samples: usize,
    pub duration_secs: f32,
}

/// Ordered accumulator of [`AudioSegment`]s.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    segments: Vec<AudioSegment>,
    sample_rate: u32,
}

impl Default for StreamWriter {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

impl StreamWriter {
    pub fn new(sample_rate: u32) -> Self {
        Self { segments: Vec::new(), sample_rate }
    }

    pub fn push(&mut self, segment: AudioSegment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[AudioSegment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.segments.iter().map(AudioSegment::sample_count).sum()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f32 {
        self.sample_count() as f32 / self.sample_rate as f32
    }

    /// All PCM bytes in production order.
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.segments.iter().flat_map(|s| s.as_bytes().iter().copied()).collect()
    }

    fn spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn summary(&self) -> WavSummary {
        WavSummary {
            segments: self.segment_count(),
            samples: self.sample_count(),
            duration_secs: self.duration_secs(),
        }
    }

    /// Serialise into any seekable sink.  Fails with [`Error::NoAudio`] when
    /// nothing was produced, before touching the sink.
    pub fn write_to<W: Write + Seek>(&self, sink: W) -> Result<WavSummary> {
        if self.is_empty() {
            return Err(Error::NoAudio);
        }
        let mut writer = hound::WavWriter::new(sink, self.spec())?;
        for segment in &self.segments {
            for sample in segment.samples() {
                writer.write_sample(sample)?;
            }
        }
        writer.finalize()?;
        Ok(self.summary())
    }

    /// Write a WAV file at `path`, creating parent directories.  No file is
    /// created when there is no audio.
    pub fn write_wav(&self, path: &Path) -> Result<WavSummary> {
        if self.is_empty() {
            return Err(Error::NoAudio);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let summary = self.write_to(BufWriter::new(File::create(path)?))?;
        info!(
            samples = summary.samples,
            seconds = format_args!("{:.2}", summary.duration_secs),
            path = %path.display(),
            "wrote WAV"
        );
        Ok(summary)
    }
}

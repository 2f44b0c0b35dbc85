//! Codec bridge — turns one decode window into PCM.
//!
//! A window holds four 7-index frames.  Within a frame the indices are laid
//! out across the three SNAC codebooks as
//!
//! | Frame slot | 0 | 1 | 2 | 3 | 4 | 5 | 6 |
//! |------------|---|---|---|---|---|---|---|
//! | Codebook   | 0 | 1 | 2 | 2 | 1 | 2 | 2 |
//!
//! so a window deinterleaves into sequences of 4, 8 and 16 indices.  The
//! decoded waveform spans all four frames; only the audio of the second frame
//! is kept, the rest is context for the codec.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::Result,
    frame::{DecodeWindow, WINDOW_FRAMES},
    tokenize::{CODEBOOK_SIZE, FRAME_LEN},
    writer::AudioSegment,
};

/// Codebook indices for one window, one sequence per SNAC level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnacCodes {
    pub coarse: [i64; WINDOW_FRAMES],
    pub medium: [i64; WINDOW_FRAMES * 2],
    pub fine: [i64; WINDOW_FRAMES * 4],
}

impl SnacCodes {
    /// All three levels in coarse → fine order.
    pub fn levels(&self) -> [&[i64]; 3] {
        [&self.coarse, &self.medium, &self.fine]
    }

    /// Whether every index lies in `[0, 4096)`.
    pub fn in_range(&self) -> bool {
        self.levels().iter().all(|level| level.iter().all(|&c| (0..CODEBOOK_SIZE).contains(&c)))
    }
}

/// The external audio codec: three index sequences in, waveform out.
pub trait CodecDecoder {
    /// Decode one window into float samples, nominally in `[-1, 1]`.
    fn decode(&self, codes: &SnacCodes) -> Result<Vec<f32>>;
}

impl<F> CodecDecoder for F
where
    F: Fn(&SnacCodes) -> Result<Vec<f32>>,
{
    fn decode(&self, codes: &SnacCodes) -> Result<Vec<f32>> {
        self(codes)
    }
}

/// How float samples outside `[-1, 1]` become 16-bit PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum QuantizePolicy {
    /// Saturate to `[-32768, 32767]`.
    #[default]
    Clamp,
    /// Truncate through 32 bits and wrap into 16, the way NumPy's
    /// `float32 -> int16` cast behaves on x86: overshoots flip sign, and
    /// values beyond the i32 range (or NaN) become `0x8000_0000` before
    /// wrapping, i.e. 0.
    Wrap,
}

impl QuantizePolicy {
    pub fn quantize(self, sample: f32) -> i16 {
        let scaled = sample * i16::MAX as f32;
        match self {
            QuantizePolicy::Clamp => scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16,
            QuantizePolicy::Wrap => truncate_i32(scaled) as i16,
        }
    }
}

/// `cvttss2si` semantics: out-of-range and NaN give `i32::MIN`.
fn truncate_i32(x: f32) -> i32 {
    const LIMIT: f32 = 2_147_483_648.0;
    if x.is_nan() || !(-LIMIT..LIMIT).contains(&x) {
        i32::MIN
    } else {
        x as i32
    }
}

/// Split a window into per-codebook sequences.
pub fn deinterleave(window: DecodeWindow<'_>) -> SnacCodes {
    let mut codes = SnacCodes {
        coarse: [0; WINDOW_FRAMES],
        medium: [0; WINDOW_FRAMES * 2],
        fine: [0; WINDOW_FRAMES * 4],
    };
    for (j, frame) in window.chunks_exact(FRAME_LEN).enumerate() {
        codes.coarse[j] = frame[0];
        codes.medium[2 * j..2 * j + 2].copy_from_slice(&[frame[1], frame[4]]);
        codes.fine[4 * j..4 * j + 4].copy_from_slice(&[frame[2], frame[3], frame[5], frame[6]]);
    }
    codes
}

/// Deinterleave and range-check; `None` drops the window.
pub fn validate_window(window: DecodeWindow<'_>) -> Option<SnacCodes> {
    let codes = deinterleave(window);
    codes.in_range().then_some(codes)
}

/// The audio belonging to the window's second frame: `[L/4, L/2)`.
pub fn center_slice(samples: &[f32]) -> &[f32] {
    let per_frame = samples.len() / WINDOW_FRAMES;
    &samples[per_frame..2 * per_frame]
}

/// Quantize float samples into little-endian 16-bit PCM bytes.
pub fn to_pcm16(samples: &[f32], policy: QuantizePolicy) -> Vec<u8> {
    samples.iter().flat_map(|&s| policy.quantize(s).to_le_bytes()).collect()
}

/// Run one window through the codec.
///
/// `Ok(None)` means the window was dropped (out-of-range index or an empty
/// decode); the caller moves on to the next one.  Codec failures are errors.
pub fn decode_window(
    decoder: &dyn CodecDecoder,
    window: DecodeWindow<'_>,
    policy: QuantizePolicy,
) -> Result<Option<AudioSegment>> {
    let Some(codes) = validate_window(window) else {
        warn!("decode window has an index outside [0, {CODEBOOK_SIZE}), dropping it");
        return Ok(None);
    };

    let samples = decoder.decode(&codes)?;
    let kept = center_slice(&samples);
    if kept.is_empty() {
        warn!(decoded = samples.len(), "codec returned too few samples, dropping window");
        return Ok(None);
    }
    debug!(decoded = samples.len(), kept = kept.len(), "decoded window");
    Ok(Some(AudioSegment::from_bytes(to_pcm16(kept, policy))))
}

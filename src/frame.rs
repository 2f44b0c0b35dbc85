//! Frame buffer — the append-only record of accepted codebook indices.
//!
//! Every 7 indices form one frame.  Once four frames exist, each completed
//! frame produces a decode window made of the last 28 indices, i.e. the
//! previous three frames plus the new one.  Windows are borrowed views over
//! the tail of the buffer; nothing is ever evicted.

use crate::tokenize::FRAME_LEN;

/// Frames per decode window.
pub const WINDOW_FRAMES: usize = 4;

/// Indices per decode window.
pub const WINDOW_LEN: usize = WINDOW_FRAMES * FRAME_LEN;

/// Borrowed view of the newest four frames.
pub type DecodeWindow<'a> = &'a [i64; WINDOW_LEN];

#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    codes: Vec<i64>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { codes: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[i64] {
        &self.codes
    }

    /// Append one index; returns the decode window when this append completed
    /// a frame and at least four frames are buffered.
    pub fn push(&mut self, index: i64) -> Option<DecodeWindow<'_>> {
        self.codes.push(index);
        if window_ready(self.codes.len()) {
            self.window()
        } else {
            None
        }
    }

    /// The last [`WINDOW_LEN`] indices, if that many are buffered.
    pub fn window(&self) -> Option<DecodeWindow<'_>> {
        let start = self.codes.len().checked_sub(WINDOW_LEN)?;
        self.codes[start..].try_into().ok()
    }
}

/// Whether a buffer of `len` indices should trigger a decode.
pub fn window_ready(len: usize) -> bool {
    len % FRAME_LEN == 0 && len >= WINDOW_LEN
}

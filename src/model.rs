//! ONNX SNAC decoder — the codec behind [`CodecDecoder`].
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings) for inference on an exported
//! SNAC 24 kHz decoder graph.  Inputs are positional:
//!
//! | Input | Shape     | dtype |
//! |-------|-----------|-------|
//! | 0     | `[1, 4]`  | int64 |
//! | 1     | `[1, 8]`  | int64 |
//! | 2     | `[1, 16]` | int64 |
//!
//! Output 0 is the waveform (`[1, 1, T]`, `T = 4 × 2048` for a full window).

use std::{path::Path, sync::Mutex};

use anyhow::{Context, Result};
use ort::{session::Session, value::Tensor};
use tracing::info;

use crate::codec::{CodecDecoder, SnacCodes};

/// SNAC 24 kHz decoder backed by an ONNX Runtime session.
pub struct SnacOnnx {
    session: Mutex<Session>,
}

impl SnacOnnx {
    /// Load the decoder graph from an ONNX file.
    pub fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create ORT session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Cannot load SNAC decoder: {}", model_path.display()))?;
        info!(path = %model_path.display(), "loaded SNAC decoder");
        Ok(Self { session: Mutex::new(session) })
    }

    fn run(&self, codes: &SnacCodes) -> Result<Vec<f32>> {
        let [coarse, medium, fine] = codes
            .levels()
            .map(|level| Tensor::<i64>::from_array(([1usize, level.len()], level.to_vec())));
        let t_coarse = coarse.context("Failed to build codebook 0 tensor")?;
        let t_medium = medium.context("Failed to build codebook 1 tensor")?;
        let t_fine = fine.context("Failed to build codebook 2 tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ORT session mutex poisoned"))?;
        let outputs = session
            .run(ort::inputs![t_coarse, t_medium, t_fine])
            .context("SNAC inference failed")?;

        let (_shape, audio) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract audio tensor")?;
        Ok(audio.to_vec())
    }
}

impl CodecDecoder for SnacOnnx {
    fn decode(&self, codes: &SnacCodes) -> crate::Result<Vec<f32>> {
        self.run(codes).map_err(|e| crate::Error::Codec(format!("{e:#}")))
    }
}

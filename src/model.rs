// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model capability trait and the candle-backed implementation.
//!
//! [`ModelBackend`] is the narrow inference interface the chunking and
//! completion layers consume; [`EmbedModel`] implements it over a
//! [`MaskedLmEncoder`] loaded from a safetensors checkpoint.  Tests
//! substitute their own [`ModelBackend`] implementations.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::encoder::MaskedLmEncoder;
use crate::error::{Result, ServeError};
use crate::hub::ModelArtifacts;

// ---------------------------------------------------------------------------
// ModelBackend capability
// ---------------------------------------------------------------------------

/// Inference capability consumed by the chunker and the mask completer.
///
/// One call covers one window; the backend owns device placement and
/// returns tensors in its native dtype.
pub trait ModelBackend: Send + Sync {
    /// Hidden dimension of the per-token outputs.
    fn hidden_size(&self) -> usize;

    /// Vocabulary size of the masked-LM head.
    fn vocab_size(&self) -> usize;

    /// Per-token hidden states for one span of token ids.
    ///
    /// # Shapes
    /// - returns: `[seq, hidden_size]`
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`] on tensor operation failures.
    fn encode(&self, ids: &[u32]) -> Result<Tensor>;

    /// Masked-LM vocabulary logits for one span of token ids.
    ///
    /// # Shapes
    /// - returns: `[seq, vocab_size]`
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`] on tensor operation failures.
    fn logits(&self, ids: &[u32]) -> Result<Tensor>;
}

// ---------------------------------------------------------------------------
// EmbedModel
// ---------------------------------------------------------------------------

/// Candle-backed [`ModelBackend`] over a [`MaskedLmEncoder`].
pub struct EmbedModel {
    /// The loaded encoder.
    encoder: MaskedLmEncoder,
    /// The device this model lives on.
    device: Device,
}

impl EmbedModel {
    /// Load a model from resolved checkpoint artifacts.
    ///
    /// # `DType` selection
    ///
    /// - **CUDA**: `BF16` (matches training dtype)
    /// - **CPU**: `F32` for full precision
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Config`] if the config cannot be parsed, or
    /// [`ServeError::Model`] if weight loading fails.
    pub fn load(artifacts: &ModelArtifacts) -> Result<Self> {
        let config = artifacts.encoder_config()?;

        let device = Self::select_device()?;
        let dtype = if device.is_cuda() {
            DType::BF16
        } else {
            DType::F32
        };

        let data = std::fs::read(&artifacts.weights).map_err(|e| {
            ServeError::Model(candle_core::Error::Msg(format!(
                "read {}: {e}",
                artifacts.weights.display()
            )))
        })?;
        let vb = VarBuilder::from_buffered_safetensors(data, dtype, &device)?;

        let encoder = MaskedLmEncoder::load(config, vb)?;
        Ok(Self { encoder, device })
    }

    /// Wrap an already-loaded encoder.
    #[must_use]
    pub const fn new(encoder: MaskedLmEncoder, device: Device) -> Self {
        Self { encoder, device }
    }

    /// Select the best available device (CUDA GPU 0, or CPU fallback).
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`] on device detection failure.
    fn select_device() -> Result<Device> {
        match Device::cuda_if_available(0) {
            Ok(dev) => Ok(dev),
            Err(e) => Err(ServeError::Model(e)),
        }
    }

    /// The device this model lives on.
    #[must_use]
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// Build a `[1, seq]` input tensor on the model's device.
    fn input_tensor(&self, ids: &[u32]) -> Result<Tensor> {
        Ok(Tensor::new(ids, &self.device)?.unsqueeze(0)?)
    }
}

impl ModelBackend for EmbedModel {
    fn hidden_size(&self) -> usize {
        self.encoder.config().hidden_size
    }

    fn vocab_size(&self) -> usize {
        self.encoder.config().vocab_size
    }

    fn encode(&self, ids: &[u32]) -> Result<Tensor> {
        let input = self.input_tensor(ids)?;
        Ok(self.encoder.encode(&input)?.squeeze(0)?)
    }

    fn logits(&self, ids: &[u32]) -> Result<Tensor> {
        let input = self.input_tensor(ids)?;
        Ok(self.encoder.logits(&input)?.squeeze(0)?)
    }
}

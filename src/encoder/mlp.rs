// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feed-forward block: `output(gelu(intermediate(x)))`.
//!
//! BERT-family encoders use a plain (non-gated) two-projection MLP with
//! exact-erf GELU, both projections carrying a bias.

use candle_core::{Module, Tensor};
use candle_nn::{Linear, VarBuilder};

use crate::config::EncoderConfig;
use crate::error::Result;

/// Feed-forward network of one encoder layer.
pub struct Mlp {
    /// Up projection: `[hidden_size, intermediate_size]`.
    intermediate: Linear,
    /// Down projection: `[intermediate_size, hidden_size]`.
    output: Linear,
}

impl Mlp {
    /// Load MLP weights from a [`VarBuilder`] rooted at
    /// `encoder.layer.{i}`.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`](crate::ServeError::Model) if weight
    /// loading fails.
    #[allow(clippy::needless_pass_by_value)] // VarBuilder is candle's pass-by-value convention
    pub fn load(config: &EncoderConfig, vb: VarBuilder<'_>) -> Result<Self> {
        let intermediate = candle_nn::linear(
            config.hidden_size,
            config.intermediate_size,
            vb.pp("intermediate").pp("dense"),
        )?;
        let output = candle_nn::linear(
            config.intermediate_size,
            config.hidden_size,
            vb.pp("output").pp("dense"),
        )?;
        Ok(Self {
            intermediate,
            output,
        })
    }

    /// Run the feed-forward pass.
    ///
    /// # Shapes
    /// - `x`: `[batch, seq, hidden_size]`
    /// - returns: `[batch, seq, hidden_size]`
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`](crate::ServeError::Model) on tensor
    /// operation failures.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let hidden = self.intermediate.forward(x)?.gelu_erf()?;
        Ok(self.output.forward(&hidden)?)
    }
}

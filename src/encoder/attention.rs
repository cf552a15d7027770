// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bidirectional multi-head self-attention.
//!
//! BERT-family encoders attend over the full window in both directions,
//! so there is no causal mask; every projection carries a bias.

use candle_core::{DType, Module, Tensor};
use candle_nn::{Linear, VarBuilder};

use crate::config::EncoderConfig;
use crate::error::Result;

/// Multi-head self-attention layer.
pub struct Attention {
    /// Query projection.
    query: Linear,
    /// Key projection.
    key: Linear,
    /// Value projection.
    value: Linear,
    /// Output projection (`attention.output.dense`).
    output: Linear,
    /// Number of attention heads.
    num_heads: usize,
    /// Dimension per head.
    head_dim: usize,
    /// Attention scale factor: `1/sqrt(head_dim)`.
    scale: f64,
}

impl Attention {
    /// Load attention weights from a [`VarBuilder`] rooted at
    /// `encoder.layer.{i}.attention`.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`](crate::ServeError::Model) if weight
    /// loading fails.
    #[allow(clippy::needless_pass_by_value)] // VarBuilder is candle's pass-by-value convention
    pub fn load(config: &EncoderConfig, vb: VarBuilder<'_>) -> Result<Self> {
        let hidden = config.hidden_size;
        let vb_self = vb.pp("self");

        let query = candle_nn::linear(hidden, hidden, vb_self.pp("query"))?;
        let key = candle_nn::linear(hidden, hidden, vb_self.pp("key"))?;
        let value = candle_nn::linear(hidden, hidden, vb_self.pp("value"))?;
        let output = candle_nn::linear(hidden, hidden, vb.pp("output").pp("dense"))?;

        #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
        let scale = 1.0 / (config.head_dim() as f64).sqrt();

        Ok(Self {
            query,
            key,
            value,
            output,
            num_heads: config.num_attention_heads,
            head_dim: config.head_dim(),
            scale,
        })
    }

    /// Run the attention forward pass.
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
        let (batch, seq_len, _hidden) = x.dims3()?;

        let q = self.query.forward(x)?;
        let k = self.key.forward(x)?;
        let v = self.value.forward(x)?;

        // Reshape to [batch, seq, n_heads, head_dim] then transpose to
        // [batch, n_heads, seq, head_dim]
        let q = q
            .reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?;
        let k = k
            .reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?;
        let v = v
            .reshape((batch, seq_len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?;

        // --- Attention scores ---
        // CONTIGUOUS: transpose produces non-unit strides; matmul requires contiguous layout
        let k_t = k.contiguous()?.transpose(2, 3)?;
        let q = q.contiguous()?;

        let scores = (q.matmul(&k_t)? * self.scale)?;

        // Softmax
        // PROMOTE: softmax over F16/BF16 can produce NaN; compute in F32
        let original_dtype = scores.dtype();
        let scores_f32 = if original_dtype == DType::F32 {
            scores
        } else {
            scores.to_dtype(DType::F32)?
        };
        let mut pattern = candle_nn::ops::softmax_last_dim(&scores_f32)?;
        if original_dtype != DType::F32 {
            pattern = pattern.to_dtype(original_dtype)?;
        }

        // --- Attention output ---
        let v = v.contiguous()?;
        let attn_output = pattern.matmul(&v)?;

        // Reshape back to [batch, seq, n_heads * head_dim]
        let attn_output = attn_output.transpose(1, 2)?.contiguous()?.reshape((
            batch,
            seq_len,
            self.num_heads * self.head_dim,
        ))?;

        Ok(self.output.forward(&attn_output)?)
    }
}

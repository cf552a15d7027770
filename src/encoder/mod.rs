// SPDX-License-Identifier: MIT OR Apache-2.0

//! BERT-family masked-LM encoder.
//!
//! One forward pass covers `RoBERTa`, BERT, `CamemBERT`, and XLM-R,
//! parameterized by [`EncoderConfig`](crate::config::EncoderConfig).
//! The trunk is a stack of post-norm bidirectional blocks over word,
//! learned-position, and token-type embeddings; the masked-LM head
//! projects hidden states back to the vocabulary through weights tied to
//! the word embeddings.

pub(crate) mod attention;
pub(crate) mod mlp;

use candle_core::{DType, Module, Tensor};
use candle_nn::{Embedding, LayerNorm, VarBuilder};

use crate::config::{EncoderConfig, ModelFamily};
use crate::error::Result;

use self::attention::Attention;
use self::mlp::Mlp;

/// Build a `LayerNorm` with the config's epsilon.
#[allow(clippy::needless_pass_by_value)] // VarBuilder is candle's pass-by-value convention
fn layer_norm(size: usize, eps: f64, vb: VarBuilder<'_>) -> Result<LayerNorm> {
    let config = candle_nn::LayerNormConfig {
        eps,
        ..Default::default()
    };
    Ok(candle_nn::layer_norm(size, config, vb)?)
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

/// Input embeddings: word + learned position + token type, then norm.
struct EncoderEmbeddings {
    /// Word embedding table.
    word: Embedding,
    /// Learned absolute position embedding table.
    position: Embedding,
    /// Token-type (segment) embedding table.
    token_type: Embedding,
    /// Embedding normalization.
    norm: LayerNorm,
    /// First position id (`pad_token_id + 1` for `RoBERTa`, 0 for BERT).
    position_offset: u32,
}

impl EncoderEmbeddings {
    /// Load the embedding tables from a [`VarBuilder`] rooted at
    /// `{prefix}.embeddings`.
    #[allow(clippy::needless_pass_by_value)] // VarBuilder is candle's pass-by-value convention
    fn load(config: &EncoderConfig, vb: VarBuilder<'_>) -> Result<Self> {
        let word = candle_nn::embedding(
            config.vocab_size,
            config.hidden_size,
            vb.pp("word_embeddings"),
        )?;
        let position = candle_nn::embedding(
            config.max_position_embeddings,
            config.hidden_size,
            vb.pp("position_embeddings"),
        )?;
        let token_type = candle_nn::embedding(
            config.type_vocab_size,
            config.hidden_size,
            vb.pp("token_type_embeddings"),
        )?;
        let norm = layer_norm(config.hidden_size, config.layer_norm_eps, vb.pp("LayerNorm"))?;

        Ok(Self {
            word,
            position,
            token_type,
            norm,
            position_offset: config.position_offset(),
        })
    }

    /// Embed token ids.
    ///
    /// # Shapes
    /// - `input_ids`: `[batch, seq]` -- token ids
    /// - returns: `[batch, seq, hidden_size]`
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_batch, seq_len) = input_ids.dims2()?;
        let device = input_ids.device();

        let word = self.word.forward(input_ids)?;

        // Single-sequence serving: positions are consecutive from the
        // family's offset; every token is segment 0.
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        let position_ids = Tensor::arange(
            self.position_offset,
            self.position_offset + seq_len as u32,
            device,
        )?
        .unsqueeze(0)?;
        let position = self.position.forward(&position_ids)?;

        let type_ids = Tensor::zeros((1, seq_len), DType::U32, device)?;
        let token_type = self.token_type.forward(&type_ids)?;

        let summed = word
            .broadcast_add(&position)?
            .broadcast_add(&token_type)?;
        Ok(self.norm.forward(&summed)?)
    }
}

// ---------------------------------------------------------------------------
// EncoderLayer
// ---------------------------------------------------------------------------

/// A single post-norm encoder block.
struct EncoderLayer {
    /// Self-attention block.
    attention: Attention,
    /// Norm over the attention residual sum.
    attn_norm: LayerNorm,
    /// Feed-forward block.
    mlp: Mlp,
    /// Norm over the feed-forward residual sum.
    mlp_norm: LayerNorm,
}

impl EncoderLayer {
    /// Load one encoder block from a [`VarBuilder`] rooted at
    /// `{prefix}.encoder.layer.{i}`.
    #[allow(clippy::needless_pass_by_value)] // VarBuilder is candle's pass-by-value convention
    fn load(config: &EncoderConfig, vb: VarBuilder<'_>) -> Result<Self> {
        let attention = Attention::load(config, vb.pp("attention"))?;
        let attn_norm = layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            vb.pp("attention").pp("output").pp("LayerNorm"),
        )?;
        let mlp = Mlp::load(config, vb.clone())?;
        let mlp_norm = layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            vb.pp("output").pp("LayerNorm"),
        )?;

        Ok(Self {
            attention,
            attn_norm,
            mlp,
            mlp_norm,
        })
    }

    /// Post-norm block: attend, add & norm, feed forward, add & norm.
    fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let attn = self.attention.forward(hidden)?;
        let hidden = self.attn_norm.forward(&(attn + hidden)?)?;
        let mlp = self.mlp.forward(&hidden)?;
        Ok(self.mlp_norm.forward(&(mlp + hidden)?)?)
    }
}

// ---------------------------------------------------------------------------
// Masked-LM head
// ---------------------------------------------------------------------------

/// Masked-LM prediction head: dense → GELU → norm → tied vocabulary
/// projection with a separate bias.
struct LmHead {
    /// Transform projection.
    dense: candle_nn::Linear,
    /// Transform normalization.
    norm: LayerNorm,
    /// Vocabulary projection weights, tied to the word embeddings.
    decoder_weight: Tensor,
    /// Vocabulary bias.
    bias: Tensor,
}

impl LmHead {
    /// Load the head for the given family.
    ///
    /// `RoBERTa` checkpoints store it under `lm_head.*`; BERT under
    /// `cls.predictions.*` with the transform one level deeper.
    #[allow(clippy::needless_pass_by_value)] // VarBuilder is candle's pass-by-value convention
    fn load(config: &EncoderConfig, word_embeddings: &Embedding, vb: VarBuilder<'_>) -> Result<Self> {
        let (vb_head, vb_transform, norm_name) = match config.family {
            ModelFamily::Roberta => {
                let head = vb.pp("lm_head");
                (head.clone(), head, "layer_norm")
            }
            ModelFamily::Bert => {
                let head = vb.pp("cls").pp("predictions");
                let transform = head.pp("transform");
                (head, transform, "LayerNorm")
            }
        };

        let dense = candle_nn::linear(
            config.hidden_size,
            config.hidden_size,
            vb_transform.pp("dense"),
        )?;
        let norm = layer_norm(
            config.hidden_size,
            config.layer_norm_eps,
            vb_transform.pp(norm_name),
        )?;
        let bias = vb_head.get(config.vocab_size, "bias")?;

        Ok(Self {
            dense,
            norm,
            decoder_weight: word_embeddings.embeddings().clone(),
            bias,
        })
    }

    /// Project hidden states to vocabulary logits.
    ///
    /// # Shapes
    /// - `hidden`: `[batch, seq, hidden_size]`
    /// - returns: `[batch, seq, vocab_size]`
    fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let transformed = self.dense.forward(hidden)?.gelu_erf()?;
        let normed = self.norm.forward(&transformed)?;
        // Tied embeddings: logits = hidden @ word_embeddings^T + bias
        let logits = normed.broadcast_matmul(&self.decoder_weight.t()?)?;
        Ok(logits.broadcast_add(&self.bias)?)
    }
}

// ---------------------------------------------------------------------------
// MaskedLmEncoder
// ---------------------------------------------------------------------------

/// Config-driven BERT-family encoder with a masked-LM head.
pub struct MaskedLmEncoder {
    /// Input embeddings.
    embeddings: EncoderEmbeddings,
    /// Encoder blocks.
    layers: Vec<EncoderLayer>,
    /// Masked-LM prediction head.
    lm_head: LmHead,
    /// Model configuration.
    config: EncoderConfig,
}

impl MaskedLmEncoder {
    /// Load the encoder from a [`VarBuilder`] over the checkpoint's
    /// top-level weight names.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`](crate::ServeError::Model) if weight
    /// loading fails or dimensions are inconsistent.
    #[allow(clippy::needless_pass_by_value)] // VarBuilder is candle's pass-by-value convention
    pub fn load(config: EncoderConfig, vb: VarBuilder<'_>) -> Result<Self> {
        let vb_trunk = vb.pp(config.family.weight_prefix());

        let embeddings = EncoderEmbeddings::load(&config, vb_trunk.pp("embeddings"))?;

        let vb_encoder = vb_trunk.pp("encoder");
        let mut layers = Vec::with_capacity(config.num_layers);
        for i in 0..config.num_layers {
            let layer = EncoderLayer::load(&config, vb_encoder.pp(format!("layer.{i}")))?;
            layers.push(layer);
        }

        let lm_head = LmHead::load(&config, &embeddings.word, vb)?;

        Ok(Self {
            embeddings,
            layers,
            lm_head,
            config,
        })
    }

    /// Access the model configuration.
    #[must_use]
    pub const fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Run the encoder trunk.
    ///
    /// # Shapes
    /// - `input_ids`: `[batch, seq]` -- token ids
    /// - returns: `[batch, seq, hidden_size]` -- last hidden states
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`](crate::ServeError::Model) on tensor
    /// operation failures (including positions past the embedding table).
    pub fn encode(&self, input_ids: &Tensor) -> Result<Tensor> {
        let mut hidden = self.embeddings.forward(input_ids)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }
        Ok(hidden)
    }

    /// Run the encoder trunk and project through the masked-LM head.
    ///
    /// # Shapes
    /// - `input_ids`: `[batch, seq]` -- token ids
    /// - returns: `[batch, seq, vocab_size]`
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Model`](crate::ServeError::Model) on tensor
    /// operation failures.
    pub fn logits(&self, input_ids: &Tensor) -> Result<Tensor> {
        let hidden = self.encode(input_ids)?;
        self.lm_head.forward(&hidden)
    }
}

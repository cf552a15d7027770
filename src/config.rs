// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encoder configuration and `HuggingFace` `config.json` parsing.
//!
//! [`EncoderConfig`] captures the configuration axes of the BERT-family
//! bidirectional encoders this crate serves (`RoBERTa`, BERT, `CamemBERT`,
//! XLM-R).  One forward pass implementation covers all of them; the
//! families differ only in weight-name prefixes, position-id numbering,
//! and the masked-LM head layout, all captured by [`ModelFamily`].
//!
//! # Usage
//!
//! ```
//! use embed_serve::EncoderConfig;
//!
//! let config_str = r#"{"model_type": "roberta", "hidden_size": 768,
//!     "num_hidden_layers": 12, "num_attention_heads": 12,
//!     "intermediate_size": 3072, "vocab_size": 50265,
//!     "max_position_embeddings": 514, "type_vocab_size": 1,
//!     "pad_token_id": 1, "layer_norm_eps": 1e-5}"#;
//! let json: serde_json::Value = serde_json::from_str(config_str).unwrap();
//! let config = EncoderConfig::from_hf_config(&json).unwrap();
//! assert_eq!(config.num_layers, 12);
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::{Result, ServeError};
use crate::tokenizer::SpecialMarkers;

// ---------------------------------------------------------------------------
// ModelFamily
// ---------------------------------------------------------------------------

/// Encoder family, determining weight naming and position-id numbering.
///
/// `RoBERTa`-derived checkpoints (`RoBERTa`, `CodeBERT`, `CamemBERT`, XLM-R)
/// share the `roberta.*` weight prefix, the `lm_head.*` prediction head,
/// and position ids that start at `pad_token_id + 1`.  BERT checkpoints use
/// the `bert.*` prefix, the `cls.predictions.*` head, and position ids
/// starting at zero.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// `RoBERTa` and derivatives (`CodeBERT`, `CamemBERT`, XLM-R).
    Roberta,
    /// Original BERT.
    Bert,
}

impl ModelFamily {
    /// Weight-name prefix for the encoder trunk (`"roberta"` or `"bert"`).
    #[must_use]
    pub const fn weight_prefix(self) -> &'static str {
        match self {
            Self::Roberta => "roberta",
            Self::Bert => "bert",
        }
    }

    /// Default special-marker strings for tokenizers of this family.
    ///
    /// Overridden by `special_tokens_map.json` when the model ships one.
    #[must_use]
    pub fn default_markers(self) -> SpecialMarkers {
        match self {
            Self::Roberta => SpecialMarkers::new("<s>", "</s>", "<mask>"),
            Self::Bert => SpecialMarkers::new("[CLS]", "[SEP]", "[MASK]"),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Roberta => write!(f, "RoBERTa"),
            Self::Bert => write!(f, "BERT"),
        }
    }
}

// ---------------------------------------------------------------------------
// EncoderConfig
// ---------------------------------------------------------------------------

/// Configuration for a BERT-family bidirectional encoder.
///
/// Parsed from a `HuggingFace` `config.json` via
/// [`from_hf_config`](Self::from_hf_config).
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Encoder family (weight naming, position numbering, head layout).
    pub family: ModelFamily,

    // --- Dimensions ----------------------------------------------------------
    /// Hidden dimension (`d_model`).
    pub hidden_size: usize,
    /// Number of encoder layers.
    pub num_layers: usize,
    /// Number of attention heads.
    pub num_attention_heads: usize,
    /// Feed-forward intermediate dimension.
    pub intermediate_size: usize,
    /// Vocabulary size.
    pub vocab_size: usize,
    /// Size of the learned position-embedding table.
    pub max_position_embeddings: usize,
    /// Number of token-type (segment) embeddings.
    pub type_vocab_size: usize,

    // --- Numerics ------------------------------------------------------------
    /// Epsilon for the `LayerNorm` layers.
    pub layer_norm_eps: f64,
    /// Padding token id (`RoBERTa` derives its position offset from this).
    pub pad_token_id: u32,
}

impl EncoderConfig {
    /// Dimension per attention head.
    #[must_use]
    pub const fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    /// First position id handed to the position-embedding table.
    ///
    /// `RoBERTa` reserves the ids up to and including `pad_token_id`, so a
    /// sequence starts at `pad_token_id + 1`; BERT starts at zero.
    #[must_use]
    pub const fn position_offset(&self) -> u32 {
        match self.family {
            ModelFamily::Roberta => self.pad_token_id + 1,
            ModelFamily::Bert => 0,
        }
    }

    /// Parse an [`EncoderConfig`] from a `HuggingFace` `config.json` value.
    ///
    /// Dispatches on the `model_type` field to a family-specific parser.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Config`] if `model_type` is missing,
    /// unsupported, or if required fields are absent.
    pub fn from_hf_config(config: &Value) -> Result<Self> {
        let model_type = config
            .get("model_type")
            .and_then(Value::as_str)
            .ok_or_else(|| ServeError::Config("missing 'model_type' field".into()))?;

        match model_type {
            "roberta" | "camembert" | "xlm-roberta" => Self::parse_roberta(config),
            "bert" => Self::parse_bert(config),
            other => Err(ServeError::Config(format!(
                "unsupported model_type: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-family config parsers
// ---------------------------------------------------------------------------

impl EncoderConfig {
    /// Parse a `RoBERTa`-family config (`RoBERTa`, `CodeBERT`, `CamemBERT`,
    /// XLM-R).
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Config`] if required dimension fields are
    /// missing.
    fn parse_roberta(config: &Value) -> Result<Self> {
        Ok(Self {
            family: ModelFamily::Roberta,
            hidden_size: get_usize(config, "hidden_size")?,
            num_layers: get_usize(config, "num_hidden_layers")?,
            num_attention_heads: get_usize(config, "num_attention_heads")?,
            intermediate_size: get_usize(config, "intermediate_size")?,
            vocab_size: get_usize(config, "vocab_size")?,
            max_position_embeddings: get_usize_or(config, "max_position_embeddings", 514),
            type_vocab_size: get_usize_or(config, "type_vocab_size", 1),
            layer_norm_eps: get_f64_or(config, "layer_norm_eps", 1e-5),
            pad_token_id: get_u32_or(config, "pad_token_id", 1),
        })
    }

    /// Parse a BERT config.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Config`] if required dimension fields are
    /// missing.
    fn parse_bert(config: &Value) -> Result<Self> {
        Ok(Self {
            family: ModelFamily::Bert,
            hidden_size: get_usize(config, "hidden_size")?,
            num_layers: get_usize(config, "num_hidden_layers")?,
            num_attention_heads: get_usize(config, "num_attention_heads")?,
            intermediate_size: get_usize(config, "intermediate_size")?,
            vocab_size: get_usize(config, "vocab_size")?,
            max_position_embeddings: get_usize_or(config, "max_position_embeddings", 512),
            type_vocab_size: get_usize_or(config, "type_vocab_size", 2),
            layer_norm_eps: get_f64_or(config, "layer_norm_eps", 1e-12),
            pad_token_id: get_u32_or(config, "pad_token_id", 0),
        })
    }
}

// ---------------------------------------------------------------------------
// Typed field getters
// ---------------------------------------------------------------------------

/// Get a required `usize` field.
fn get_usize(config: &Value, key: &str) -> Result<usize> {
    config
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ServeError::Config(format!("missing or invalid '{key}' field")))
}

/// Get an optional `usize` field with a default.
fn get_usize_or(config: &Value, key: &str, default: usize) -> usize {
    config
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Get an optional `f64` field with a default.
fn get_f64_or(config: &Value, key: &str, default: f64) -> f64 {
    config.get(key).and_then(Value::as_f64).unwrap_or(default)
}

/// Get an optional `u32` field with a default.
fn get_u32_or(config: &Value, key: &str, default: u32) -> u32 {
    config
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roberta_base() {
        let json = serde_json::json!({
            "model_type": "roberta",
            "hidden_size": 768,
            "num_hidden_layers": 12,
            "num_attention_heads": 12,
            "intermediate_size": 3072,
            "vocab_size": 50265,
            "max_position_embeddings": 514,
            "type_vocab_size": 1,
            "pad_token_id": 1,
            "layer_norm_eps": 1e-5
        });
        let config = EncoderConfig::from_hf_config(&json).unwrap();
        assert_eq!(config.family, ModelFamily::Roberta);
        assert_eq!(config.num_layers, 12);
        assert_eq!(config.head_dim(), 64);
        assert_eq!(config.position_offset(), 2);
        assert_eq!(config.family.weight_prefix(), "roberta");
    }

    #[test]
    fn parse_bert_base() {
        let json = serde_json::json!({
            "model_type": "bert",
            "hidden_size": 768,
            "num_hidden_layers": 12,
            "num_attention_heads": 12,
            "intermediate_size": 3072,
            "vocab_size": 30522,
            "max_position_embeddings": 512,
            "type_vocab_size": 2
        });
        let config = EncoderConfig::from_hf_config(&json).unwrap();
        assert_eq!(config.family, ModelFamily::Bert);
        assert_eq!(config.position_offset(), 0);
        assert_eq!(config.type_vocab_size, 2);
        assert!((config.layer_norm_eps - 1e-12).abs() < f64::EPSILON);
        assert_eq!(config.family.weight_prefix(), "bert");
    }

    #[test]
    fn xlm_roberta_maps_to_roberta_family() {
        let json = serde_json::json!({
            "model_type": "xlm-roberta",
            "hidden_size": 1024,
            "num_hidden_layers": 24,
            "num_attention_heads": 16,
            "intermediate_size": 4096,
            "vocab_size": 250002
        });
        let config = EncoderConfig::from_hf_config(&json).unwrap();
        assert_eq!(config.family, ModelFamily::Roberta);
        assert_eq!(config.max_position_embeddings, 514);
    }

    #[test]
    fn unsupported_model_type_errors() {
        let json = serde_json::json!({ "model_type": "llama" });
        let result = EncoderConfig::from_hf_config(&json);
        assert!(result.is_err());
    }

    #[test]
    fn missing_model_type_errors() {
        let json = serde_json::json!({ "hidden_size": 768 });
        let result = EncoderConfig::from_hf_config(&json);
        assert!(result.is_err());
    }
}

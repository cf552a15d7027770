// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fill-mask completion.
//!
//! [`MaskCompleter`] is the capability the dispatcher consumes;
//! [`LmMaskCompleter`] implements it with the masked-LM head: the query
//! is tokenized with its markers, the logits at the mask position are
//! softmaxed over the vocabulary, and the top candidates come back with
//! their probabilities.

use std::sync::Arc;

use candle_core::DType;

use crate::error::{Result, ServeError};
use crate::model::ModelBackend;
use crate::tokenizer::QueryTokenizer;

// ---------------------------------------------------------------------------
// MaskCompleter capability
// ---------------------------------------------------------------------------

/// One ranked fill-mask candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskCandidate {
    /// Candidate token text.
    pub token: String,
    /// Probability of the candidate at the mask position.
    pub score: f32,
}

/// Fill-mask capability consumed by the dispatcher.
pub trait MaskCompleter: Send + Sync {
    /// Predict candidates for the mask marker in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Completion`] if the text contains no mask
    /// position after tokenization; propagates tokenizer and model
    /// failures.
    fn complete(&self, text: &str) -> Result<Vec<MaskCandidate>>;
}

// ---------------------------------------------------------------------------
// LmMaskCompleter
// ---------------------------------------------------------------------------

/// Masked-LM-backed [`MaskCompleter`].
pub struct LmMaskCompleter {
    /// Tokenization capability.
    tokenizer: Arc<dyn QueryTokenizer>,
    /// Inference capability.
    model: Arc<dyn ModelBackend>,
    /// Number of candidates to return.
    top_k: usize,
}

impl LmMaskCompleter {
    /// Default candidate count.
    pub const DEFAULT_TOP_K: usize = 5;

    /// Build a completer returning [`DEFAULT_TOP_K`](Self::DEFAULT_TOP_K)
    /// candidates.
    #[must_use]
    pub fn new(tokenizer: Arc<dyn QueryTokenizer>, model: Arc<dyn ModelBackend>) -> Self {
        Self {
            tokenizer,
            model,
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    /// Override the candidate count.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

impl MaskCompleter for LmMaskCompleter {
    fn complete(&self, text: &str) -> Result<Vec<MaskCandidate>> {
        let markers = self.tokenizer.markers();

        // Bound the query like any encoder input, then find the mask.
        let bounded = format!("{}{text}{}", markers.begin, markers.end);
        let tokens = self.tokenizer.tokenize(&bounded)?;
        let ids = self.tokenizer.ids(&tokens)?;

        let mask_id = self
            .tokenizer
            .ids(std::slice::from_ref(&markers.mask))?
            .first()
            .copied()
            .ok_or_else(|| ServeError::Completion("mask marker has no id".into()))?;
        let mask_pos = ids.iter().position(|&id| id == mask_id).ok_or_else(|| {
            ServeError::Completion(format!(
                "no '{}' token in the tokenized query",
                markers.mask
            ))
        })?;

        // Probability distribution at the mask position.
        let logits = self.model.logits(&ids)?;
        let row = logits.get(mask_pos)?;
        let probs: Vec<f32> = candle_nn::ops::softmax_last_dim(&row.to_dtype(DType::F32)?)?
            .to_vec1()?;

        // Argsort descending, keep the top candidates.
        let mut indexed: Vec<(usize, f32)> = probs.into_iter().enumerate().collect();
        indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        indexed
            .into_iter()
            .take(self.top_k)
            .map(|(id, score)| {
                #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
                let token = self.tokenizer.token_text(id as u32)?;
                Ok(MaskCandidate { token, score })
            })
            .collect()
    }
}

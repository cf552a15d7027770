// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequence chunking: fixed-width sliding windows over long inputs.
//!
//! [`SequenceChunker`] tokenizes a query and embeds it with the model.
//! Inputs shorter than the attention width are embedded in one shot;
//! longer inputs are split into overlapping windows of width `W` at
//! stride `W/2`, one inference call per window.  Only windows that fit
//! entirely within the sequence are emitted, so up to `W/2 - 1` trailing
//! tokens can fall outside every window; [`uncovered_tail`] reports the
//! size of that gap.

use std::sync::Arc;

use candle_core::Tensor;

use crate::error::Result;
use crate::model::ModelBackend;
use crate::tokenizer::QueryTokenizer;

// ---------------------------------------------------------------------------
// ServerMode
// ---------------------------------------------------------------------------

/// Tokenization variant served by the process.
///
/// Generic mode bounds every query with the begin/end markers before
/// tokenizing; simple mode tokenizes the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ServerMode {
    /// Raw tokenization, no marker wrapping.
    Simple,
    /// Marker-bounded tokenization.
    #[default]
    Generic,
}

// ---------------------------------------------------------------------------
// Windowing arithmetic
// ---------------------------------------------------------------------------

/// Start offsets of every full window of `width` over a sequence of
/// `len` tokens, at stride `width / 2`.
///
/// A window is emitted only if it fits entirely (`offset + width <= len`),
/// so for `len >= width` the count is `(len - width) / stride + 1` and
/// offsets increase strictly by `stride`.  Returns an empty vector when
/// `len < width`.
#[must_use]
pub fn window_offsets(len: usize, width: usize) -> Vec<usize> {
    if len < width || width == 0 {
        return Vec::new();
    }
    let stride = (width / 2).max(1);
    (0..=len - width).step_by(stride).collect()
}

/// Number of trailing tokens not covered by any full window.
///
/// Zero when the sequence is shorter than the width (the whole sequence
/// is embedded in one shot) or when the last window ends exactly at the
/// sequence end.
#[must_use]
pub fn uncovered_tail(len: usize, width: usize) -> usize {
    match window_offsets(len, width).last() {
        Some(last) => len - (last + width),
        None => 0,
    }
}

// ---------------------------------------------------------------------------
// SequenceChunker
// ---------------------------------------------------------------------------

/// Tokenizes queries and embeds them window by window.
pub struct SequenceChunker {
    /// Tokenization capability.
    tokenizer: Arc<dyn QueryTokenizer>,
    /// Inference capability.
    model: Arc<dyn ModelBackend>,
    /// Tokenization variant.
    mode: ServerMode,
    /// Window width, fixed for the process lifetime.
    attention_width: usize,
}

impl SequenceChunker {
    /// Default window width, in tokens.
    pub const DEFAULT_ATTENTION_WIDTH: usize = 760;

    /// Build a chunker with the default attention width.
    #[must_use]
    pub fn new(
        tokenizer: Arc<dyn QueryTokenizer>,
        model: Arc<dyn ModelBackend>,
        mode: ServerMode,
    ) -> Self {
        Self {
            tokenizer,
            model,
            mode,
            attention_width: Self::DEFAULT_ATTENTION_WIDTH,
        }
    }

    /// Override the attention width.
    #[must_use]
    pub const fn with_attention_width(mut self, width: usize) -> Self {
        self.attention_width = width;
        self
    }

    /// The tokenization capability this chunker operates with.
    #[must_use]
    pub fn tokenizer(&self) -> &dyn QueryTokenizer {
        &*self.tokenizer
    }

    /// Split a query into token strings.
    ///
    /// In generic mode the query text is bounded by the begin/end marker
    /// strings first, so the resulting sequence starts and ends with the
    /// markers; simple mode tokenizes the raw text.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer failures.
    pub fn tokenize(&self, query: &str) -> Result<Vec<String>> {
        match self.mode {
            ServerMode::Simple => self.tokenizer.tokenize(query),
            ServerMode::Generic => {
                let markers = self.tokenizer.markers();
                let bounded = format!("{}{query}{}", markers.begin, markers.end);
                self.tokenizer.tokenize(&bounded)
            }
        }
    }

    /// Tokenize a query and convert to vocabulary ids.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer failures.
    pub fn token_ids(&self, query: &str) -> Result<Vec<u32>> {
        let tokens = self.tokenize(query)?;
        self.tokenizer.ids(&tokens)
    }

    /// Embed a query as a single window, regardless of length.
    ///
    /// # Shapes
    /// - returns: `[seq, hidden_size]`
    ///
    /// # Errors
    ///
    /// Propagates tokenizer and model failures.
    pub fn embed_single(&self, query: &str) -> Result<Tensor> {
        let ids = self.token_ids(query)?;
        self.model.encode(&ids)
    }

    /// Embed a query, windowing if it exceeds the attention width.
    ///
    /// Sequences shorter than the width produce exactly one entry over
    /// the entire unpadded sequence.  Longer sequences produce one entry
    /// per full window, in strictly increasing start-offset order; a
    /// trailing remainder shorter than a window is dropped.  No pooling,
    /// truncation, or normalization is applied to the model outputs.
    ///
    /// # Shapes
    /// - returns: one `[seq, hidden_size]` tensor per window
    ///
    /// # Errors
    ///
    /// Propagates tokenizer and model failures.
    pub fn embed_sequence(&self, query: &str) -> Result<Vec<Tensor>> {
        let ids = self.token_ids(query)?;

        if ids.len() < self.attention_width {
            return Ok(vec![self.model.encode(&ids)?]);
        }

        let offsets = window_offsets(ids.len(), self.attention_width);
        let mut entries = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let window = &ids[offset..offset + self.attention_width];
            entries.push(self.model.encode(window)?);
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequence_has_no_windows() {
        assert!(window_offsets(3, 4).is_empty());
        assert!(window_offsets(0, 4).is_empty());
    }

    #[test]
    fn exact_width_yields_one_window() {
        assert_eq!(window_offsets(4, 4), vec![0]);
        assert_eq!(uncovered_tail(4, 4), 0);
    }

    #[test]
    fn window_count_matches_closed_form() {
        // count = (len - width) / stride + 1
        for len in 8..64 {
            for width in [4_usize, 6, 8] {
                let stride = width / 2;
                let offsets = window_offsets(len, width);
                assert_eq!(offsets.len(), (len - width) / stride + 1);
                for (i, offset) in offsets.iter().enumerate() {
                    assert_eq!(*offset, i * stride);
                    assert!(offset + width <= len);
                }
            }
        }
    }

    #[test]
    fn ten_tokens_width_four_drops_last_two() {
        assert_eq!(window_offsets(10, 4), vec![0, 2, 4, 6]);
        assert_eq!(uncovered_tail(10, 4), 2);
    }

    #[test]
    fn full_coverage_has_no_tail() {
        assert_eq!(window_offsets(8, 4), vec![0, 2, 4]);
        assert_eq!(uncovered_tail(8, 4), 0);
    }
}

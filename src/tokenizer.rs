// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokenizer wrapper over the `HuggingFace` `tokenizers` crate.
//!
//! [`TextTokenizer`] implements the [`QueryTokenizer`] capability the
//! chunking and dispatch layers consume: raw tokenization, token/id
//! conversion, and the special-marker strings (begin/end-of-sequence and
//! the mask marker).  Tests substitute their own [`QueryTokenizer`]
//! implementations.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ServeError};

// ---------------------------------------------------------------------------
// SpecialMarkers
// ---------------------------------------------------------------------------

/// The special-token strings the serving paths depend on.
///
/// `begin`/`end` bound a tokenized query in generic mode; `mask` marks a
/// position for fill-mask prediction and routes a query to the completion
/// path when present in the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialMarkers {
    /// Begin-of-sequence marker (`<s>` / `[CLS]`).
    pub begin: String,
    /// End-of-sequence marker (`</s>` / `[SEP]`).
    pub end: String,
    /// Mask marker (`<mask>` / `[MASK]`).
    pub mask: String,
}

impl SpecialMarkers {
    /// Build markers from the three strings.
    #[must_use]
    pub fn new(begin: &str, end: &str, mask: &str) -> Self {
        Self {
            begin: begin.to_owned(),
            end: end.to_owned(),
            mask: mask.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// QueryTokenizer capability
// ---------------------------------------------------------------------------

/// Tokenization capability consumed by the chunker and the mask completer.
pub trait QueryTokenizer: Send + Sync {
    /// Split text into token strings, without adding special tokens.
    ///
    /// Marker strings already present in the text are recognized and kept
    /// as single tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Tokenizer`] if encoding fails.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Convert token strings to vocabulary ids.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Tokenizer`] if a token is not in the
    /// vocabulary.
    fn ids(&self, tokens: &[String]) -> Result<Vec<u32>>;

    /// Decode a single token id to its surface text.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Tokenizer`] if decoding fails.
    fn token_text(&self, id: u32) -> Result<String>;

    /// The special-marker strings for this vocabulary.
    fn markers(&self) -> &SpecialMarkers;
}

// ---------------------------------------------------------------------------
// TextTokenizer
// ---------------------------------------------------------------------------

/// `HuggingFace` `tokenizers`-backed implementation of [`QueryTokenizer`].
pub struct TextTokenizer {
    /// The wrapped `HuggingFace` tokenizer.
    inner: Box<tokenizers::Tokenizer>,
    /// Resolved special-marker strings.
    markers: SpecialMarkers,
}

impl TextTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    ///
    /// `defaults` supplies the family's marker strings; when
    /// `special_tokens_map` points at a `special_tokens_map.json`, the
    /// markers recorded there take precedence.  Each resolved marker is
    /// validated against the vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Tokenizer`] if the tokenizer file cannot be
    /// loaded or a marker is absent from the vocabulary.
    pub fn load(
        path: impl AsRef<Path>,
        special_tokens_map: Option<&Path>,
        defaults: SpecialMarkers,
    ) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path.as_ref()).map_err(|e| {
            ServeError::Tokenizer(format!(
                "failed to load tokenizer from {}: {e}",
                path.as_ref().display()
            ))
        })?;

        let markers = match special_tokens_map {
            Some(map_path) => {
                let map_str = std::fs::read_to_string(map_path)?;
                let json: serde_json::Value = serde_json::from_str(&map_str)
                    .map_err(|e| ServeError::Tokenizer(format!("parse special tokens map: {e}")))?;
                markers_from_special_tokens_map(&json, &defaults)
            }
            None => defaults,
        };

        for marker in [&markers.begin, &markers.end, &markers.mask] {
            if inner.token_to_id(marker).is_none() {
                return Err(ServeError::Tokenizer(format!(
                    "special token '{marker}' not in vocabulary"
                )));
            }
        }

        Ok(Self {
            inner: Box::new(inner),
            markers,
        })
    }

    /// Wrap an already-loaded `HuggingFace` tokenizer.
    #[must_use]
    pub fn from_tokenizer(tokenizer: tokenizers::Tokenizer, markers: SpecialMarkers) -> Self {
        Self {
            inner: Box::new(tokenizer),
            markers,
        }
    }
}

impl QueryTokenizer for TextTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ServeError::Tokenizer(format!("encode failed: {e}")))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn ids(&self, tokens: &[String]) -> Result<Vec<u32>> {
        tokens
            .iter()
            .map(|token| {
                self.inner.token_to_id(token).ok_or_else(|| {
                    ServeError::Tokenizer(format!("token '{token}' not in vocabulary"))
                })
            })
            .collect()
    }

    fn token_text(&self, id: u32) -> Result<String> {
        let text = self
            .inner
            .decode(&[id], true)
            .map_err(|e| ServeError::Tokenizer(format!("decode failed: {e}")))?;
        Ok(text.trim().to_owned())
    }

    fn markers(&self) -> &SpecialMarkers {
        &self.markers
    }
}

impl std::fmt::Debug for TextTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTokenizer")
            .field("markers", &self.markers)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// special_tokens_map.json parsing
// ---------------------------------------------------------------------------

/// One entry in `special_tokens_map.json`: either a bare string or an
/// object carrying a `content` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum SpecialTokenEntry {
    /// `"bos_token": "<s>"`
    Plain(String),
    /// `"bos_token": {"content": "<s>", ...}`
    Detailed {
        /// The token text.
        content: String,
    },
}

impl SpecialTokenEntry {
    fn into_content(self) -> String {
        match self {
            Self::Plain(s) => s,
            Self::Detailed { content } => content,
        }
    }
}

/// Resolve markers from a parsed `special_tokens_map.json`, falling back
/// to `defaults` for any entry the map does not carry.
///
/// `RoBERTa` maps name the sequence bounds `bos_token`/`eos_token`; BERT
/// maps use `cls_token`/`sep_token`.  Both are honored, BOS/EOS first.
fn markers_from_special_tokens_map(json: &serde_json::Value, defaults: &SpecialMarkers) -> SpecialMarkers {
    let entry = |key: &str| -> Option<String> {
        serde_json::from_value::<SpecialTokenEntry>(json.get(key)?.clone())
            .ok()
            .map(SpecialTokenEntry::into_content)
    };

    SpecialMarkers {
        begin: entry("bos_token")
            .or_else(|| entry("cls_token"))
            .unwrap_or_else(|| defaults.begin.clone()),
        end: entry("eos_token")
            .or_else(|| entry("sep_token"))
            .unwrap_or_else(|| defaults.end.clone()),
        mask: entry("mask_token").unwrap_or_else(|| defaults.mask.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_from_plain_map() {
        let json = serde_json::json!({
            "bos_token": "<s>",
            "eos_token": "</s>",
            "mask_token": "<mask>"
        });
        let defaults = SpecialMarkers::new("[CLS]", "[SEP]", "[MASK]");
        let markers = markers_from_special_tokens_map(&json, &defaults);
        assert_eq!(markers, SpecialMarkers::new("<s>", "</s>", "<mask>"));
    }

    #[test]
    fn markers_from_detailed_map() {
        let json = serde_json::json!({
            "cls_token": {"content": "[CLS]", "lstrip": false},
            "sep_token": {"content": "[SEP]", "lstrip": false},
            "mask_token": {"content": "[MASK]", "lstrip": true}
        });
        let defaults = SpecialMarkers::new("<s>", "</s>", "<mask>");
        let markers = markers_from_special_tokens_map(&json, &defaults);
        assert_eq!(markers, SpecialMarkers::new("[CLS]", "[SEP]", "[MASK]"));
    }

    #[test]
    fn missing_entries_fall_back_to_defaults() {
        let json = serde_json::json!({ "mask_token": "<mask>" });
        let defaults = SpecialMarkers::new("<s>", "</s>", "[MASK]");
        let markers = markers_from_special_tokens_map(&json, &defaults);
        assert_eq!(markers.begin, "<s>");
        assert_eq!(markers.end, "</s>");
        assert_eq!(markers.mask, "<mask>");
    }
}

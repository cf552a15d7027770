// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query dispatch: mask-completion or embedding.
//!
//! [`QueryDispatcher`] classifies every query into exactly one of two
//! paths, based solely on whether the raw text contains the tokenizer's
//! mask marker: completion (newline-joined candidate tokens) or windowed
//! embedding (unabridged array text).

use std::sync::Arc;

use crate::chunker::SequenceChunker;
use crate::complete::MaskCompleter;
use crate::error::Result;
use crate::format;

/// Routes a raw query to fill-mask completion or windowed embedding.
pub struct QueryDispatcher {
    /// Embedding path.
    chunker: SequenceChunker,
    /// Completion path.
    completer: Arc<dyn MaskCompleter>,
}

impl QueryDispatcher {
    /// Build a dispatcher over the two paths.
    #[must_use]
    pub fn new(chunker: SequenceChunker, completer: Arc<dyn MaskCompleter>) -> Self {
        Self { chunker, completer }
    }

    /// The embedding path's chunker.
    #[must_use]
    pub const fn chunker(&self) -> &SequenceChunker {
        &self.chunker
    }

    /// Decompose into the two paths (used to rebuild with overrides).
    #[must_use]
    pub fn into_parts(self) -> (SequenceChunker, Arc<dyn MaskCompleter>) {
        (self.chunker, self.completer)
    }

    /// Produce the response body for a unified-mode query.
    ///
    /// A query containing the mask marker yields the completion
    /// candidates, one token per line, ordered by ascending score: the
    /// least confident candidate first.  (Descending would read more
    /// naturally, but ascending is the served contract; see DESIGN.md.)
    /// Any other query yields the windowed-embedding array text.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer, model, and completion failures.
    pub fn handle_query(&self, query: &str) -> Result<String> {
        let mask = &self.chunker.tokenizer().markers().mask;

        if query.contains(mask.as_str()) {
            let mut candidates = self.completer.complete(query)?;
            candidates
                .sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
            let tokens: Vec<String> = candidates.into_iter().map(|c| c.token).collect();
            Ok(tokens.join("\n"))
        } else {
            let entries = self.chunker.embed_sequence(query)?;
            format::format_embedding(&entries)
        }
    }
}

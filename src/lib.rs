// SPDX-License-Identifier: MIT OR Apache-2.0

//! # embed-serve
//!
//! HTTP serving for BERT-family masked language models, built on
//! [candle](https://github.com/huggingface/candle).
//!
//! A single GET endpoint answers three kinds of query: tokenization
//! (`?tokenize=`), single-shot embedding (`?vectorize=`), and a unified
//! mode (`?query=`) that fills masked tokens when the query contains the
//! mask marker and otherwise embeds arbitrarily long text by sliding a
//! fixed-width window (50% overlap) over the token sequence, one
//! inference call per window.
//!
//! ## Supported checkpoints
//!
//! `RoBERTa`, BERT, `CamemBERT`, and XLM-R masked-LM checkpoints from
//! the `HuggingFace` Hub or a local directory.

#![warn(missing_docs)]

pub mod chunker;
pub mod complete;
pub mod config;
pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod format;
pub mod hub;
pub mod model;
pub mod server;
pub mod tokenizer;

pub use chunker::{uncovered_tail, window_offsets, SequenceChunker, ServerMode};
pub use complete::{LmMaskCompleter, MaskCandidate, MaskCompleter};
pub use config::{EncoderConfig, ModelFamily};
pub use dispatch::QueryDispatcher;
pub use encoder::MaskedLmEncoder;
pub use error::{Result, ServeError};
pub use hub::ModelArtifacts;
pub use model::{EmbedModel, ModelBackend};
pub use server::{ServeContext, BIND_PORT};
pub use tokenizer::{QueryTokenizer, SpecialMarkers, TextTokenizer};

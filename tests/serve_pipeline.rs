// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end serving scenarios over substitute tokenizer/model
//! implementations: windowing arithmetic, mask routing, and the
//! response-body contracts.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::as_conversions,
    clippy::missing_docs_in_private_items,
    clippy::missing_panics_doc,
    missing_docs
)]

use std::collections::HashMap;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use embed_serve::{
    LmMaskCompleter, MaskCandidate, MaskCompleter, ModelBackend, QueryDispatcher, QueryTokenizer,
    Result, SequenceChunker, ServeContext, ServeError, ServerMode, SpecialMarkers,
};

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

/// Fixed-vocabulary whitespace tokenizer with RoBERTa-style markers.
struct StubTokenizer {
    vocab: Vec<&'static str>,
    markers: SpecialMarkers,
}

impl StubTokenizer {
    fn new() -> Self {
        Self {
            vocab: vec![
                "<s>", "</s>", "<mask>", "<pad>", "The", "the", "cat", "sat", "on", "mat", ".",
                "hello", "world", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j",
            ],
            markers: SpecialMarkers::new("<s>", "</s>", "<mask>"),
        }
    }
}

impl QueryTokenizer for StubTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        // Markers may be glued to the surrounding text, as the chunker
        // bounds queries without separators.
        let spaced = text
            .replace("<s>", " <s> ")
            .replace("</s>", " </s> ")
            .replace("<mask>", " <mask> ")
            .replace('.', " . ");
        Ok(spaced.split_whitespace().map(str::to_owned).collect())
    }

    fn ids(&self, tokens: &[String]) -> Result<Vec<u32>> {
        tokens
            .iter()
            .map(|token| {
                self.vocab
                    .iter()
                    .position(|v| v == token)
                    .map(|p| p as u32)
                    .ok_or_else(|| ServeError::Tokenizer(format!("unknown token '{token}'")))
            })
            .collect()
    }

    fn token_text(&self, id: u32) -> Result<String> {
        self.vocab
            .get(id as usize)
            .map(|v| (*v).to_owned())
            .ok_or_else(|| ServeError::Tokenizer(format!("unknown id {id}")))
    }

    fn markers(&self) -> &SpecialMarkers {
        &self.markers
    }
}

/// Deterministic model: hidden rows encode the input ids, vocabulary
/// logits grow with the vocabulary index.
struct StubModel {
    hidden: usize,
    vocab: usize,
}

impl StubModel {
    fn new(vocab: usize) -> Self {
        Self { hidden: 2, vocab }
    }
}

impl ModelBackend for StubModel {
    fn hidden_size(&self) -> usize {
        self.hidden
    }

    fn vocab_size(&self) -> usize {
        self.vocab
    }

    fn encode(&self, ids: &[u32]) -> Result<Tensor> {
        let mut data = Vec::with_capacity(ids.len() * self.hidden);
        for &id in ids {
            data.push(id as f32);
            data.push(1.0);
        }
        Ok(Tensor::from_vec(data, (ids.len(), self.hidden), &Device::Cpu)?)
    }

    fn logits(&self, ids: &[u32]) -> Result<Tensor> {
        let mut data = Vec::with_capacity(ids.len() * self.vocab);
        for _ in ids {
            for j in 0..self.vocab {
                data.push(j as f32);
            }
        }
        Ok(Tensor::from_vec(data, (ids.len(), self.vocab), &Device::Cpu)?)
    }
}

/// Completer returning a fixed, deliberately unsorted candidate list.
struct StubCompleter;

impl MaskCompleter for StubCompleter {
    fn complete(&self, _text: &str) -> Result<Vec<MaskCandidate>> {
        Ok(vec![
            MaskCandidate {
                token: "mat".to_owned(),
                score: 0.7,
            },
            MaskCandidate {
                token: "cat".to_owned(),
                score: 0.1,
            },
            MaskCandidate {
                token: "sat".to_owned(),
                score: 0.2,
            },
        ])
    }
}

fn stub_parts() -> (Arc<StubTokenizer>, Arc<StubModel>) {
    let tokenizer = Arc::new(StubTokenizer::new());
    let model = Arc::new(StubModel::new(tokenizer.vocab.len()));
    (tokenizer, model)
}

fn chunker(mode: ServerMode, width: usize) -> SequenceChunker {
    let (tokenizer, model) = stub_parts();
    SequenceChunker::new(tokenizer, model, mode).with_attention_width(width)
}

// ---------------------------------------------------------------------------
// Windowing scenarios
// ---------------------------------------------------------------------------

#[test]
fn ten_tokens_width_four_yield_four_windows() {
    let chunker = chunker(ServerMode::Simple, 4);
    let entries = chunker.embed_sequence("a b c d e f g h i j").unwrap();

    assert_eq!(entries.len(), 4);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.dims(), &[4, 2]);
        // Window i starts at token offset i * 2 ("a" has id 13).
        let first: f32 = entry.get(0).unwrap().get(0).unwrap().to_scalar().unwrap();
        assert!((first - (13 + 2 * i) as f32).abs() < f32::EPSILON);
    }

    // Tokens "i" and "j" fall past the last full window.
    assert_eq!(embed_serve::window_offsets(10, 4), vec![0, 2, 4, 6]);
    assert_eq!(embed_serve::uncovered_tail(10, 4), 2);
}

#[test]
fn three_tokens_width_four_yield_one_full_span_entry() {
    let chunker = chunker(ServerMode::Simple, 4);
    let entries = chunker.embed_sequence("a b c").unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].dims(), &[3, 2]);
}

#[test]
fn generic_mode_bounds_the_sequence_with_markers() {
    let chunker = chunker(ServerMode::Generic, 760);
    let tokens = chunker.tokenize("hello world").unwrap();
    assert_eq!(tokens, vec!["<s>", "hello", "world", "</s>"]);
}

#[test]
fn simple_mode_tokenizes_raw() {
    let chunker = chunker(ServerMode::Simple, 760);
    let tokens = chunker.tokenize("hello world").unwrap();
    assert_eq!(tokens, vec!["hello", "world"]);
}

// ---------------------------------------------------------------------------
// Dispatch scenarios
// ---------------------------------------------------------------------------

#[test]
fn mask_query_returns_candidates_not_an_array() {
    let (tokenizer, model) = stub_parts();
    let ctx = ServeContext::new(tokenizer, model, ServerMode::Generic);

    let body = ctx.query_body("The cat sat on the <mask>.").unwrap();

    // Top-5 of a monotonically increasing distribution, re-sorted to
    // ascending: the five highest-id vocabulary entries, lowest first.
    assert_eq!(body, "f\ng\nh\ni\nj");
    assert!(!body.contains('['));
}

#[test]
fn candidates_are_sorted_by_ascending_score() {
    let (tokenizer, model) = stub_parts();
    let chunker = SequenceChunker::new(tokenizer, model, ServerMode::Generic);
    let dispatcher = QueryDispatcher::new(chunker, Arc::new(StubCompleter));

    let body = dispatcher.handle_query("the <mask>").unwrap();
    assert_eq!(body, "cat\nsat\nmat");
}

#[test]
fn unmasked_query_returns_an_embedding_array() {
    let (tokenizer, model) = stub_parts();
    let ctx = ServeContext::new(tokenizer, model, ServerMode::Generic);

    let body = ctx.query_body("the cat sat").unwrap();
    // One entry (5 tokens with markers < width 760): [1, 5, 2].
    assert!(body.starts_with("[[["));
    assert!(!body.contains("..."));
}

#[test]
fn completer_probabilities_are_a_distribution() {
    let (tokenizer, model) = stub_parts();
    let completer = LmMaskCompleter::new(tokenizer, model);

    let candidates = completer.complete("the <mask>").unwrap();
    assert_eq!(candidates.len(), 5);
    // Returned descending by probability, every score in (0, 1].
    for pair in candidates.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for candidate in &candidates {
        assert!(candidate.score > 0.0 && candidate.score <= 1.0);
    }
}

#[test]
fn completion_without_a_mask_token_errors() {
    let (tokenizer, model) = stub_parts();
    let completer = LmMaskCompleter::new(tokenizer, model);
    assert!(completer.complete("the cat").is_err());
}

// ---------------------------------------------------------------------------
// HTTP body contracts
// ---------------------------------------------------------------------------

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

#[test]
fn tokenize_body_is_space_joined() {
    let (tokenizer, model) = stub_parts();
    let ctx = ServeContext::new(tokenizer, model, ServerMode::Simple);
    assert_eq!(ctx.respond(&params(&[("tokenize", "hello world")])), "hello world");
}

#[test]
fn vectorize_body_is_a_matrix() {
    let (tokenizer, model) = stub_parts();
    let ctx = ServeContext::new(tokenizer, model, ServerMode::Simple);
    let body = ctx.respond(&params(&[("vectorize", "hello world")]));
    // Two tokens, hidden size 2: [[11 1]\n [12 1]].
    assert_eq!(body, "[[11 1]\n [12 1]]");
}

#[test]
fn missing_parameter_yields_empty_body() {
    let (tokenizer, model) = stub_parts();
    let ctx = ServeContext::new(tokenizer, model, ServerMode::Generic);
    assert_eq!(ctx.respond(&params(&[])), "");
    assert_eq!(ctx.respond(&params(&[("unknown", "x")])), "");
}

#[test]
fn failed_inference_yields_empty_body() {
    let (tokenizer, model) = stub_parts();
    let ctx = ServeContext::new(tokenizer, model, ServerMode::Simple);
    // "zebra" is not in the stub vocabulary; the error is swallowed into
    // an empty 200 body.
    assert_eq!(ctx.respond(&params(&[("vectorize", "zebra")])), "");
}

#[test]
fn query_parameter_wins_over_the_flag_parameters() {
    let (tokenizer, model) = stub_parts();
    let ctx = ServeContext::new(tokenizer, model, ServerMode::Generic);
    let body = ctx.respond(&params(&[
        ("tokenize", "hello world"),
        ("query", "the <mask>"),
    ]));
    assert_eq!(body, "f\ng\nh\ni\nj");
}

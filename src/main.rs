// SPDX-License-Identifier: MIT OR Apache-2.0

//! embed-serve binary: load a checkpoint, serve it on port 8000.
//!
//! ```bash
//! embed-serve --model microsoft/codebert-base
//! embed-serve --model roberta-base --offline --mode generic
//! ```

use std::sync::Arc;

use clap::{Parser, ValueEnum};

use embed_serve::{hub, server, EmbedModel, ServeContext, ServerMode, TextTokenizer};

/// Serve a BERT-family masked LM over HTTP GET.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// HuggingFace model id or local checkpoint directory.
    #[arg(long)]
    model: String,

    /// Resolve artifacts from the local cache only; never download.
    #[arg(long)]
    offline: bool,

    /// Tokenization variant: raw (`simple`) or marker-bounded (`generic`).
    #[arg(long, value_enum, default_value_t = Mode::Generic)]
    mode: Mode,
}

/// CLI mirror of [`ServerMode`].
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Raw tokenization.
    Simple,
    /// Marker-bounded tokenization.
    Generic,
}

impl From<Mode> for ServerMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Simple => Self::Simple,
            Mode::Generic => Self::Generic,
        }
    }
}

fn main() -> embed_serve::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let artifacts = hub::resolve(&args.model, args.offline)?;
    let config = artifacts.encoder_config()?;

    let tokenizer = Arc::new(TextTokenizer::load(
        &artifacts.tokenizer,
        artifacts.special_tokens_map.as_deref(),
        config.family.default_markers(),
    )?);
    let model = Arc::new(EmbedModel::load(&artifacts)?);
    tracing::info!(model = %args.model, family = %config.family, "model loaded");

    let ctx = Arc::new(ServeContext::new(tokenizer, model, args.mode.into()));

    // One request at a time: a current-thread runtime, with the blocking
    // inference calls made inline in the handler.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    tracing::info!(port = server::BIND_PORT, "serving");
    runtime.block_on(server::serve(ctx))
}

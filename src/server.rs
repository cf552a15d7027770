// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP boundary: one GET endpoint keyed by query-string parameters.
//!
//! The server answers `GET /` with `?tokenize=`, `?vectorize=`, or
//! `?query=` (percent-decoded, `+` as space).  Every response is
//! `200 text/html`; a missing parameter or a failed inference yields an
//! empty body; the status is committed before any processing happens,
//! matching the serving contract.  Per-request access logging is
//! suppressed.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::routing::get;
use axum::Router;

use crate::chunker::{SequenceChunker, ServerMode};
use crate::complete::{LmMaskCompleter, MaskCompleter};
use crate::dispatch::QueryDispatcher;
use crate::error::Result;
use crate::format;
use crate::model::ModelBackend;
use crate::tokenizer::QueryTokenizer;

/// Serving port (all interfaces).
pub const BIND_PORT: u16 = 8000;

// ---------------------------------------------------------------------------
// ServeContext
// ---------------------------------------------------------------------------

/// Process-wide serving context: the dispatcher over the shared,
/// read-only tokenizer and model.
///
/// Constructed once at startup and passed by reference into every
/// request; never global state.
pub struct ServeContext {
    /// Unified query dispatcher (owns the chunker).
    dispatcher: QueryDispatcher,
}

impl ServeContext {
    /// Build a context with the masked-LM completer.
    #[must_use]
    pub fn new(
        tokenizer: Arc<dyn QueryTokenizer>,
        model: Arc<dyn ModelBackend>,
        mode: ServerMode,
    ) -> Self {
        let completer = Arc::new(LmMaskCompleter::new(tokenizer.clone(), model.clone()));
        Self::with_completer(tokenizer, model, mode, completer)
    }

    /// Build a context with a caller-supplied completer.
    #[must_use]
    pub fn with_completer(
        tokenizer: Arc<dyn QueryTokenizer>,
        model: Arc<dyn ModelBackend>,
        mode: ServerMode,
        completer: Arc<dyn MaskCompleter>,
    ) -> Self {
        let chunker = SequenceChunker::new(tokenizer, model, mode);
        Self {
            dispatcher: QueryDispatcher::new(chunker, completer),
        }
    }

    /// Override the chunker's attention width.
    #[must_use]
    pub fn with_attention_width(self, width: usize) -> Self {
        let (chunker, completer) = self.dispatcher.into_parts();
        Self {
            dispatcher: QueryDispatcher::new(chunker.with_attention_width(width), completer),
        }
    }

    /// Body for `?tokenize=`: space-joined tokens.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer failures.
    pub fn tokenize_body(&self, query: &str) -> Result<String> {
        let tokens = self.dispatcher.chunker().tokenize(query)?;
        Ok(format::join_tokens(&tokens))
    }

    /// Body for `?vectorize=`: single-window embedding array text.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer and model failures.
    pub fn vectorize_body(&self, query: &str) -> Result<String> {
        let embedding = self.dispatcher.chunker().embed_single(query)?;
        format::format_tensor(&embedding)
    }

    /// Body for `?query=`: completion list or windowed-embedding array.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer, model, and completion failures.
    pub fn query_body(&self, query: &str) -> Result<String> {
        self.dispatcher.handle_query(query)
    }

    /// Select the parameter and produce the response body.
    ///
    /// When several parameters are present, `query` wins over `vectorize`
    /// over `tokenize`.  No recognized parameter, or any propagated
    /// failure, yields an empty body (the 200 status is already
    /// committed by the time processing starts).
    #[must_use]
    pub fn respond(&self, params: &HashMap<String, String>) -> String {
        let result = if let Some(q) = params.get("query") {
            self.query_body(q)
        } else if let Some(q) = params.get("vectorize") {
            self.vectorize_body(q)
        } else if let Some(q) = params.get("tokenize") {
            self.tokenize_body(q)
        } else {
            Ok(String::new())
        };

        result.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Router and handler
// ---------------------------------------------------------------------------

/// Build the single-route application.
#[must_use]
pub fn router(ctx: Arc<ServeContext>) -> Router {
    Router::new().route("/", get(handle_get)).with_state(ctx)
}

/// Serve forever on all interfaces, port [`BIND_PORT`].
///
/// Requests are handled one at a time: the handler runs its blocking
/// inference calls inline on the runtime thread.
///
/// # Errors
///
/// Returns [`ServeError::Io`](crate::ServeError::Io) if the port cannot
/// be bound.
pub async fn serve(ctx: Arc<ServeContext>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", BIND_PORT)).await?;
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

/// The one GET handler.
async fn handle_get(
    State(ctx): State<Arc<ServeContext>>,
    Query(params): Query<HashMap<String, String>>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    let body = ctx.respond(&params);
    ([(header::CONTENT_TYPE, "text/html")], body)
}

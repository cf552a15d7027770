// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for embed-serve.

/// Errors that can occur while loading or serving a model.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Model loading or forward pass error (wraps candle).
    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),

    /// Model configuration parsing error.
    #[error("config error: {0}")]
    Config(String),

    /// Tokenizer error.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// HuggingFace Hub artifact resolution error.
    #[error("hub error: {0}")]
    Hub(String),

    /// Fill-mask completion error.
    #[error("completion error: {0}")]
    Completion(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for embed-serve operations.
pub type Result<T> = std::result::Result<T, ServeError>;

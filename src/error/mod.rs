//! Error types and Result aliases for local-embed.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for local-embed operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Embedding generation error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Embedding-specific errors.
///
/// Messages coming out of `hf-hub`, `tokenizers` and `ort` are carried
/// verbatim inside the variant that matches the failing stage.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Model identifier is not in the registry.
    #[error("unsupported model '{0}'")]
    UnsupportedModel(String),

    /// Model or tokenizer download failed.
    #[error("failed to download '{file}' for {model}: {reason}")]
    ModelDownload {
        model: String,
        file: String,
        reason: String,
    },

    /// Model loading error.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization error.
    #[error("tokenization error: {0}")]
    Tokenization(String),

    /// ONNX runtime error.
    #[error("ONNX runtime error: {0}")]
    Runtime(String),

    /// Inference produced unusable output.
    #[error("inference error: {0}")]
    Inference(String),

    /// Blocking task failed to complete.
    #[error("background task error: {0}")]
    Task(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl EmbeddingError {
    /// Create a download error for one file of a model repository.
    pub fn download(
        model: impl Into<String>,
        file: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ModelDownload {
            model: model.into(),
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}

//! Local sentence embeddings.
//!
//! Runs pretrained sentence-transformer models on the CPU through ONNX
//! Runtime and exposes them behind [`EmbeddingProvider`].

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod embeddings;
pub mod error;
pub mod observability;

pub use config::EmbeddingConfig;
pub use embeddings::{EmbeddingProvider, EmbeddingVector, ModelRegistryEntry, DEFAULT_MODEL};
pub use error::{EmbeddingError, Error, Result};

//! Configuration management for local-embed.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{
    EmbeddingConfig, ENV_BATCH_SIZE, ENV_CACHE_DIR, ENV_MODEL, ENV_QUANTIZED, ENV_THREADS,
    MAX_BATCH_SIZE, MAX_THREADS,
};

//! Configuration settings and validation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::embeddings::progress::{ProgressCallback, ProgressEvent};
use crate::embeddings::registry::DEFAULT_MODEL;
use crate::{Error, Result};

/// Environment variable selecting the model identifier.
pub const ENV_MODEL: &str = "LOCAL_EMBED_MODEL";
/// Environment variable selecting the model cache directory.
pub const ENV_CACHE_DIR: &str = "LOCAL_EMBED_CACHE_DIR";
/// Environment variable toggling the quantized graph.
pub const ENV_QUANTIZED: &str = "LOCAL_EMBED_QUANTIZED";
/// Environment variable setting the batch chunk size.
pub const ENV_BATCH_SIZE: &str = "LOCAL_EMBED_BATCH_SIZE";
/// Environment variable setting ONNX intra-op threads.
pub const ENV_THREADS: &str = "LOCAL_EMBED_THREADS";

/// Largest accepted batch chunk size.
pub const MAX_BATCH_SIZE: usize = 256;

/// Largest accepted intra-op thread count.
pub const MAX_THREADS: usize = 32;

/// Configuration for an embedding provider.
#[derive(Clone)]
pub struct EmbeddingConfig {
    /// Model identifier; `None` selects [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Receives model download/load progress; `None` logs via `tracing`.
    pub progress_callback: Option<ProgressCallback>,

    /// Model cache directory; `None` uses the Hugging Face default.
    pub cache_dir: Option<PathBuf>,

    /// Load the 8-bit quantized graph instead of full precision.
    pub quantized: bool,

    /// Texts per engine call in `embed_batch`.
    pub batch_size: usize,

    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: None,
            progress_callback: None,
            cache_dir: None,
            quantized: true,
            batch_size: 32,
            intra_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(4),
        }
    }
}

impl EmbeddingConfig {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is
    /// invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(model) = lookup(ENV_MODEL) {
            config.model = Some(model);
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(ENV_QUANTIZED) {
            config.quantized = parse_bool(ENV_QUANTIZED, &value)?;
        }
        if let Some(value) = lookup(ENV_BATCH_SIZE) {
            config.batch_size = parse_usize(ENV_BATCH_SIZE, &value)?;
        }
        if let Some(value) = lookup(ENV_THREADS) {
            config.intra_threads = parse_usize(ENV_THREADS, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(
        mut self,
        callback: impl Fn(&ProgressEvent) + Send + Sync + 'static,
    ) -> Self {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Set the model cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Model identifier after applying the default.
    #[must_use]
    pub fn resolved_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(Error::config("model cannot be empty"));
        }

        if self.batch_size == 0 {
            return Err(Error::config("batch_size cannot be 0"));
        }

        if self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::config(format!(
                "batch_size cannot exceed {MAX_BATCH_SIZE}"
            )));
        }

        if self.intra_threads == 0 {
            return Err(Error::config("intra_threads cannot be 0"));
        }

        if self.intra_threads > MAX_THREADS {
            return Err(Error::config(format!(
                "intra_threads cannot exceed {MAX_THREADS} (hardware limit)"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("model", &self.resolved_model())
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .field("cache_dir", &self.cache_dir)
            .field("quantized", &self.quantized)
            .field("batch_size", &self.batch_size)
            .field("intra_threads", &self.intra_threads)
            .finish()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("{key}: invalid number '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.resolved_model(), DEFAULT_MODEL);
        assert!(config.quantized);
        assert_eq!(config.batch_size, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_new() {
        let config = EmbeddingConfig::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EmbeddingConfig::new()
            .with_model("Xenova/bge-base-en-v1.5")
            .with_cache_dir("/tmp/models")
            .with_progress_callback(|_| {});
        assert_eq!(config.resolved_model(), "Xenova/bge-base-en-v1.5");
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/models")));
        assert!(config.progress_callback.is_some());
    }

    #[test]
    fn test_validate_empty_model() {
        let config = EmbeddingConfig::new().with_model("  ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn test_validate_batch_size_zero() {
        let config = EmbeddingConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_batch_size_too_high() {
        let config = EmbeddingConfig {
            batch_size: 1000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("256"));
    }

    #[test]
    fn test_validate_intra_threads_zero() {
        let config = EmbeddingConfig {
            intra_threads: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("intra_threads"));
    }

    #[test]
    fn test_validate_intra_threads_too_high() {
        let config = EmbeddingConfig {
            intra_threads: 100,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("32"));
    }

    #[test]
    fn test_from_lookup_empty_env() {
        let config = EmbeddingConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.resolved_model(), DEFAULT_MODEL);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_from_lookup_all_vars() {
        let config = EmbeddingConfig::from_lookup(env(&[
            (ENV_MODEL, "Xenova/all-mpnet-base-v2"),
            (ENV_CACHE_DIR, "/srv/models"),
            (ENV_QUANTIZED, "false"),
            (ENV_BATCH_SIZE, "8"),
            (ENV_THREADS, "2"),
        ]))
        .unwrap();
        assert_eq!(config.resolved_model(), "Xenova/all-mpnet-base-v2");
        assert_eq!(config.cache_dir, Some(PathBuf::from("/srv/models")));
        assert!(!config.quantized);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.intra_threads, 2);
    }

    #[test]
    fn test_from_lookup_bad_number() {
        let err = EmbeddingConfig::from_lookup(env(&[(ENV_BATCH_SIZE, "lots")])).unwrap_err();
        assert!(err.to_string().contains(ENV_BATCH_SIZE));
    }

    #[test]
    fn test_from_lookup_bad_bool() {
        let err = EmbeddingConfig::from_lookup(env(&[(ENV_QUANTIZED, "maybe")])).unwrap_err();
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_from_lookup_validates() {
        let err = EmbeddingConfig::from_lookup(env(&[(ENV_THREADS, "0")])).unwrap_err();
        assert!(err.to_string().contains("intra_threads"));
    }

    #[test]
    fn test_bool_values_case_insensitive() {
        for value in ["TRUE", "Yes", "1", "on"] {
            assert!(parse_bool("K", value).unwrap(), "'{value}' should be true");
        }
        for value in ["False", "NO", "0", "off"] {
            assert!(!parse_bool("K", value).unwrap(), "'{value}' should be false");
        }
    }

    #[test]
    fn test_debug_hides_callback() {
        let config = EmbeddingConfig::new().with_progress_callback(|_| {});
        let debug = format!("{config:?}");
        assert!(debug.contains("<callback>"));
        assert!(debug.contains(DEFAULT_MODEL));
    }
}

//! Inference engine boundary.
//!
//! A [`PipelineFactory`] turns a model identifier into a ready
//! [`FeatureExtractor`]. Both sides are synchronous; the provider runs them
//! on the blocking thread pool.

use std::sync::Arc;

use super::progress::{default_progress_callback, ProgressCallback};
use crate::Result;

/// Inference task a pipeline is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Text to fixed-length vector.
    FeatureExtraction,
}

impl Task {
    /// Task name as used by model hubs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FeatureExtraction => "feature-extraction",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How token vectors are reduced to one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    /// Average of unmasked tokens.
    #[default]
    Mean,
    /// First token.
    Cls,
}

/// Per-call extraction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Pooling strategy.
    pub pooling: Pooling,
    /// Scale the pooled vector to unit length.
    pub normalize: bool,
}

impl ExtractOptions {
    /// Mean pooling followed by L2 normalization.
    pub const MEAN_NORMALIZED: Self = Self {
        pooling: Pooling::Mean,
        normalize: true,
    };
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::MEAN_NORMALIZED
    }
}

/// Options for pipeline construction.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Receives download and load progress.
    pub progress_callback: ProgressCallback,
    /// Tokenizer truncation length.
    pub max_tokens: usize,
}

impl PipelineOptions {
    /// Options with the default logging progress callback.
    #[must_use]
    pub fn new(max_tokens: usize) -> Self {
        Self {
            progress_callback: default_progress_callback(),
            max_tokens,
        }
    }

    /// Replace the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = callback;
        self
    }
}

impl std::fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("max_tokens", &self.max_tokens)
            .field("progress_callback", &"<callback>")
            .finish()
    }
}

/// A loaded model that maps text to vectors.
pub trait FeatureExtractor: Send + Sync {
    /// Identifier of the loaded model.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or inference fails.
    fn extract(&self, text: &str, options: &ExtractOptions) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in order.
    ///
    /// The default runs [`extract`](Self::extract) per text.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; no partial results.
    fn extract_batch(&self, texts: &[String], options: &ExtractOptions) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.extract(text, options)).collect()
    }
}

/// Builds pipelines for a task and model.
pub trait PipelineFactory: Send + Sync {
    /// Create a pipeline, acquiring the model if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or loaded.
    fn create(
        &self,
        task: Task,
        model_id: &str,
        options: &PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>>;
}

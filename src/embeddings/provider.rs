//! High-level embedding provider.
//!
//! Wraps a lazily created feature-extraction pipeline behind a small async
//! API, plus a process-wide shared instance.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::RwLock;

use super::engine::{ExtractOptions, FeatureExtractor, PipelineFactory, PipelineOptions, Task};
use super::model::OnnxPipelineFactory;
use super::preprocess::preprocess_text;
use super::progress::default_progress_callback;
use super::registry::{self, ModelRegistryEntry};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::{Error, Result};

/// Provider family reported by [`EmbeddingProvider::provider`].
pub const PROVIDER_NAME: &str = "local";

/// One embedding and its length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingVector {
    /// Vector components.
    pub vector: Vec<f32>,
    /// Always `vector.len()`.
    pub dimension: usize,
}

impl EmbeddingVector {
    /// Wrap a vector, recording its length.
    #[must_use]
    pub fn new(vector: Vec<f32>) -> Self {
        let dimension = vector.len();
        Self { vector, dimension }
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(vector: Vec<f32>) -> Self {
        Self::new(vector)
    }
}

static INSTANCE: Lazy<parking_lot::Mutex<Option<Arc<EmbeddingProvider>>>> =
    Lazy::new(|| parking_lot::Mutex::new(None));

/// Local embedding provider.
///
/// The pipeline is created on first use and can be released with
/// [`dispose`](Self::dispose); a disposed provider reloads on the next call.
pub struct EmbeddingProvider {
    config: EmbeddingConfig,
    model: String,
    max_tokens: usize,
    dimension: AtomicUsize,
    factory: Arc<dyn PipelineFactory>,
    pipeline: RwLock<Option<Arc<dyn FeatureExtractor>>>,
}

impl EmbeddingProvider {
    /// Create a provider backed by ONNX Runtime.
    ///
    /// No model is loaded until the first embedding call.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the model is not in the
    /// registry.
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let factory = Arc::new(OnnxPipelineFactory::from_config(&config));
        Self::with_factory(config, factory)
    }

    /// Create a provider using a custom pipeline factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the model is not in the
    /// registry.
    pub fn with_factory(
        config: EmbeddingConfig,
        factory: Arc<dyn PipelineFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let model = config.resolved_model().to_string();
        let entry = registry::lookup(&model)?;

        tracing::debug!(
            model = %model,
            dimension = entry.dimension,
            max_tokens = entry.max_tokens,
            "Embedding provider created"
        );

        Ok(Self {
            config,
            model,
            max_tokens: entry.max_tokens,
            dimension: AtomicUsize::new(entry.dimension),
            factory,
            pipeline: RwLock::new(None),
        })
    }

    /// Shared process-wide provider.
    ///
    /// The first call creates the instance from `config` (or defaults).
    /// Later calls return it; a `config` naming a different model is
    /// rejected, other differences are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails or `config` conflicts with the
    /// existing instance.
    pub fn get_instance(config: Option<EmbeddingConfig>) -> Result<Arc<Self>> {
        let mut slot = INSTANCE.lock();

        if let Some(existing) = slot.as_ref() {
            if let Some(requested) = config {
                existing.check_compatible(&requested)?;
            }
            return Ok(Arc::clone(existing));
        }

        let provider = Arc::new(Self::new(config.unwrap_or_default())?);
        *slot = Some(Arc::clone(&provider));
        tracing::info!(model = %provider.model, "Shared embedding provider initialized");
        Ok(provider)
    }

    /// Clear the shared provider, releasing its pipeline.
    pub async fn reset_instance() {
        let previous = INSTANCE.lock().take();
        if let Some(provider) = previous {
            provider.dispose().await;
            tracing::info!(model = %provider.model, "Shared embedding provider reset");
        }
    }

    /// Registry of supported models.
    #[must_use]
    pub fn supported_models() -> &'static BTreeMap<&'static str, ModelRegistryEntry> {
        registry::supported_models()
    }

    fn check_compatible(&self, requested: &EmbeddingConfig) -> Result<()> {
        let requested_model = requested.resolved_model();
        if requested_model != self.model {
            return Err(Error::config(format!(
                "embedding provider already initialized with model '{}', \
                 requested '{requested_model}'; reset the instance first",
                self.model
            )));
        }

        if requested.cache_dir != self.config.cache_dir
            || requested.quantized != self.config.quantized
            || requested.batch_size != self.config.batch_size
            || requested.intra_threads != self.config.intra_threads
            || requested.progress_callback.is_some()
        {
            tracing::warn!(
                model = %self.model,
                "Ignoring settings passed to an already initialized embedding provider"
            );
        }
        Ok(())
    }

    /// Return the pipeline, creating it if absent.
    ///
    /// Creation happens under the write lock so concurrent first callers
    /// share one pipeline.
    async fn pipeline(&self) -> Result<Arc<dyn FeatureExtractor>> {
        if let Some(pipeline) = self.pipeline.read().await.as_ref() {
            return Ok(Arc::clone(pipeline));
        }

        let mut guard = self.pipeline.write().await;
        if let Some(pipeline) = guard.as_ref() {
            return Ok(Arc::clone(pipeline));
        }

        tracing::info!(model = %self.model, "Initializing embedding pipeline");

        let factory = Arc::clone(&self.factory);
        let model = self.model.clone();
        let options = PipelineOptions {
            progress_callback: self
                .config
                .progress_callback
                .clone()
                .unwrap_or_else(default_progress_callback),
            max_tokens: self.max_tokens,
        };

        let pipeline = tokio::task::spawn_blocking(move || {
            factory.create(Task::FeatureExtraction, &model, &options)
        })
        .await
        .map_err(|e| EmbeddingError::Task(format!("pipeline construction failed: {e}")))??;

        *guard = Some(Arc::clone(&pipeline));
        tracing::info!(model = %self.model, "Embedding pipeline ready");
        Ok(pipeline)
    }

    /// Generate embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be acquired or inference fails.
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let text = preprocess_text(text, self.max_tokens);
        let pipeline = self.pipeline().await?;

        let vector = tokio::task::spawn_blocking(move || {
            pipeline.extract(&text, &ExtractOptions::MEAN_NORMALIZED)
        })
        .await
        .map_err(|e| EmbeddingError::Task(format!("inference task failed: {e}")))??;

        self.observe_dimension(vector.len());
        Ok(EmbeddingVector::new(vector))
    }

    /// Generate embeddings for multiple texts, in input order.
    ///
    /// Texts are sent to the engine in chunks of `batch_size`. Any failure
    /// aborts the whole batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be acquired or any chunk fails.
    pub async fn embed_batch<S: AsRef<str> + Sync>(
        &self,
        texts: &[S],
    ) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = texts
            .iter()
            .map(|text| preprocess_text(text.as_ref(), self.max_tokens))
            .collect();
        let pipeline = self.pipeline().await?;

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            let chunk = chunk.to_vec();
            let expected = chunk.len();
            let pipeline = Arc::clone(&pipeline);

            let vectors = tokio::task::spawn_blocking(move || {
                pipeline.extract_batch(&chunk, &ExtractOptions::MEAN_NORMALIZED)
            })
            .await
            .map_err(|e| EmbeddingError::Task(format!("inference task failed: {e}")))??;

            if vectors.len() != expected {
                return Err(EmbeddingError::Inference(format!(
                    "engine returned {} embeddings for {expected} texts",
                    vectors.len()
                ))
                .into());
            }

            for vector in vectors {
                self.observe_dimension(vector.len());
                results.push(EmbeddingVector::new(vector));
            }
        }

        tracing::debug!(count = results.len(), model = %self.model, "Batch embedded");
        Ok(results)
    }

    /// Adopt the measured output length if it differs from the registry.
    fn observe_dimension(&self, measured: usize) {
        let previous = self.dimension.swap(measured, Ordering::AcqRel);
        if previous != measured {
            tracing::warn!(
                model = %self.model,
                expected = previous,
                measured,
                "Embedding dimension differs from registry; using measured value"
            );
        }
    }

    /// Length of the vectors this provider produces.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Acquire)
    }

    /// Provider family name, independent of model.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Resolved model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Token budget applied to inputs.
    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Configuration the provider was built with.
    #[must_use]
    pub const fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Check whether a pipeline is currently held.
    pub async fn is_loaded(&self) -> bool {
        self.pipeline.read().await.is_some()
    }

    /// Release the pipeline. Safe to call repeatedly.
    pub async fn dispose(&self) {
        if self.pipeline.write().await.take().is_some() {
            tracing::debug!(model = %self.model, "Embedding pipeline released");
        }
    }
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("model", &self.model)
            .field("dimension", &self.dimension())
            .field("max_tokens", &self.max_tokens)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

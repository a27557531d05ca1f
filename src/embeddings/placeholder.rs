//! Deterministic stand-in engine.
//!
//! Produces hash-derived vectors without a model. Used by tests, benchmarks
//! and the CLI's `--placeholder` mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::engine::{ExtractOptions, FeatureExtractor, PipelineFactory, PipelineOptions, Task};
use super::progress::{ProgressEvent, ProgressStatus};
use crate::Result;

/// Create a placeholder embedding.
///
/// Returns a deterministic, L2-normalized vector based on the text hash.
#[must_use]
pub fn placeholder_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut embedding = raw_embedding(text, dimension);

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}

#[allow(clippy::cast_precision_loss)]
fn raw_embedding(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut seed = hasher.finish();

    let mut embedding = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let value = (((seed >> 33) as f32) / (u32::MAX as f32)).mul_add(2.0, -1.0);
        embedding.push(value);
    }
    embedding
}

/// Placeholder pipeline of a fixed dimension.
#[derive(Debug, Clone)]
pub struct PlaceholderPipeline {
    model_id: String,
    dimension: usize,
}

impl PlaceholderPipeline {
    /// Create a pipeline producing `dimension`-length vectors.
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
        }
    }
}

impl FeatureExtractor for PlaceholderPipeline {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn extract(&self, text: &str, options: &ExtractOptions) -> Result<Vec<f32>> {
        if options.normalize {
            Ok(placeholder_embedding(text, self.dimension))
        } else {
            Ok(raw_embedding(text, self.dimension))
        }
    }
}

/// Factory for [`PlaceholderPipeline`]s.
///
/// Counts how many pipelines it has built.
#[derive(Debug, Default)]
pub struct PlaceholderFactory {
    dimension: Option<usize>,
    created: AtomicUsize,
}

impl PlaceholderFactory {
    /// Pipelines take their dimension from the model registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipelines produce `dimension`-length vectors regardless of model.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            created: AtomicUsize::new(0),
        }
    }

    /// Number of pipelines built so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl PipelineFactory for PlaceholderFactory {
    fn create(
        &self,
        task: Task,
        model_id: &str,
        options: &PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>> {
        let dimension = match self.dimension {
            Some(dimension) => dimension,
            None => super::registry::lookup(model_id)?.dimension,
        };

        tracing::debug!(%task, model = model_id, dimension, "Creating placeholder pipeline");
        (options.progress_callback)(&ProgressEvent::new(model_id, 0.0, ProgressStatus::Loading));
        self.created.fetch_add(1, Ordering::SeqCst);
        (options.progress_callback)(&ProgressEvent::new(model_id, 100.0, ProgressStatus::Ready));

        Ok(Arc::new(PlaceholderPipeline::new(model_id, dimension)))
    }
}

//! Integration tests for the embedding provider against test engines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use local_embed::embeddings::{
    placeholder_embedding, ExtractOptions, FeatureExtractor, PipelineFactory, PipelineOptions,
    PlaceholderFactory, PlaceholderPipeline, Task,
};
use local_embed::{EmbeddingConfig, EmbeddingError, EmbeddingProvider, Error, Result};

/// Factory that takes a while to build and counts constructions.
#[derive(Default)]
struct SlowFactory {
    created: AtomicUsize,
}

impl PipelineFactory for SlowFactory {
    fn create(
        &self,
        _task: Task,
        model_id: &str,
        _options: &PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>> {
        std::thread::sleep(Duration::from_millis(50));
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(PlaceholderPipeline::new(model_id, 384)))
    }
}

/// Factory that fails a set number of times before succeeding.
struct FlakyFactory {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyFactory {
    fn new(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }
}

impl PipelineFactory for FlakyFactory {
    fn create(
        &self,
        _task: Task,
        model_id: &str,
        _options: &PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EmbeddingError::ModelLoad("corrupted cache entry".to_string()).into());
        }
        Ok(Arc::new(PlaceholderPipeline::new(model_id, 384)))
    }
}

/// Extractor that rejects one poisoned input.
struct PoisonPipeline;

impl FeatureExtractor for PoisonPipeline {
    fn model_id(&self) -> &str {
        "poison"
    }

    fn extract(&self, text: &str, options: &ExtractOptions) -> Result<Vec<f32>> {
        if text.contains("poison") {
            return Err(EmbeddingError::Inference(format!("cannot embed '{text}'")).into());
        }
        PlaceholderPipeline::new("poison", 384).extract(text, options)
    }
}

/// Extractor whose batch call drops the last result.
struct ShortBatchPipeline;

impl FeatureExtractor for ShortBatchPipeline {
    fn model_id(&self) -> &str {
        "short"
    }

    fn extract(&self, text: &str, _options: &ExtractOptions) -> Result<Vec<f32>> {
        Ok(placeholder_embedding(text, 384))
    }

    fn extract_batch(&self, texts: &[String], options: &ExtractOptions) -> Result<Vec<Vec<f32>>> {
        let mut out = texts
            .iter()
            .map(|t| self.extract(t, options))
            .collect::<Result<Vec<_>>>()?;
        out.pop();
        Ok(out)
    }
}

/// Factory handing out a fixed pipeline.
struct FixedFactory(Arc<dyn FeatureExtractor>);

impl PipelineFactory for FixedFactory {
    fn create(
        &self,
        _task: Task,
        _model_id: &str,
        _options: &PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>> {
        Ok(Arc::clone(&self.0))
    }
}

fn provider_with(factory: Arc<dyn PipelineFactory>) -> EmbeddingProvider {
    EmbeddingProvider::with_factory(EmbeddingConfig::default(), factory).unwrap()
}

/// Concurrent first calls share a single pipeline construction.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_constructs_once() {
    let factory = Arc::new(SlowFactory::default());
    let provider = Arc::new(provider_with(factory.clone()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let provider = Arc::clone(&provider);
        handles.push(tokio::spawn(async move {
            provider.embed(&format!("text {i}")).await
        }));
    }
    for handle in handles {
        let embedded = handle.await.unwrap().unwrap();
        assert_eq!(embedded.dimension, 384);
    }

    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

/// Acquisition failures surface to the caller and are not cached.
#[tokio::test]
async fn test_acquisition_failure_propagates_and_retries_next_call() {
    let factory = Arc::new(FlakyFactory::new(1));
    let provider = provider_with(factory.clone());

    let err = provider.embed("hello").await.unwrap_err();
    assert!(matches!(err, Error::Embedding(EmbeddingError::ModelLoad(_))));
    assert!(err.to_string().contains("corrupted cache entry"));
    assert!(!provider.is_loaded().await);

    let embedded = provider.embed("hello").await.unwrap();
    assert_eq!(embedded.dimension, 384);
    assert_eq!(factory.attempts.load(Ordering::SeqCst), 2);
}

/// Batch acquisition failure returns the engine error.
#[tokio::test]
async fn test_batch_acquisition_failure() {
    let provider = provider_with(Arc::new(FlakyFactory::new(5)));
    let err = provider.embed_batch(&["a", "b"]).await.unwrap_err();
    assert!(err.to_string().contains("corrupted cache entry"));
}

/// One failing element aborts the whole batch.
#[tokio::test]
async fn test_batch_failure_is_all_or_nothing() {
    let provider = provider_with(Arc::new(FixedFactory(Arc::new(PoisonPipeline))));

    let err = provider
        .embed_batch(&["fine", "poison pill", "also fine"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(EmbeddingError::Inference(_))));

    let ok = provider.embed_batch(&["fine", "also fine"]).await.unwrap();
    assert_eq!(ok.len(), 2);
}

/// An engine returning the wrong number of vectors is rejected.
#[tokio::test]
async fn test_batch_count_mismatch_is_error() {
    let provider = provider_with(Arc::new(FixedFactory(Arc::new(ShortBatchPipeline))));
    let err = provider.embed_batch(&["a", "b", "c"]).await.unwrap_err();
    assert!(err.to_string().contains("3 texts"));
}

/// Repeated calls keep a stable dimension and deterministic output.
#[tokio::test]
async fn test_dimension_stable_across_calls() {
    let provider = provider_with(Arc::new(PlaceholderFactory::new()));

    let first = provider.embed("stable input").await.unwrap();
    let second = provider.embed("stable input").await.unwrap();
    let other = provider.embed("something else entirely").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.dimension, other.dimension);
    assert_eq!(first.dimension, provider.dimension());
}

/// Batch results line up with single embeds and preserve order.
#[tokio::test]
async fn test_batch_preserves_order() {
    let provider = provider_with(Arc::new(PlaceholderFactory::new()));
    let texts = vec!["zeta".to_string(), "alpha".to_string()];

    let batch = provider.embed_batch(&texts).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], provider.embed("zeta").await.unwrap());
    assert_eq!(batch[1], provider.embed("alpha").await.unwrap());
}

/// A disposed provider is reusable.
#[tokio::test]
async fn test_dispose_then_embed() {
    let factory = Arc::new(PlaceholderFactory::new());
    let provider = provider_with(factory.clone());

    provider.dispose().await;
    provider.embed("before").await.unwrap();
    provider.dispose().await;
    let after = provider.embed("after").await.unwrap();

    assert_eq!(after.dimension, 384);
    assert_eq!(factory.created(), 2);
}

/// Vectors from the adapter are unit length.
#[tokio::test]
async fn test_vectors_are_normalized() {
    let provider = provider_with(Arc::new(PlaceholderFactory::new()));
    let embedded = provider.embed("normalize me").await.unwrap();
    let norm: f32 = embedded.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-3);
}

/// Inputs are truncated to the model's token budget before inference.
#[tokio::test]
async fn test_long_input_is_truncated() {
    let provider = provider_with(Arc::new(PlaceholderFactory::new()));
    let budget = provider.max_tokens() * 4;

    let long = "x".repeat(budget * 3);
    let truncated = "x".repeat(budget);

    assert_eq!(
        provider.embed(&long).await.unwrap(),
        provider.embed(&truncated).await.unwrap()
    );
}

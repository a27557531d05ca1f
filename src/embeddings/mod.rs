//! ONNX-based embedding generation.
//!
//! This module provides:
//! - [`EmbeddingProvider`], the lazily loading embed/embed-batch API
//! - The pipeline boundary ([`PipelineFactory`], [`FeatureExtractor`])
//! - ONNX Runtime integration via the `ort` crate, with models fetched by `hf-hub`
//! - The static model registry

pub mod engine;
pub mod model;
pub mod placeholder;
pub mod pooling;
pub mod preprocess;
pub mod progress;
pub mod provider;
pub mod registry;

pub use engine::{ExtractOptions, FeatureExtractor, PipelineFactory, PipelineOptions, Pooling, Task};
pub use model::{OnnxPipeline, OnnxPipelineFactory};
pub use placeholder::{placeholder_embedding, PlaceholderFactory, PlaceholderPipeline};
pub use progress::{default_progress_callback, ProgressCallback, ProgressEvent, ProgressStatus};
pub use provider::{EmbeddingProvider, EmbeddingVector, PROVIDER_NAME};
pub use registry::{supported_models, ModelRegistryEntry, DEFAULT_MODEL};

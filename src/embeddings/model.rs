//! ONNX feature-extraction pipeline.
//!
//! Model files are resolved from the Hugging Face cache and downloaded with
//! `hf-hub` when missing, tokenized with `tokenizers`, and run with `ort`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hf_hub::api::sync::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Cache, Repo};
use ndarray::{Array2, ArrayView3};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::builder::SessionBuilder;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tokenizers::{Tokenizer, TruncationParams};

use super::engine::{
    ExtractOptions, FeatureExtractor, PipelineFactory, PipelineOptions, Pooling, Task,
};
use super::pooling::{cls_pool, l2_normalize, mean_pool};
use super::progress::{HubProgress, ProgressCallback, ProgressEvent, ProgressStatus};
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::Result;

/// Tokenizer file inside a model repository.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Full-precision ONNX graph inside a model repository.
pub const MODEL_FILE: &str = "onnx/model.onnx";

/// 8-bit quantized ONNX graph inside a model repository.
pub const QUANTIZED_MODEL_FILE: &str = "onnx/model_quantized.onnx";

/// A loaded ONNX model plus its tokenizer.
pub struct OnnxPipeline {
    model_id: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    needs_token_type_ids: bool,
    max_tokens: usize,
    model_path: PathBuf,
}

impl OnnxPipeline {
    /// Load a pipeline from local model and tokenizer files.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is missing or cannot be loaded.
    pub fn load(
        model_id: impl Into<String>,
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        max_tokens: usize,
        intra_threads: usize,
    ) -> Result<Self> {
        let model_id = model_id.into();
        let model_path = model_path.as_ref().to_path_buf();
        let tokenizer_path = tokenizer_path.as_ref();

        for path in [model_path.as_path(), tokenizer_path] {
            if !path.exists() {
                return Err(EmbeddingError::ModelLoad(format!(
                    "model file not found: {}",
                    path.display()
                ))
                .into());
            }
        }

        let tokenizer = load_tokenizer(tokenizer_path, max_tokens)?;

        tracing::info!(
            model = %model_id,
            path = %model_path.display(),
            "Loading ONNX embedding model"
        );

        let session = SessionBuilder::new()
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set threads: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbeddingError::ModelLoad(format!("failed to load model: {e}")))?;

        let needs_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        tracing::info!(
            model = %model_id,
            inputs = session.inputs().len(),
            outputs = session.outputs().len(),
            needs_token_type_ids,
            "Model loaded successfully"
        );

        Ok(Self {
            model_id,
            session: Mutex::new(session),
            tokenizer,
            needs_token_type_ids,
            max_tokens,
            model_path,
        })
    }

    /// Get the model path.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Get the tokenizer truncation length.
    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Tokenize, run the graph and pool a batch of texts.
    fn run(&self, texts: &[String], options: &ExtractOptions) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenization(format!("failed to tokenize: {e}")))?;

        let batch_size = encodings.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_tokens);
        if max_len == 0 {
            return Err(EmbeddingError::Tokenization("empty tokenization".to_string()).into());
        }

        // Right-padded, i64 as BERT-style graphs expect.
        let mut input_ids_vec: Vec<i64> = vec![0; batch_size * max_len];
        let mut attention_mask_vec: Vec<i64> = vec![0; batch_size * max_len];
        let mut token_type_ids_vec: Vec<i64> = vec![0; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            let len = ids.len().min(max_len);
            for j in 0..len {
                input_ids_vec[i * max_len + j] = i64::from(ids[j]);
                attention_mask_vec[i * max_len + j] = i64::from(mask[j]);
                token_type_ids_vec[i * max_len + j] = i64::from(types[j]);
            }
        }

        let mask = Array2::from_shape_vec((batch_size, max_len), attention_mask_vec.clone())
            .map_err(|e| EmbeddingError::Inference(format!("bad attention mask shape: {e}")))?;

        #[allow(clippy::cast_possible_wrap)]
        let shape = vec![batch_size as i64, max_len as i64];

        let input_ids = Tensor::from_array((shape.clone(), input_ids_vec))
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create input_ids: {e}")))?;
        let attention_mask = Tensor::from_array((shape.clone(), attention_mask_vec))
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create attention_mask: {e}")))?;

        let mut session = self.session.lock();
        let outputs = if self.needs_token_type_ids {
            let token_type_ids = Tensor::from_array((shape, token_type_ids_vec)).map_err(|e| {
                EmbeddingError::Runtime(format!("failed to create token_type_ids: {e}"))
            })?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            ])
        }
        .map_err(|e| EmbeddingError::Runtime(format!("inference failed: {e}")))?;

        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Runtime(format!("failed to read output: {e}")))?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 || dims[0] != batch_size {
            return Err(EmbeddingError::Inference(format!(
                "unexpected output shape: {dims:?}"
            ))
            .into());
        }

        let hidden = ArrayView3::from_shape((dims[0], dims[1], dims[2]), output_data)
            .map_err(|e| EmbeddingError::Inference(format!("bad output buffer: {e}")))?;

        let mut pooled = match options.pooling {
            Pooling::Mean => mean_pool(hidden, mask.view()),
            Pooling::Cls => cls_pool(hidden),
        };
        if options.normalize {
            l2_normalize(&mut pooled);
        }

        Ok(pooled.rows().into_iter().map(|row| row.to_vec()).collect())
    }
}

impl FeatureExtractor for OnnxPipeline {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn extract(&self, text: &str, options: &ExtractOptions) -> Result<Vec<f32>> {
        self.run(&[text.to_string()], options)?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Inference("no embedding returned".to_string()).into())
    }

    fn extract_batch(&self, texts: &[String], options: &ExtractOptions) -> Result<Vec<Vec<f32>>> {
        self.run(texts, options)
    }
}

impl std::fmt::Debug for OnnxPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPipeline")
            .field("model_id", &self.model_id)
            .field("model_path", &self.model_path)
            .field("max_tokens", &self.max_tokens)
            .field("needs_token_type_ids", &self.needs_token_type_ids)
            .field("session", &"<Mutex<Session>>")
            .finish_non_exhaustive()
    }
}

/// Load a tokenizer truncating at `max_tokens`.
///
/// # Errors
///
/// Returns an error if the tokenizer cannot be loaded.
pub fn load_tokenizer(path: impl AsRef<Path>, max_tokens: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path.as_ref())
        .map_err(|e| EmbeddingError::Tokenization(format!("failed to load tokenizer: {e}")))?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_tokens,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::Tokenization(format!("failed to set truncation: {e}")))?;
    tokenizer.with_padding(None);

    Ok(tokenizer)
}

/// Builds [`OnnxPipeline`]s from Hugging Face model repositories.
#[derive(Debug, Clone)]
pub struct OnnxPipelineFactory {
    cache_dir: Option<PathBuf>,
    quantized: bool,
    intra_threads: usize,
}

impl OnnxPipelineFactory {
    /// Create a factory.
    ///
    /// `cache_dir` of `None` uses the standard Hugging Face cache
    /// (`HF_HOME`, else `~/.cache/huggingface`).
    #[must_use]
    pub const fn new(cache_dir: Option<PathBuf>, quantized: bool, intra_threads: usize) -> Self {
        Self {
            cache_dir,
            quantized,
            intra_threads,
        }
    }

    /// Create a factory from provider configuration.
    #[must_use]
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.quantized, config.intra_threads)
    }

    /// ONNX graph file this factory loads.
    #[must_use]
    pub const fn onnx_file(&self) -> &'static str {
        if self.quantized {
            QUANTIZED_MODEL_FILE
        } else {
            MODEL_FILE
        }
    }

    fn cache(&self) -> Cache {
        self.cache_dir
            .as_ref()
            .map_or_else(Cache::default, |dir| Cache::new(dir.clone()))
    }

    fn api(&self) -> Result<Api> {
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        builder.build().map_err(|e| {
            EmbeddingError::Runtime(format!("failed to create hub client: {e}")).into()
        })
    }

    /// Resolve one repository file, downloading it if it is not cached.
    fn fetch(
        &self,
        model_id: &str,
        filename: &str,
        repo: &mut Option<ApiRepo>,
        callback: &ProgressCallback,
    ) -> Result<PathBuf> {
        if let Some(path) = self.cache().repo(Repo::model(model_id.to_string())).get(filename) {
            tracing::debug!(model = model_id, file = filename, "Using cached model file");
            callback(&ProgressEvent::new(filename, 100.0, ProgressStatus::Done));
            return Ok(path);
        }

        if repo.is_none() {
            *repo = Some(self.api()?.model(model_id.to_string()));
        }
        let hub_repo = repo
            .as_ref()
            .ok_or_else(|| crate::Error::internal("hub repository handle missing"))?;

        tracing::info!(model = model_id, file = filename, "Downloading model file");
        hub_repo
            .download_with_progress(filename, HubProgress::new(Arc::clone(callback)))
            .map_err(|e| EmbeddingError::download(model_id, filename, e).into())
    }
}

impl PipelineFactory for OnnxPipelineFactory {
    fn create(
        &self,
        task: Task,
        model_id: &str,
        options: &PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>> {
        tracing::info!(%task, model = model_id, file = self.onnx_file(), "Creating pipeline");

        let callback = &options.progress_callback;
        let mut repo = None;
        let tokenizer_path = self.fetch(model_id, TOKENIZER_FILE, &mut repo, callback)?;
        let model_path = self.fetch(model_id, self.onnx_file(), &mut repo, callback)?;

        callback(&ProgressEvent::new(model_id, 0.0, ProgressStatus::Loading));
        let pipeline = OnnxPipeline::load(
            model_id,
            &model_path,
            &tokenizer_path,
            options.max_tokens,
            self.intra_threads,
        )?;
        callback(&ProgressEvent::new(model_id, 100.0, ProgressStatus::Ready));

        Ok(Arc::new(pipeline))
    }
}

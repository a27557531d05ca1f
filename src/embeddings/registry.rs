//! Registry of known embedding models.
//!
//! Dimension and token budget for a configured model are read from here,
//! never assumed.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::EmbeddingError;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "Xenova/all-MiniLM-L6-v2";

/// Metadata for one supported model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelRegistryEntry {
    /// Output vector length.
    pub dimension: usize,
    /// Human-readable description.
    pub description: &'static str,
    /// Maximum input length in tokens.
    pub max_tokens: usize,
}

static SUPPORTED_MODELS: Lazy<BTreeMap<&'static str, ModelRegistryEntry>> = Lazy::new(|| {
    BTreeMap::from([
        (
            DEFAULT_MODEL,
            ModelRegistryEntry {
                dimension: 384,
                description: "Fast, general-purpose English model (default)",
                max_tokens: 512,
            },
        ),
        (
            "Xenova/all-MiniLM-L12-v2",
            ModelRegistryEntry {
                dimension: 384,
                description: "Deeper MiniLM variant, better quality at half the speed",
                max_tokens: 512,
            },
        ),
        (
            "Xenova/bge-small-en-v1.5",
            ModelRegistryEntry {
                dimension: 384,
                description: "BAAI general embedding, small English model",
                max_tokens: 512,
            },
        ),
        (
            "Xenova/bge-base-en-v1.5",
            ModelRegistryEntry {
                dimension: 768,
                description: "BAAI general embedding, base English model",
                max_tokens: 512,
            },
        ),
        (
            "Xenova/all-mpnet-base-v2",
            ModelRegistryEntry {
                dimension: 768,
                description: "High quality general-purpose model, slower",
                max_tokens: 384,
            },
        ),
    ])
});

/// All supported models keyed by identifier.
#[must_use]
pub fn supported_models() -> &'static BTreeMap<&'static str, ModelRegistryEntry> {
    &SUPPORTED_MODELS
}

/// Look up a model by identifier.
///
/// # Errors
///
/// Returns `UnsupportedModel` if the identifier is not registered.
pub fn lookup(model_id: &str) -> Result<&'static ModelRegistryEntry, EmbeddingError> {
    SUPPORTED_MODELS
        .get(model_id)
        .ok_or_else(|| EmbeddingError::UnsupportedModel(model_id.to_string()))
}

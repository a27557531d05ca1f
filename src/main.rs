//! local-embed - local sentence embeddings from the command line
//!
//! Entry point for the `local-embed` binary.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use local_embed::embeddings::PlaceholderFactory;
use local_embed::observability::{self, init_tracing, TracingConfig};
use local_embed::{EmbeddingConfig, EmbeddingProvider, Result};
use serde::Serialize;

/// local-embed - local sentence embeddings
///
/// Settings start from the `LOCAL_EMBED_*` environment; flags given on the
/// command line override them.
#[derive(Parser, Debug)]
#[command(name = "local-embed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model identifier (see `models`) [env: LOCAL_EMBED_MODEL]
    #[arg(short, long)]
    model: Option<String>,

    /// Model cache directory [env: LOCAL_EMBED_CACHE_DIR]
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Load the full-precision graph instead of the quantized one
    /// [env: LOCAL_EMBED_QUANTIZED=false]
    #[arg(long)]
    full_precision: bool,

    /// ONNX Runtime intra-op threads [env: LOCAL_EMBED_THREADS]
    #[arg(long)]
    threads: Option<usize>,

    /// Texts per inference call [env: LOCAL_EMBED_BATCH_SIZE, default: 32]
    #[arg(long)]
    batch_size: Option<usize>,

    /// Use deterministic hash embeddings instead of a model
    #[arg(long, env = "LOCAL_EMBED_PLACEHOLDER")]
    placeholder: bool,

    /// Log level: trace, debug, info, warn, error [env: LOCAL_EMBED_LOG_LEVEL, default: info]
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging output [env: LOCAL_EMBED_LOG_JSON]
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed texts and print one JSON object per line
    Embed {
        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// List supported models as JSON
    Models,
}

#[derive(Serialize)]
struct EmbedLine<'a> {
    text: &'a str,
    dimension: usize,
    vector: &'a [f32],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let tracing_config = build_tracing_config(&cli, observability::config_from_env());
    tracing_config.validate()?;
    init_tracing(&tracing_config.level, tracing_config.json);

    tracing::debug!("local-embed v{} starting...", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Models => {
            let models = EmbeddingProvider::supported_models();
            println!("{}", serde_json::to_string_pretty(models)?);
        }
        Command::Embed { texts } => {
            let config = build_config(&cli, EmbeddingConfig::from_env()?);
            tracing::debug!(?config, "Configuration loaded");

            let provider = if cli.placeholder {
                EmbeddingProvider::with_factory(config, Arc::new(PlaceholderFactory::new()))?
            } else {
                EmbeddingProvider::new(config)?
            };

            let embeddings = provider.embed_batch(texts).await?;
            for (text, embedding) in texts.iter().zip(&embeddings) {
                let line = EmbedLine {
                    text,
                    dimension: embedding.dimension,
                    vector: &embedding.vector,
                };
                println!("{}", serde_json::to_string(&line)?);
            }

            provider.dispose().await;
        }
    }

    Ok(())
}

/// Apply command-line overrides on top of the environment-derived config.
fn build_config(cli: &Cli, mut config: EmbeddingConfig) -> EmbeddingConfig {
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if cli.full_precision {
        config.quantized = false;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(threads) = cli.threads {
        config.intra_threads = threads;
    }
    config
}

fn build_tracing_config(cli: &Cli, mut config: TracingConfig) -> TracingConfig {
    if let Some(level) = &cli.log_level {
        config.level.clone_from(level);
    }
    config.json |= cli.log_json;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("local-embed").chain(args.iter().copied()))
    }

    #[test]
    fn test_env_quantized_false_survives_without_flag() {
        let base = EmbeddingConfig {
            quantized: false,
            ..Default::default()
        };
        let config = build_config(&parse(&["embed", "hi"]), base);
        assert!(!config.quantized);
    }

    #[test]
    fn test_env_values_kept_without_flags() {
        let base = EmbeddingConfig {
            batch_size: 8,
            intra_threads: 2,
            ..EmbeddingConfig::new()
                .with_model("Xenova/all-mpnet-base-v2")
                .with_cache_dir("/srv/models")
        };
        let config = build_config(&parse(&["models"]), base);
        assert_eq!(config.resolved_model(), "Xenova/all-mpnet-base-v2");
        assert_eq!(config.cache_dir, Some(PathBuf::from("/srv/models")));
        assert!(config.quantized);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.intra_threads, 2);
    }

    #[test]
    fn test_flags_override_env() {
        let base = EmbeddingConfig::new().with_model("Xenova/all-mpnet-base-v2");
        let cli = parse(&[
            "--model",
            "Xenova/bge-base-en-v1.5",
            "--cache-dir",
            "/tmp/models",
            "--full-precision",
            "--batch-size",
            "4",
            "--threads",
            "3",
            "embed",
            "hi",
        ]);
        let config = build_config(&cli, base);
        assert_eq!(config.resolved_model(), "Xenova/bge-base-en-v1.5");
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/models")));
        assert!(!config.quantized);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.intra_threads, 3);
    }

    #[test]
    fn test_tracing_env_kept_without_flags() {
        let base = TracingConfig {
            level: "debug".to_string(),
            json: true,
        };
        let config = build_tracing_config(&parse(&["models"]), base);
        assert_eq!(config.level, "debug");
        assert!(config.json);
    }

    #[test]
    fn test_tracing_flags_override_env() {
        let cli = parse(&["--log-level", "warn", "--log-json", "models"]);
        let config = build_tracing_config(&cli, TracingConfig::default());
        assert_eq!(config.level, "warn");
        assert!(config.json);
    }
}

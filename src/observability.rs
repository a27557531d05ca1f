//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels, overridable through `RUST_LOG`

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Environment variable holding the log level.
pub const ENV_LOG_LEVEL: &str = "LOCAL_EMBED_LOG_LEVEL";

/// Environment variable enabling JSON output.
pub const ENV_LOG_JSON: &str = "LOCAL_EMBED_LOG_JSON";

/// Accepted log levels.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Tracing configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TracingConfig {
    /// Validate the log level.
    ///
    /// # Errors
    ///
    /// Returns an error if the level is not one of [`LOG_LEVELS`].
    pub fn validate(&self) -> crate::Result<()> {
        if LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            Ok(())
        } else {
            Err(crate::Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.level,
                LOG_LEVELS.join(", ")
            )))
        }
    }
}

/// Initialize tracing with the given level and format.
///
/// Logs go to stderr so stdout stays clean for command output.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been initialized in this process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Get current tracing configuration from environment variables.
///
/// Respects `LOCAL_EMBED_LOG_LEVEL` (default "info") and
/// `LOCAL_EMBED_LOG_JSON` (default false).
#[must_use]
pub fn config_from_env() -> TracingConfig {
    config_from_lookup(|key| std::env::var(key).ok())
}

fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TracingConfig {
    let level = lookup(ENV_LOG_LEVEL).unwrap_or_else(|| "info".to_string());
    let json = lookup(ENV_LOG_JSON)
        .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));

    TracingConfig { level, json }
}

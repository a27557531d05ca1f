//! Model acquisition progress reporting.

use std::sync::Arc;

use serde::Serialize;

/// Callback invoked with progress events while a model is acquired.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Stage of model acquisition a progress event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// A file download is about to start.
    Initiate,
    /// Bytes of a file are arriving.
    Downloading,
    /// A file is available locally.
    Done,
    /// The model is being loaded into the runtime.
    Loading,
    /// The pipeline is ready for inference.
    Ready,
}

impl ProgressStatus {
    /// Lowercase name as it appears in serialized events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiate => "initiate",
            Self::Downloading => "downloading",
            Self::Done => "done",
            Self::Loading => "loading",
            Self::Ready => "ready",
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// File (or model identifier) the event is about.
    pub file: String,
    /// Completion percentage in `0.0..=100.0`.
    pub progress: f32,
    /// Acquisition stage.
    pub status: ProgressStatus,
}

impl ProgressEvent {
    /// Create an event, clamping `progress` into `0.0..=100.0`.
    pub fn new(file: impl Into<String>, progress: f32, status: ProgressStatus) -> Self {
        Self {
            file: file.into(),
            progress: progress.clamp(0.0, 100.0),
            status,
        }
    }
}

/// Progress callback used when the caller does not supply one.
///
/// Writes human-readable lines through `tracing`. Download progress is
/// reported in 10% steps.
#[must_use]
pub fn default_progress_callback() -> ProgressCallback {
    Arc::new(log_progress)
}

fn log_progress(event: &ProgressEvent) {
    match event.status {
        ProgressStatus::Initiate => {
            tracing::info!(file = %event.file, "Downloading model file");
        }
        ProgressStatus::Downloading => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let percent = event.progress as u32;
            if percent % 10 == 0 {
                tracing::info!(file = %event.file, "Downloading {}: {percent}%", event.file);
            }
        }
        ProgressStatus::Done => {
            tracing::info!(file = %event.file, "Model file ready");
        }
        ProgressStatus::Loading => {
            tracing::info!(file = %event.file, "Loading model");
        }
        ProgressStatus::Ready => {
            tracing::info!(file = %event.file, "Model loaded");
        }
    }
}

/// Adapts `hf-hub` download progress into [`ProgressEvent`]s.
///
/// Only whole-percent changes are forwarded.
#[derive(Clone)]
pub(crate) struct HubProgress {
    callback: ProgressCallback,
    file: String,
    total: usize,
    downloaded: usize,
    last_percent: Option<u32>,
}

impl HubProgress {
    pub(crate) fn new(callback: ProgressCallback) -> Self {
        Self {
            callback,
            file: String::new(),
            total: 0,
            downloaded: 0,
            last_percent: None,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.downloaded as f64 / self.total as f64) * 100.0).min(100.0) as u32
    }

    fn emit(&self, progress: f32, status: ProgressStatus) {
        (self.callback)(&ProgressEvent::new(self.file.clone(), progress, status));
    }
}

impl hf_hub::api::Progress for HubProgress {
    fn init(&mut self, size: usize, filename: &str) {
        self.file = filename.to_string();
        self.total = size;
        self.downloaded = 0;
        self.last_percent = None;
        self.emit(0.0, ProgressStatus::Initiate);
    }

    fn update(&mut self, size: usize) {
        self.downloaded = self.downloaded.saturating_add(size);
        let percent = self.percent();
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            #[allow(clippy::cast_precision_loss)]
            self.emit(percent as f32, ProgressStatus::Downloading);
        }
    }

    fn finish(&mut self) {
        self.emit(100.0, ProgressStatus::Done);
    }
}

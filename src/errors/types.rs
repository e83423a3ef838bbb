//! Error type definitions for the emberlay render cache
//!
//! Variants map one-to-one onto the failure classes a request can end in;
//! `thiserror` provides the trait implementations and error chaining.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for render-cache operations
#[derive(Error, Debug)]
pub enum RenderError {
    /// The source image has no decodable visual stream
    #[error("probe failed for {}: {detail}", .path.display())]
    Probe { path: PathBuf, detail: String },

    /// An external pipeline stage exited non-zero or produced no output
    #[error("pipeline stage '{stage}' failed: {detail}")]
    Stage { stage: &'static str, detail: String },

    /// Persistent index failure; fatal, not retried
    #[error("index error: {0}")]
    Index(#[from] sqlx::Error),

    /// Cache-root or temp-file filesystem failure; fatal, not retried
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The configured overlay clip is missing
    #[error("overlay clip not found: {}", .path.display())]
    OverlayMissing { path: PathBuf },

    /// Failed to launch an external tool (ffmpeg/ffprobe not installed)
    #[error("failed to spawn {tool}: {detail}")]
    SpawnFailed { tool: String, detail: String },
}

impl RenderError {
    /// Create a probe error for a source image
    pub fn probe(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create a stage error carrying the failing stage's identity
    pub fn stage(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            detail: detail.into(),
        }
    }

    /// Create a spawn error for an external tool
    pub fn spawn_failed(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SpawnFailed {
            tool: tool.into(),
            detail: detail.into(),
        }
    }
}

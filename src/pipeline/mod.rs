//! Render pipeline
//!
//! The canonical render is a two-stage external ffmpeg pipeline: composite
//! the overlay clip over the scaled background into an intermediate video,
//! then transcode that video into the canonical animated GIF. MP4 delivery
//! is a separate derive stage that re-encodes a cached GIF on demand.
//!
//! Stages run as independent processes; a failing stage aborts the rest of
//! its render and surfaces the stage name with ffmpeg's diagnostic. Nothing
//! is retried and no timeout is imposed.

pub mod graph;
pub mod probe;

use crate::config::RenderConfig;
use crate::errors::{RenderError, Result};
use crate::models::OutputFormat;
use crate::temp::TempFile;
use async_trait::async_trait;
use probe::ImageProber;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Seam between the orchestrator and the external encoder.
///
/// Both delivery surfaces drive renders through this trait; tests substitute
/// a counting backend to observe which stages a request actually runs.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Produce the canonical artifact for a source image at `output`.
    async fn render_canonical(
        &self,
        source_image: &Path,
        overlay_clip: &Path,
        low_quality: bool,
        output: &Path,
    ) -> Result<()>;

    /// Re-encode a canonical artifact into `target` format at `output`.
    async fn derive_format(
        &self,
        canonical: &Path,
        target: OutputFormat,
        output: &Path,
    ) -> Result<()>;
}

/// The real backend: ffprobe + ffmpeg subprocess invocations.
pub struct FfmpegPipeline {
    ffmpeg_command: String,
    prober: ImageProber,
}

impl FfmpegPipeline {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            ffmpeg_command: config.ffmpeg_command.clone(),
            prober: ImageProber::new(&config.ffprobe_command),
        }
    }

    async fn run_stage(&self, stage: &'static str, args: &[String], output: &Path) -> Result<()> {
        debug!("running stage '{}' with {} args", stage, args.len());

        let mut cmd = Command::new(&self.ffmpeg_command);
        cmd.args(args);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let result = cmd
            .output()
            .await
            .map_err(|e| RenderError::spawn_failed(&self.ffmpeg_command, e.to_string()))?;

        if !result.status.success() {
            return Err(RenderError::stage(stage, diagnostic_tail(&result.stderr)));
        }

        // A zero exit without a readable output file still counts as failure
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(RenderError::stage(stage, "no output file produced"));
        }

        Ok(())
    }
}

#[async_trait]
impl RenderBackend for FfmpegPipeline {
    async fn render_canonical(
        &self,
        source_image: &Path,
        overlay_clip: &Path,
        low_quality: bool,
        output: &Path,
    ) -> Result<()> {
        if !tokio::fs::try_exists(overlay_clip).await.unwrap_or(false) {
            return Err(RenderError::OverlayMissing {
                path: overlay_clip.to_path_buf(),
            });
        }

        let dims = self.prober.probe(source_image).await?;

        // Intermediate video lives only for this render; TempFile removes it
        // on every exit path.
        let intermediate = TempFile::new("mp4");
        let args = graph::composite_args(
            source_image,
            overlay_clip,
            dims,
            low_quality,
            intermediate.path(),
        );
        self.run_stage("composite", &args, intermediate.path()).await?;

        let args = graph::gif_transcode_args(intermediate.path(), output);
        self.run_stage("gif-transcode", &args, output).await?;

        Ok(())
    }

    async fn derive_format(
        &self,
        canonical: &Path,
        target: OutputFormat,
        output: &Path,
    ) -> Result<()> {
        match target {
            OutputFormat::Mp4 => {
                let args = graph::mp4_derive_args(canonical, output);
                self.run_stage("mp4-derive", &args, output).await
            }
            OutputFormat::Gif => Err(RenderError::stage(
                "derive",
                "canonical format needs no derivation",
            )),
        }
    }
}

/// Last few non-empty stderr lines, joined for a single-line diagnostic.
fn diagnostic_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(4);
    if lines.is_empty() {
        "no diagnostic output".to_string()
    } else {
        lines[start..].join(" | ")
    }
}

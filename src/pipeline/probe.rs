//! Source image probing
//!
//! Asks ffprobe for the pixel dimensions of the source image before the
//! composite stage. JSON output is requested even on failure so ffprobe's
//! own diagnostic can be surfaced in the error.

use crate::errors::{RenderError, Result};
use crate::models::ImageDimensions;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub struct ImageProber {
    ffprobe_command: String,
}

impl ImageProber {
    pub fn new(ffprobe_command: impl Into<String>) -> Self {
        Self {
            ffprobe_command: ffprobe_command.into(),
        }
    }

    /// Probe a source image for its pixel dimensions.
    ///
    /// Fails with [`RenderError::Probe`] when no decodable visual stream is
    /// present. No timeout is imposed; the probe runs until ffprobe exits.
    pub async fn probe(&self, path: &Path) -> Result<ImageDimensions> {
        debug!("probing source image: {}", path.display());

        let mut cmd = Command::new(&self.ffprobe_command);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_error",
            "-show_entries",
            "stream=width,height",
        ]);
        cmd.arg(path);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|e| RenderError::spawn_failed(&self.ffprobe_command, e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let data: serde_json::Value = if stdout.trim().is_empty() {
            // No JSON at all; fall back to stderr for the diagnostic
            let stderr = String::from_utf8_lossy(&output.stderr);
            serde_json::json!({ "error": { "string": stderr.trim() } })
        } else {
            serde_json::from_str(&stdout)
                .map_err(|e| RenderError::probe(path, format!("unparseable ffprobe output: {e}")))?
        };

        match Self::parse_dimensions(&data) {
            Some(dims) => {
                debug!(
                    "probed {}: {}x{}",
                    path.display(),
                    dims.width,
                    dims.height
                );
                Ok(dims)
            }
            None => {
                let detail = data
                    .get("error")
                    .and_then(|e| e.get("string"))
                    .and_then(|s| s.as_str())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("no decodable visual stream found")
                    .to_string();
                Err(RenderError::probe(path, detail))
            }
        }
    }

    /// Pick the first stream carrying both width and height.
    fn parse_dimensions(data: &serde_json::Value) -> Option<ImageDimensions> {
        let streams = data.get("streams")?.as_array()?;
        streams.iter().find_map(|stream| {
            let width = stream.get("width")?.as_u64()? as u32;
            let height = stream.get("height")?.as_u64()? as u32;
            if width == 0 || height == 0 {
                return None;
            }
            Some(ImageDimensions { width, height })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_first_stream_with_dimensions() {
        let data = json!({
            "streams": [
                { "codec_type": "data" },
                { "width": 1024, "height": 768 },
                { "width": 10, "height": 10 }
            ]
        });
        let dims = ImageProber::parse_dimensions(&data).unwrap();
        assert_eq!(dims, ImageDimensions { width: 1024, height: 768 });
    }

    #[test]
    fn no_visual_stream_is_none() {
        assert!(ImageProber::parse_dimensions(&json!({ "streams": [] })).is_none());
        assert!(ImageProber::parse_dimensions(&json!({ "streams": [{ "codec_type": "audio" }] }))
            .is_none());
        assert!(ImageProber::parse_dimensions(&json!({ "error": { "string": "corrupt" } }))
            .is_none());
    }

    #[test]
    fn zero_sized_streams_are_rejected() {
        let data = json!({ "streams": [{ "width": 0, "height": 100 }] });
        assert!(ImageProber::parse_dimensions(&data).is_none());
    }
}

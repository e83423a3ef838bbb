//! Source image acquisition
//!
//! Thin glue, deliberately minimal: a delivery surface hands the service a
//! local path or an http(s) URL and gets bytes back.

use anyhow::{Context, Result};

pub async fn fetch_image_bytes(source: &str) -> Result<Vec<u8>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source)
            .await
            .with_context(|| format!("failed to fetch {source}"))?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("failed to read {source}"))
    }
}

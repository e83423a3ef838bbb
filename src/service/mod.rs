//! Cache orchestrator
//!
//! Ties the fingerprinter, the persistent index and the render pipeline
//! together: given image bytes and a delivery format, return a ready
//! artifact, rendering it at most once per (content, quality) pair. A
//! per-key in-flight registry gives that guarantee under concurrency too:
//! requests for a key already being rendered wait for it and then re-check
//! the index instead of starting a duplicate render.

use crate::cache::{fingerprint, CacheIndex};
use crate::errors::Result;
use crate::models::OutputFormat;
use crate::pipeline::graph::CANONICAL_FORMAT;
use crate::pipeline::RenderBackend;
use crate::temp::TempFile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The outcome of a request, carrying its cleanup obligation in the type.
///
/// `Cached` paths are durable cache files the caller must never delete.
/// `Ephemeral` artifacts own a temp file that is removed when the artifact
/// is dropped.
#[derive(Debug)]
pub enum Artifact {
    Cached(PathBuf),
    Ephemeral(TempFile),
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Artifact::Cached(path) => path,
            Artifact::Ephemeral(temp) => temp.path(),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Artifact::Ephemeral(_))
    }
}

/// Content-addressed get-or-render service over a [`RenderBackend`].
pub struct RenderCache<B: RenderBackend> {
    index: CacheIndex,
    backend: B,
    overlay_clip: PathBuf,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<B: RenderBackend> RenderCache<B> {
    pub fn new(index: CacheIndex, backend: B, overlay_clip: impl Into<PathBuf>) -> Self {
        Self {
            index,
            backend,
            overlay_clip: overlay_clip.into(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Return an artifact for the image in the requested delivery format,
    /// rendering the canonical artifact only if it is not already cached.
    pub async fn get_or_render(
        &self,
        image_bytes: &[u8],
        format: OutputFormat,
        low_quality: bool,
    ) -> Result<Artifact> {
        let key = fingerprint(image_bytes, low_quality);

        if let Some(cached) = self.index.lookup(&key).await? {
            return self.deliver(cached, format).await;
        }

        // Miss: serialize renders per key. Whoever holds the key lock first
        // renders; everyone else re-checks the index once they get it.
        let key_lock = self.acquire_key(&key).await;
        let guard = key_lock.lock().await;

        // No early return between here and release_key, or the registry
        // entry would outlive its last holder
        let outcome = match self.index.lookup(&key).await {
            Ok(Some(cached)) => {
                debug!("render for {} completed while waiting", key);
                Ok(cached)
            }
            Ok(None) => self.render_and_store(&key, image_bytes, low_quality).await,
            Err(e) => Err(e),
        };

        drop(guard);
        self.release_key(&key, &key_lock).await;

        self.deliver(outcome?, format).await
    }

    /// One cached artifact picked at random, if any exist.
    pub async fn random_cached(&self) -> Result<Option<PathBuf>> {
        self.index.random().await
    }

    async fn render_and_store(
        &self,
        key: &str,
        image_bytes: &[u8],
        low_quality: bool,
    ) -> Result<PathBuf> {
        info!("cache miss, rendering: {}", key);

        // Source bytes and the render output both live in scoped temp files;
        // the canonical copy only lands in the cache root after the render
        // fully succeeds.
        let source = TempFile::new("png");
        tokio::fs::write(source.path(), image_bytes).await?;

        let rendered = TempFile::new(CANONICAL_FORMAT.extension());
        self.backend
            .render_canonical(source.path(), &self.overlay_clip, low_quality, rendered.path())
            .await?;

        self.index
            .insert(
                key,
                &fingerprint::image_hash(image_bytes),
                low_quality,
                rendered.path(),
            )
            .await
    }

    async fn deliver(&self, cached: PathBuf, format: OutputFormat) -> Result<Artifact> {
        if format == CANONICAL_FORMAT {
            return Ok(Artifact::Cached(cached));
        }

        let derived = TempFile::new(format.extension());
        self.backend
            .derive_format(&cached, format, derived.path())
            .await?;
        Ok(Artifact::Ephemeral(derived))
    }

    async fn acquire_key(&self, key: &str) -> Arc<Mutex<()>> {
        let mut registry = self.in_flight.lock().await;
        registry
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the registration once the last holder is done, so a failed
    /// render can be retried by a later request.
    async fn release_key(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut registry = self.in_flight.lock().await;
        // registry holds one reference, we hold another; anything beyond
        // that is a waiter still in flight
        if Arc::strong_count(lock) <= 2 {
            registry.remove(key);
        }
    }
}

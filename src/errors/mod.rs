//! Error types for the render cache and pipeline
//!
//! All pipeline and storage failures propagate to the orchestration boundary
//! as the final outcome of a request; none are retried internally. A missing
//! backing file is not an error anywhere in this hierarchy — it is the
//! stale-entry condition handled by self-healing deletion inside the index.

pub mod types;

pub use types::RenderError;

pub type Result<T> = std::result::Result<T, RenderError>;

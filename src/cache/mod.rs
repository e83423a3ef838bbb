//! Content-addressed render cache
//!
//! The cache is keyed by image content: identical bytes at the same quality
//! tier always resolve to the same entry, across restarts. One subdirectory
//! per key under the cache root holds the single canonical artifact; the
//! SQLite index maps keys to those artifacts and tracks usage.

pub mod fingerprint;
pub mod index;

pub use fingerprint::{fingerprint, image_hash};
pub use index::CacheIndex;

use sha2::{Digest, Sha256};

/// Suffix appended to keys for the low-quality tier, so the two tiers never
/// collide on identical image bytes.
const LOW_QUALITY_SUFFIX: &str = "_lq";

/// Hex digest of the raw image bytes, stored alongside the key for
/// auditability.
pub fn image_hash(image_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_bytes);
    format!("{:x}", hasher.finalize())
}

/// Derive the cache key for an image at a quality tier.
///
/// Pure function of its inputs: no I/O, deterministic across calls and
/// process restarts.
pub fn fingerprint(image_bytes: &[u8], low_quality: bool) -> String {
    let hash = image_hash(image_bytes);
    if low_quality {
        format!("{hash}{LOW_QUALITY_SUFFIX}")
    } else {
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_key() {
        let a = fingerprint(b"image data", false);
        let b = fingerprint(b"image data", false);
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_different_key() {
        assert_ne!(fingerprint(b"image a", false), fingerprint(b"image b", false));
    }

    #[test]
    fn quality_tiers_are_distinct_key_spaces() {
        let normal = fingerprint(b"image data", false);
        let low = fingerprint(b"image data", true);
        assert_ne!(normal, low);
        assert_eq!(low, format!("{normal}_lq"));
    }

    #[test]
    fn key_embeds_image_hash() {
        let bytes = b"some png bytes";
        assert!(fingerprint(bytes, true).starts_with(&image_hash(bytes)));
    }

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        let hash = image_hash(b"");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // SHA-256 of the empty input
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

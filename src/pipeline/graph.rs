//! FFmpeg argument construction
//!
//! Pure builders that turn probe results and quality flags into argument
//! vectors; no process handling lives here. Every tuning value is a named
//! constant so the encode behavior is stated policy rather than something
//! scattered through call sites.

use crate::models::{ImageDimensions, OutputFormat};
use std::path::Path;

/// The format actually persisted in the cache.
///
/// The animated GIF is canonical, not the intermediate video: it is the
/// cheaper, more universally shareable result, and MP4 delivery is always
/// re-derived from it on demand. Derived MP4s get no cache tier of their
/// own; re-derivation is cheap next to compositing and keeps invalidation
/// single-tier.
pub const CANONICAL_FORMAT: OutputFormat = OutputFormat::Gif;

/// Fixed output height; width follows the source aspect ratio.
pub const OUTPUT_HEIGHT: u32 = 360;

/// Chroma key for the overlay clip's background.
const KEY_COLOR: &str = "black";
const KEY_SIMILARITY: &str = "0.01";
const KEY_BLEND: &str = "0.5";

/// Constant-quality tiers. libx264 takes higher CRF as lower quality.
const CRF_NORMAL: u32 = 35;
const CRF_LOW_QUALITY: u32 = 43;

/// GIF transcode tuning.
const GIF_FPS: u32 = 15;
const GIF_MAX_COLORS: u32 = 64;
const GIF_BAYER_SCALE: u32 = 3;

/// Output width for a probed source, scaled to [`OUTPUT_HEIGHT`] and
/// rounded up to an even pixel count (libx264 rejects odd dimensions).
pub fn scaled_output_width(dims: ImageDimensions) -> u32 {
    let scaled = dims.width as f64 / dims.height as f64 * OUTPUT_HEIGHT as f64;
    (scaled / 2.0).ceil() as u32 * 2
}

fn crf(low_quality: bool) -> u32 {
    if low_quality { CRF_LOW_QUALITY } else { CRF_NORMAL }
}

/// Arguments for the composite stage: scale the background, chroma-key the
/// overlay, cover-fit it over the frame, center it, encode muted H.264.
pub fn composite_args(
    background: &Path,
    overlay: &Path,
    dims: ImageDimensions,
    low_quality: bool,
    output: &Path,
) -> Vec<String> {
    let out_w = scaled_output_width(dims);
    let filter = format!(
        "[0:v]scale=w={out_w}:h={h}:flags=lanczos[bg];\
         [1:v]colorkey=color={key}:similarity={sim}:blend={blend}[ck];\
         [ck]scale=w={out_w}:h={h}:force_original_aspect_ratio=increase:flags=lanczos[fg];\
         [bg][fg]overlay=x=(W-w)/2:y=(H-h)/2",
        h = OUTPUT_HEIGHT,
        key = KEY_COLOR,
        sim = KEY_SIMILARITY,
        blend = KEY_BLEND,
    );

    vec![
        "-y".to_string(),
        "-i".to_string(),
        background.to_string_lossy().into_owned(),
        "-i".to_string(),
        overlay.to_string_lossy().into_owned(),
        "-filter_complex".to_string(),
        filter,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-crf".to_string(),
        crf(low_quality).to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-an".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Arguments for the GIF transcode stage: frame-rate downsample, two-branch
/// split, capped palette generation, dithered palette mapping, infinite loop.
pub fn gif_transcode_args(input: &Path, output: &Path) -> Vec<String> {
    let filter = format!(
        "[0:v]fps=fps={fps}[f];\
         [f]split[s0][s1];\
         [s0]palettegen=max_colors={colors}[p];\
         [s1][p]paletteuse=dither=bayer:bayer_scale={bayer}",
        fps = GIF_FPS,
        colors = GIF_MAX_COLORS,
        bayer = GIF_BAYER_SCALE,
    );

    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-filter_complex".to_string(),
        filter,
        "-loop".to_string(),
        "0".to_string(),
        "-an".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Arguments for deriving an MP4 from the cached canonical GIF: constant
/// quality, fast-start flagged, muted.
pub fn mp4_derive_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-crf".to_string(),
        CRF_NORMAL.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-an".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dims(width: u32, height: u32) -> ImageDimensions {
        ImageDimensions { width, height }
    }

    #[test]
    fn output_width_is_always_even() {
        for (w, h) in [(1024, 1024), (1023, 767), (333, 999), (1, 1), (640, 481)] {
            let out = scaled_output_width(dims(w, h));
            assert_eq!(out % 2, 0, "odd width for {w}x{h}");
        }
    }

    #[test]
    fn square_source_maps_to_square_frame() {
        assert_eq!(scaled_output_width(dims(1024, 1024)), OUTPUT_HEIGHT);
    }

    #[test]
    fn wide_source_rounds_up() {
        // 1920/1080 * 360 = 640 exactly
        assert_eq!(scaled_output_width(dims(1920, 1080)), 640);
        // 100/99 * 360 = 363.63..., rounded up to the next even count
        assert_eq!(scaled_output_width(dims(100, 99)), 364);
    }

    #[test]
    fn quality_tiers_differ_only_in_crf() {
        let bg = PathBuf::from("bg.png");
        let fg = PathBuf::from("fg.mp4");
        let out = PathBuf::from("out.mp4");
        let normal = composite_args(&bg, &fg, dims(800, 600), false, &out);
        let low = composite_args(&bg, &fg, dims(800, 600), true, &out);

        assert_ne!(normal, low);
        let diff: Vec<_> = normal
            .iter()
            .zip(&low)
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0], (&"35".to_string(), &"43".to_string()));
    }

    #[test]
    fn composite_filter_keys_the_overlay_and_centers_it() {
        let args = composite_args(
            &PathBuf::from("bg.png"),
            &PathBuf::from("fg.mp4"),
            dims(1024, 1024),
            false,
            &PathBuf::from("out.mp4"),
        );
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("colorkey=color=black:similarity=0.01:blend=0.5"));
        assert!(filter.contains("force_original_aspect_ratio=increase"));
        assert!(filter.contains("overlay=x=(W-w)/2:y=(H-h)/2"));
        assert!(filter.contains("scale=w=360:h=360"));
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn gif_transcode_uses_palette_pipeline_and_loops() {
        let args = gif_transcode_args(&PathBuf::from("in.mp4"), &PathBuf::from("out.gif"));
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("fps=fps=15"));
        assert!(filter.contains("palettegen=max_colors=64"));
        assert!(filter.contains("paletteuse=dither=bayer:bayer_scale=3"));
        let loop_pos = args.iter().position(|a| a == "-loop").unwrap();
        assert_eq!(args[loop_pos + 1], "0");
    }

    #[test]
    fn mp4_derivation_is_faststart_and_muted() {
        let args = mp4_derive_args(&PathBuf::from("in.gif"), &PathBuf::from("out.mp4"));
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn canonical_format_is_the_animated_image() {
        assert_eq!(CANONICAL_FORMAT, OutputFormat::Gif);
    }
}

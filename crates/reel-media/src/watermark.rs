//! Watermark overlay for composited reels.
//!
//! The watermark is a translucent PNG scaled to a fixed width and anchored to
//! the top-left corner of the frame. A missing asset is not an error: the
//! compositor simply renders without it.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Default watermark asset, relative to the working directory.
pub const DEFAULT_WATERMARK_PATH: &str = "assets/watermark.png";

/// Fallback locations checked when the default is absent.
const DEV_WATERMARK_PATHS: &[&str] = &["./assets/watermark.png", "../assets/watermark.png"];

/// Configuration for the watermark overlay.
///
/// ```ignore
/// let config = WatermarkConfig::default()
///     .with_offset(10, 10)
///     .with_opacity(0.3);
/// ```
#[derive(Debug, Clone)]
pub struct WatermarkConfig {
    /// PNG with transparency
    pub image_path: PathBuf,
    /// Width the asset is scaled to; height keeps aspect
    pub scale_width: u32,
    /// Offset from the left edge (pixels)
    pub offset_x: u32,
    /// Offset from the top edge (pixels)
    pub offset_y: u32,
    /// Opacity (0.0 to 1.0)
    pub opacity: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            image_path: resolve_watermark_path(),
            scale_width: 325,
            offset_x: 5,
            offset_y: 5,
            opacity: 0.15,
        }
    }
}

impl WatermarkConfig {
    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = path.into();
        self
    }

    /// Set offset from the top-left corner.
    pub fn with_offset(mut self, x: u32, y: u32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Set watermark opacity (0.0 = invisible, 1.0 = fully opaque).
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_scale_width(mut self, width: u32) -> Self {
        self.scale_width = width.max(1);
        self
    }

    /// Check if the watermark image exists.
    pub fn is_available(&self) -> bool {
        self.image_path.is_file()
    }

    /// Filter chain overlaying input `wm_input` onto `[base]`, producing `[out]`.
    pub fn overlay_chain(&self, wm_input: usize, base: &str, out: &str) -> String {
        format!(
            "[{wm_input}:v]scale={}:-1,format=rgba,colorchannelmixer=aa={:.2}[wm];[{base}][wm]overlay={}:{}:format=auto[{out}]",
            self.scale_width, self.opacity, self.offset_x, self.offset_y
        )
    }
}

fn resolve_watermark_path() -> PathBuf {
    if Path::new(DEFAULT_WATERMARK_PATH).is_file() {
        return PathBuf::from(DEFAULT_WATERMARK_PATH);
    }

    for path in DEV_WATERMARK_PATHS {
        if Path::new(path).is_file() {
            debug!(path = path, "Found watermark at fallback path");
            return PathBuf::from(path);
        }
    }

    PathBuf::from(DEFAULT_WATERMARK_PATH)
}

//! Logo and caption overlay filter construction.
//!
//! The logo is scaled relative to the source height and pinned to the
//! top-right corner; the caption is drawn centered with an outline. Both stay
//! on screen for the whole duration of the source.

use std::path::{Path, PathBuf};

// =============================================================================
// Constants
// =============================================================================

/// Logo height as a fraction of the video height.
pub const DEFAULT_LOGO_HEIGHT_RATIO: f64 = 0.10;
/// Gap between the logo and the top/right edges, in pixels.
pub const DEFAULT_MARGIN: u32 = 10;
/// Caption font size.
pub const DEFAULT_FONT_SIZE: u32 = 40;
/// Fontconfig pattern used when no font file is configured.
pub const DEFAULT_FONT: &str = "Arial:style=Bold";

/// Label of the composited video stream.
pub const OUTPUT_LABEL: &str = "vout";

// =============================================================================
// Configuration (Builder Pattern)
// =============================================================================

/// Styling of the logo and caption overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Logo height relative to the video height
    pub logo_height_ratio: f64,
    /// Distance of the logo from the top and right edges (pixels)
    pub margin: u32,
    /// Caption font size
    pub font_size: u32,
    /// Fontconfig font pattern (ignored when `font_file` is set)
    pub font: String,
    /// Explicit font file path
    pub font_file: Option<PathBuf>,
    /// Caption fill color
    pub font_color: String,
    /// Caption outline color
    pub stroke_color: String,
    /// Caption outline width
    pub stroke_width: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            logo_height_ratio: DEFAULT_LOGO_HEIGHT_RATIO,
            margin: DEFAULT_MARGIN,
            font_size: DEFAULT_FONT_SIZE,
            font: DEFAULT_FONT.to_string(),
            font_file: None,
            font_color: "white".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 2,
        }
    }
}

impl OverlayStyle {
    /// Use a specific font file instead of a fontconfig pattern.
    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }

    /// Set the logo height ratio (clamped to (0, 1]).
    pub fn with_logo_height_ratio(mut self, ratio: f64) -> Self {
        self.logo_height_ratio = ratio.clamp(0.01, 1.0);
        self
    }

    /// Set the logo margin.
    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }
}

// =============================================================================
// Filter construction
// =============================================================================

/// Logo height in pixels for a video of `video_height`.
pub fn logo_height_for(video_height: u32, ratio: f64) -> u32 {
    ((video_height as f64 * ratio).round() as u32).max(1)
}

/// Escape a value for use inside a quoted filter option.
fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Build the `filter_complex` graph.
///
/// Expects input 0 to be the source video and input 1 the logo image (looped).
/// The caption is read from `caption_file` so arbitrary user text needs no
/// drawtext escaping. The result is labelled `[vout]`.
pub fn build_overlay_filter(style: &OverlayStyle, video_height: u32, caption_file: &Path) -> String {
    let logo_height = logo_height_for(video_height, style.logo_height_ratio);

    let font = match &style.font_file {
        Some(path) => format!("fontfile='{}'", escape_filter_value(&path.to_string_lossy())),
        None => format!("font='{}'", escape_filter_value(&style.font)),
    };

    format!(
        "[1:v]scale=-1:{lh},format=rgba[logo];\
         [0:v][logo]overlay=W-w-{m}:{m}:format=auto:shortest=1[bg];\
         [bg]drawtext={font}:textfile='{text}':expansion=none:fontsize={fs}:fontcolor={fc}:\
         borderw={sw}:bordercolor={sc}:x=(w-text_w)/2:y=(h-text_h)/2,format=yuv420p[{out}]",
        lh = logo_height,
        m = style.margin,
        font = font,
        text = escape_filter_value(&caption_file.to_string_lossy()),
        fs = style.font_size,
        fc = style.font_color,
        sw = style.stroke_width,
        sc = style.stroke_color,
        out = OUTPUT_LABEL,
    )
}

// =============================================================================
// Tests
// =============================================================================

//! Text rasterization for watermark stamps
//!
//! Renders the watermark text once per render pass into a transparent RGBA
//! canvas at a supersampled resolution, then reports the canvas size in page
//! units so the compositor can scale it back down when embedding. The canvas
//! is padded generously on all sides so that rotating the image at draw time
//! can never clip glyphs against the buffer edge.

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::watermark::Color;

/// Supersampling factor: text is rendered at this multiple of the requested
/// point size and scaled back down at embed time, keeping the stamp crisp on
/// zoomed-in page views.
pub const RASTER_SCALE: u32 = 3;

/// Line-height multiplier used for the canvas text row. Exact vertical font
/// metrics differ per platform font, so the row is sized generously enough
/// to cover ascenders and descenders of any of the candidate families.
const LINE_HEIGHT: f32 = 1.5;

/// Rasterized watermark text plus its size in page units
///
/// `logical_width`/`logical_height` are in points, already divided by the
/// supersampling factor. The pixel buffer is owned by the current render
/// pass and discarded after embedding.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub pixels: RgbaImage,
    pub logical_width: f64,
    pub logical_height: f64,
}

/// Process-wide font, loaded on first use
static STAMP_FONT: OnceLock<Option<FontVec>> = OnceLock::new();

/// Candidate font files checked in order when `PDF_STAMP_FONT` is not set
const FONT_CANDIDATES: &[&str] = &[
    // Linux
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    // macOS
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    // Windows
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn load_font() -> Option<FontVec> {
    let mut candidates: Vec<String> = Vec::new();
    if let Ok(path) = std::env::var("PDF_STAMP_FONT") {
        candidates.push(path);
    }
    candidates.extend(FONT_CANDIDATES.iter().map(|p| p.to_string()));

    for path in candidates {
        if let Ok(bytes) = std::fs::read(&path) {
            if let Ok(font) = FontVec::try_from_vec(bytes) {
                return Some(font);
            }
        }
    }

    None
}

/// Get the watermark font, loading it on first call
fn stamp_font() -> Result<&'static FontVec> {
    STAMP_FONT.get_or_init(load_font).as_ref().ok_or_else(|| {
        Error::Font(
            "no usable sans-serif font found; set PDF_STAMP_FONT to a .ttf/.otf file".to_string(),
        )
    })
}

/// Whether a usable font is available without treating absence as an error.
/// Lets callers (and tests) degrade gracefully on fontless systems.
pub fn font_available() -> bool {
    STAMP_FONT.get_or_init(load_font).is_some()
}

/// Canvas geometry for a measured piece of text, all in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

/// Compute the padded canvas for a text row
///
/// Padding is half the larger of the text extents on every side. That keeps
/// the glyphs inside the buffer under any rotation the compositor applies:
/// the farthest a corner of the text row can swing from its center is half
/// its diagonal, and `0.5 * max(w, h)` bounds that for the row shapes text
/// produces.
pub(crate) fn canvas_layout(text_width_px: u32, font_px: f32) -> CanvasLayout {
    let text_height = (font_px * LINE_HEIGHT).ceil() as u32;
    let padding = ((text_width_px.max(text_height) as f32) * 0.5).ceil() as u32;

    CanvasLayout {
        width: (text_width_px + 2 * padding).max(1),
        height: (text_height + 2 * padding).max(1),
        padding,
    }
}

/// Measure the advance width of `text` at the given pixel size
fn measure_text_px(font: &FontVec, text: &str, font_px: f32) -> f32 {
    let scaled = font.as_scaled(PxScale::from(font_px));

    let mut width = 0.0f32;
    let mut prev: Option<ab_glyph::GlyphId> = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }

    width
}

/// Rasterize watermark text into a padded transparent canvas
///
/// The text is drawn centered on both axes with the requested fill color and
/// fully opaque alpha; opacity is the compositor's job. Empty or
/// whitespace-only text is not an error and produces a minimal blank image.
pub fn rasterize(text: &str, font_size_pt: f64, color: Color) -> Result<RasterImage> {
    if text.trim().is_empty() {
        return Ok(blank_raster());
    }

    let font = stamp_font()?;
    let font_px = (font_size_pt * RASTER_SCALE as f64) as f32;
    let scale = PxScale::from(font_px);
    let scaled = font.as_scaled(scale);

    let text_width = measure_text_px(font, text, font_px);
    let layout = canvas_layout(text_width.ceil() as u32, font_px);

    let mut pixels = RgbaImage::new(layout.width, layout.height);

    // Baseline placed so the glyph block (ascent above, descent below) is
    // vertically centered in the canvas. descent() is negative.
    let baseline_y = layout.height as f32 / 2.0 + (scaled.ascent() + scaled.descent()) / 2.0;
    let mut cursor_x = (layout.width as f32 - text_width) / 2.0;
    let mut prev: Option<ab_glyph::GlyphId> = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            cursor_x += scaled.kern(prev, id);
        }

        let glyph = id.with_scale_and_position(scale, point(cursor_x, baseline_y));

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();

            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;

                if x >= 0 && y >= 0 && x < layout.width as i32 && y < layout.height as i32 {
                    let alpha = (coverage * 255.0) as u8;
                    let existing = pixels.get_pixel(x as u32, y as u32);

                    // Adjacent glyphs can overlap under kerning; keep the
                    // heavier coverage
                    if alpha > existing[3] {
                        pixels.put_pixel(
                            x as u32,
                            y as u32,
                            Rgba([color.r, color.g, color.b, alpha]),
                        );
                    }
                }
            });
        }

        cursor_x += scaled.h_advance(id);
        prev = Some(id);
    }

    Ok(RasterImage {
        logical_width: layout.width as f64 / RASTER_SCALE as f64,
        logical_height: layout.height as f64 / RASTER_SCALE as f64,
        pixels,
    })
}

/// Degenerate stamp for empty text: a single transparent pixel
fn blank_raster() -> RasterImage {
    RasterImage {
        pixels: RgbaImage::new(1, 1),
        logical_width: 1.0 / RASTER_SCALE as f64,
        logical_height: 1.0 / RASTER_SCALE as f64,
    }
}

//! Watermark anchor placement
//!
//! The PDF drawing primitive rotates an image about its own bottom-left
//! corner and then puts that corner at a given anchor point. Users think in
//! different terms: the *center* of the watermark should land at a chosen
//! offset from the page center, whatever the rotation. This module converts
//! between the two frames.
//!
//! Placing the corner at `target - R(angle) * (w/2, h/2)` puts the rotated
//! image's center exactly at `target` for any angle, so no per-quadrant
//! special cases exist here.

/// Page dimensions in points, origin at the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// US Letter size (612pt x 792pt)
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }
}

/// Bottom-left anchor to hand to the rotate-and-draw primitive, pre-rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub draw_x: f64,
    pub draw_y: f64,
}

/// Compute the draw anchor so the image center lands at the requested point
///
/// `image_width`/`image_height` are the image's logical size in points.
/// `rotation_deg` is counter-clockwise positive; the offsets shift the
/// target away from the page center.
pub fn solve(
    page: PageGeometry,
    image_width: f64,
    image_height: f64,
    rotation_deg: f64,
    offset_x: f64,
    offset_y: f64,
) -> Placement {
    let target_x = page.width / 2.0 + offset_x;
    let target_y = page.height / 2.0 + offset_y;

    let rad = rotation_deg.to_radians();
    let (sin, cos) = rad.sin_cos();

    // Vector from the image's bottom-left corner to its center, rotated into
    // page space
    let half_w = image_width / 2.0;
    let half_h = image_height / 2.0;
    let rotated_x = half_w * cos - half_h * sin;
    let rotated_y = half_w * sin + half_h * cos;

    Placement {
        draw_x: target_x - rotated_x,
        draw_y: target_y - rotated_y,
    }
}

//! Coordinate space conversions
//!
//! Three spaces are in play:
//! - screen: pixels, origin top-left, y down
//! - NDC: -1..1, origin center, y up
//! - UV: 0..1, origin top-left
//!
//! The editor (hit-testing, dragging) and the renderers (rasterization) must
//! both go through these functions so that a dragged control point and the
//! rendered mesh vertex land on the same pixel.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Size of a screen-space surface in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Viewport for an integer pixel target
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }

    pub fn screen_to_ndc(&self, screen: Vec2) -> Vec2 {
        screen_to_ndc(screen, self.width, self.height)
    }

    pub fn ndc_to_screen(&self, ndc: Vec2) -> Vec2 {
        ndc_to_screen(ndc, self.width, self.height)
    }

    /// NDC position of the center of pixel `(x, y)`
    pub fn pixel_center_ndc(&self, x: u32, y: u32) -> Vec2 {
        self.screen_to_ndc(Vec2::new(x as f32 + 0.5, y as f32 + 0.5))
    }
}

/// `ndc.x = x/w*2 - 1`, `ndc.y = 1 - y/h*2`
#[inline]
pub fn screen_to_ndc(screen: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new(screen.x / width * 2.0 - 1.0, 1.0 - screen.y / height * 2.0)
}

/// Inverse of [`screen_to_ndc`]
#[inline]
pub fn ndc_to_screen(ndc: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height)
}

/// `uv = ((x + 1) / 2, (1 - y) / 2)`
#[inline]
pub fn ndc_to_uv(ndc: Vec2) -> Vec2 {
    Vec2::new((ndc.x + 1.0) * 0.5, (1.0 - ndc.y) * 0.5)
}

/// Inverse of [`ndc_to_uv`]
#[inline]
pub fn uv_to_ndc(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

/// Map a normalized editor canvas position (0..1, origin top-left) to NDC.
///
/// The canvas is the output frame scaled to the editor widget and shares the
/// UV convention.
#[inline]
pub fn normalized_to_ndc(pos: Vec2) -> Vec2 {
    uv_to_ndc(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_corners_map_to_ndc_corners() {
        let vp = Viewport::new(1920.0, 1080.0);
        assert_eq!(vp.screen_to_ndc(Vec2::new(0.0, 0.0)), Vec2::new(-1.0, 1.0));
        assert_eq!(vp.screen_to_ndc(Vec2::new(1920.0, 1080.0)), Vec2::new(1.0, -1.0));
        assert_eq!(vp.screen_to_ndc(Vec2::new(960.0, 540.0)), Vec2::ZERO);
    }

    #[test]
    fn test_screen_ndc_round_trip() {
        let vp = Viewport::new(800.0, 600.0);
        let p = Vec2::new(123.5, 456.25);
        let back = vp.ndc_to_screen(vp.screen_to_ndc(p));
        assert!((back - p).length() < 1e-3);
    }

    #[test]
    fn test_uv_is_top_left_origin() {
        assert_eq!(ndc_to_uv(Vec2::new(-1.0, 1.0)), Vec2::new(0.0, 0.0));
        assert_eq!(ndc_to_uv(Vec2::new(1.0, -1.0)), Vec2::new(1.0, 1.0));
        assert_eq!(uv_to_ndc(Vec2::new(0.5, 0.5)), Vec2::ZERO);
    }

    #[test]
    fn test_normalized_canvas_matches_editor_mapping() {
        // Top-left handle at (0.1, 0.1) lands at (-0.8, 0.8)
        let ndc = normalized_to_ndc(Vec2::new(0.1, 0.1));
        assert!((ndc - Vec2::new(-0.8, 0.8)).length() < 1e-6);
    }

    #[test]
    fn test_pixel_center() {
        let vp = Viewport::from_pixels(2, 2);
        assert_eq!(vp.pixel_center_ndc(0, 0), Vec2::new(-0.5, 0.5));
        assert_eq!(vp.pixel_center_ndc(1, 1), Vec2::new(0.5, -0.5));
    }
}

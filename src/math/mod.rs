//! Math module: projective transforms and coordinate conversions

pub mod coords;
mod homography;

pub use coords::{ndc_to_screen, ndc_to_uv, normalized_to_ndc, screen_to_ndc, uv_to_ndc, Viewport};
pub use homography::{Homography, PIVOT_EPSILON};

//! Editor view state persisted with a project

use serde::{Deserialize, Serialize};

pub const ZOOM_STEP: f64 = 1.2;
pub const MIN_ZOOM: f64 = 0.2;
pub const MAX_ZOOM: f64 = 5.0;

/// Editor zoom and pan. Never part of the output coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    pub zoom_level: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            zoom_level: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl ViewSettings {
    pub fn zoom_in(&mut self) {
        self.zoom_level = (self.zoom_level * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_level = (self.zoom_level / ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn fit_to_window(&mut self) {
        *self = Self::default();
    }

    /// Same as [`ViewSettings::fit_to_window`]
    pub fn reset(&mut self) {
        self.fit_to_window();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_clamps() {
        let mut view = ViewSettings::default();
        for _ in 0..20 {
            view.zoom_in();
        }
        assert_eq!(view.zoom_level, MAX_ZOOM);

        for _ in 0..40 {
            view.zoom_out();
        }
        assert_eq!(view.zoom_level, MIN_ZOOM);
    }

    #[test]
    fn test_single_step() {
        let mut view = ViewSettings::default();
        view.zoom_in();
        assert!((view.zoom_level - 1.2).abs() < 1e-12);
        view.zoom_out();
        assert!((view.zoom_level - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_to_window_resets_pan() {
        let mut view = ViewSettings::default();
        view.zoom_in();
        view.pan_by(10.0, -4.0);
        view.fit_to_window();
        assert_eq!(view, ViewSettings::default());
    }
}

//! Control grids for warpable surfaces and mask polygons
//!
//! A surface grid is `rows x cols` control points in row-major order; a mask
//! is an ordered polygon stored with `rows == cols == 0`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};

/// Grid of control points in NDC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlGrid {
    pub rows: usize,
    pub cols: usize,
    /// Row-major control points (polygon order for masks)
    pub points: Vec<Vec2>,
}

impl ControlGrid {
    /// Default 2x2 quad surface
    pub fn create_quad() -> Self {
        Self {
            rows: 2,
            cols: 2,
            points: vec![
                Vec2::new(-0.5, 0.5),  // top-left
                Vec2::new(0.5, 0.5),   // top-right
                Vec2::new(-0.5, -0.5), // bottom-left
                Vec2::new(0.5, -0.5),  // bottom-right
            ],
        }
    }

    /// Default triangle mask
    pub fn create_mask() -> Self {
        Self::polygon(vec![
            Vec2::new(0.0, 0.5),
            Vec2::new(0.5, -0.5),
            Vec2::new(-0.5, -0.5),
        ])
    }

    /// Quad surface from explicit corners `[top-left, top-right, bottom-left, bottom-right]`
    pub fn quad(corners: [Vec2; 4]) -> Self {
        Self {
            rows: 2,
            cols: 2,
            points: corners.to_vec(),
        }
    }

    /// Mask polygon from ordered points
    pub fn polygon(points: Vec<Vec2>) -> Self {
        Self {
            rows: 0,
            cols: 0,
            points,
        }
    }

    /// Check the surface invariant: `rows, cols >= 2` and `points.len() == rows * cols`
    pub fn validate_surface(&self) -> MappingResult<()> {
        if self.rows < 2 || self.cols < 2 {
            return Err(MappingError::MalformedGrid(format!(
                "surface grid needs at least 2x2 points, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.points.len() != self.rows * self.cols {
            return Err(MappingError::MalformedGrid(format!(
                "{}x{} grid holds {} points",
                self.rows,
                self.cols,
                self.points.len()
            )));
        }
        Ok(())
    }

    /// Check the mask invariant: no grid dimensions and at least 3 points
    pub fn validate_mask(&self) -> MappingResult<()> {
        if self.rows != 0 || self.cols != 0 {
            return Err(MappingError::MalformedGrid(format!(
                "mask polygon must not carry grid dimensions ({}x{})",
                self.rows, self.cols
            )));
        }
        if self.points.len() < 3 {
            return Err(MappingError::MalformedGrid(format!(
                "mask polygon needs at least 3 points, got {}",
                self.points.len()
            )));
        }
        Ok(())
    }

    /// Number of control points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether this grid is a plain 4-point quad
    pub fn is_quad(&self) -> bool {
        self.points.len() == 4 && self.rows == 2 && self.cols == 2
    }

    /// Control point at grid position, if inside the grid
    pub fn point(&self, row: usize, col: usize) -> Option<Vec2> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.points.get(row * self.cols + col).copied()
    }

    /// Outer corners `[top-left, top-right, bottom-left, bottom-right]` of a surface grid
    pub fn corners(&self) -> Option<[Vec2; 4]> {
        if self.rows < 2 || self.cols < 2 {
            return None;
        }
        let last_row = self.rows - 1;
        let last_col = self.cols - 1;
        Some([
            self.point(0, 0)?,
            self.point(0, last_col)?,
            self.point(last_row, 0)?,
            self.point(last_row, last_col)?,
        ])
    }

    /// Move a control point to a new position
    pub fn set_point(&mut self, index: usize, position: Vec2) -> MappingResult<()> {
        let len = self.points.len();
        let point = self
            .points
            .get_mut(index)
            .ok_or(MappingError::IndexOutOfRange { index, len })?;
        *point = finite(position)?;
        Ok(())
    }

    /// Offset a control point by a delta
    pub fn move_point(&mut self, index: usize, delta: Vec2) -> MappingResult<()> {
        let len = self.points.len();
        let point = self
            .points
            .get_mut(index)
            .ok_or(MappingError::IndexOutOfRange { index, len })?;
        *point = finite(*point + delta)?;
        Ok(())
    }

    /// Re-densify a 4-point quad into a `rows x cols` grid by bilinear blending
    /// of its corners.
    ///
    /// Grids that are already denser than a quad are rejected and left untouched.
    pub fn resample(&mut self, rows: usize, cols: usize) -> MappingResult<()> {
        if self.points.len() != 4 {
            return Err(MappingError::MalformedGrid(format!(
                "only a 4-point quad can be resampled, grid has {} points",
                self.points.len()
            )));
        }
        if rows < 2 || cols < 2 {
            return Err(MappingError::MalformedGrid(format!(
                "resample target {rows}x{cols} is smaller than 2x2"
            )));
        }

        let [tl, tr, bl, br] = [self.points[0], self.points[1], self.points[2], self.points[3]];

        let mut points = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            let v = r as f32 / (rows - 1) as f32;
            for c in 0..cols {
                let u = c as f32 / (cols - 1) as f32;
                let top = tl.lerp(tr, u);
                let bottom = bl.lerp(br, u);
                points.push(top.lerp(bottom, v));
            }
        }

        self.rows = rows;
        self.cols = cols;
        self.points = points;
        Ok(())
    }

    /// Index of the control point closest to `position` within `radius`
    pub fn nearest_point(&self, position: Vec2, radius: f32) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.distance(position)))
            .filter(|(_, dist)| *dist <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

/// Reject control points that could not be stored or rendered
fn finite(point: Vec2) -> MappingResult<Vec2> {
    if point.is_finite() {
        return Ok(point);
    }
    let value = if point.x.is_finite() { point.y } else { point.x };
    Err(MappingError::InvalidProperty {
        property: "control_point",
        value,
    })
}

//! Mesh geometry generation
//!
//! Turns control grids into renderable vertices. Surfaces become one triangle
//! strip per adjacent row pair; masks become a triangle fan around their first
//! point.

use glam::Vec2;

use super::ControlGrid;
use crate::math::coords;

/// Vertex format shared by every render backend
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: Vec2, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::from_array(self.position)
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::from_array(self.uv)
    }
}

/// Tessellated surface: `strip_count` strips of `strip_len` vertices each,
/// stored back to back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceGeometry {
    pub vertices: Vec<Vertex>,
    pub strip_len: usize,
}

impl SurfaceGeometry {
    /// Build strips from a surface grid.
    ///
    /// Each strip interleaves the upper and lower row at every column:
    /// `[P(r,0), P(r+1,0), P(r,1), P(r+1,1), ...]`. This interleave fixes the
    /// winding for the editor preview and the output alike. Grids with fewer
    /// than two rows or columns produce no geometry.
    pub fn from_grid(grid: &ControlGrid) -> Self {
        let (rows, cols) = (grid.rows, grid.cols);
        if rows < 2 || cols < 2 || grid.points.len() != rows * cols {
            return Self::default();
        }

        let strip_len = cols * 2;
        let mut vertices = Vec::with_capacity((rows - 1) * strip_len);
        let u_step = (cols - 1) as f32;
        let v_step = (rows - 1) as f32;

        for r in 0..rows - 1 {
            let v_top = r as f32 / v_step;
            let v_bottom = (r + 1) as f32 / v_step;
            for c in 0..cols {
                let u = c as f32 / u_step;
                let top = grid.points[r * cols + c];
                let bottom = grid.points[(r + 1) * cols + c];
                vertices.push(Vertex::new(top, Vec2::new(u, v_top)));
                vertices.push(Vertex::new(bottom, Vec2::new(u, v_bottom)));
            }
        }

        Self { vertices, strip_len }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn strip_count(&self) -> usize {
        if self.strip_len == 0 {
            0
        } else {
            self.vertices.len() / self.strip_len
        }
    }

    /// Iterate strips as vertex slices
    pub fn strips(&self) -> impl Iterator<Item = &[Vertex]> {
        self.vertices.chunks_exact(self.strip_len.max(1))
    }

    /// Triangles of every strip, in strip order
    pub fn triangles(&self) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        self.strips()
            .flat_map(|strip| strip.windows(3).map(|w| [w[0], w[1], w[2]]))
    }
}

/// Mask polygon as a triangle fan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskGeometry {
    /// Polygon points in fan order; UVs follow the canonical NDC to UV mapping
    pub vertices: Vec<Vertex>,
}

impl MaskGeometry {
    /// Build the fan for an ordered, convex polygon.
    ///
    /// Concave input is not rejected; it simply yields overlapping coverage.
    pub fn from_grid(grid: &ControlGrid) -> Self {
        if grid.points.len() < 3 {
            return Self::default();
        }
        let vertices = grid
            .points
            .iter()
            .map(|&p| Vertex::new(p, coords::ndc_to_uv(p)))
            .collect();
        Self { vertices }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Fan triangles `(p0, pi, pi+1)`
    pub fn triangles(&self) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        let n = self.vertices.len();
        (1..n.saturating_sub(1)).map(move |i| {
            [self.vertices[0], self.vertices[i], self.vertices[i + 1]]
        })
    }

    /// Fan expanded to a triangle list (wgpu has no fan topology)
    pub fn triangle_list(&self) -> Vec<Vertex> {
        self.triangles().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_is_one_strip_of_four() {
        let geo = SurfaceGeometry::from_grid(&ControlGrid::create_quad());
        assert_eq!(geo.strip_count(), 1);
        assert_eq!(geo.vertices.len(), 4);

        // Upper/lower interleave with UVs
        let uvs: Vec<[f32; 2]> = geo.vertices.iter().map(|v| v.uv).collect();
        assert_eq!(uvs, vec![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]);
        assert_eq!(geo.vertices[0].position, [-0.5, 0.5]);
        assert_eq!(geo.vertices[1].position, [-0.5, -0.5]);
    }

    #[test]
    fn test_three_by_three_is_two_strips_of_six() {
        let mut grid = ControlGrid::create_quad();
        grid.resample(3, 3).unwrap();
        let geo = SurfaceGeometry::from_grid(&grid);
        assert_eq!(geo.strip_count(), 2);
        assert!(geo.strips().all(|s| s.len() == 6));

        let second = geo.strips().nth(1).unwrap();
        assert_eq!(second[0].uv, [0.0, 0.5]);
        assert_eq!(second[1].uv, [0.0, 1.0]);
        assert_eq!(second[5].uv, [1.0, 1.0]);
    }

    #[test]
    fn test_degenerate_grid_is_empty() {
        let grid = ControlGrid {
            rows: 1,
            cols: 5,
            points: vec![Vec2::ZERO; 5],
        };
        let geo = SurfaceGeometry::from_grid(&grid);
        assert!(geo.is_empty());
        assert_eq!(geo.strip_count(), 0);
        assert_eq!(geo.triangles().count(), 0);
    }

    #[test]
    fn test_strip_triangle_count() {
        let mut grid = ControlGrid::create_quad();
        grid.resample(4, 5).unwrap();
        let geo = SurfaceGeometry::from_grid(&grid);
        // 3 strips of 10 vertices, 8 triangles each
        assert_eq!(geo.triangles().count(), 24);
    }

    #[test]
    fn test_mask_fan() {
        let square = ControlGrid::polygon(vec![
            Vec2::new(-1.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, -1.0),
        ]);
        let geo = MaskGeometry::from_grid(&square);
        assert_eq!(geo.triangles().count(), 2);
        assert_eq!(geo.triangle_list().len(), 6);

        let degenerate = ControlGrid::polygon(vec![Vec2::ZERO, Vec2::ONE]);
        assert!(MaskGeometry::from_grid(&degenerate).is_empty());
    }
}

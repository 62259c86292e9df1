//! Projective transform solving
//!
//! Solves the 3x3 homography that maps four source points onto four
//! destination points. The solver is pure: it never panics and degrades to the
//! identity transform when the correspondence is unusable.

use std::sync::Once;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};

/// Pivot magnitude below which the system is treated as singular
pub const PIVOT_EPSILON: f64 = 1e-6;

/// Twice the triangle area, relative to the squared extent of the point set,
/// at or below which three points count as collinear
const COLLINEAR_EPSILON: f32 = 1e-6;

static SINGULAR_WARNING: Once = Once::new();

/// 3x3 projective transform, row-major, with `m[2][2] == 1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub m: [[f32; 3]; 3],
}

impl Default for Homography {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Homography {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Solve `dst = H * src` for exactly four correspondences.
    ///
    /// Returns the identity matrix when the input is not four points per side
    /// or when the linear system is singular.
    pub fn compute(src: &[Vec2], dst: &[Vec2]) -> Self {
        match Self::try_compute(src, dst) {
            Ok(h) => h,
            Err(MappingError::SingularSystem) => {
                SINGULAR_WARNING.call_once(|| {
                    log::warn!("Singular homography system, falling back to identity");
                });
                Self::IDENTITY
            }
            Err(err) => {
                log::debug!("{err}, falling back to identity");
                Self::IDENTITY
            }
        }
    }

    /// Same as [`Homography::compute`] but reports why a solve failed.
    pub fn try_compute(src: &[Vec2], dst: &[Vec2]) -> MappingResult<Self> {
        if src.len() != 4 || dst.len() != 4 {
            return Err(MappingError::InvalidCorrespondence {
                src: src.len(),
                dst: dst.len(),
            });
        }
        if has_collinear_triple(src) || has_collinear_triple(dst) {
            return Err(MappingError::SingularSystem);
        }

        let mut a = [[0.0f64; 8]; 8];
        let mut b = [0.0f64; 8];

        for i in 0..4 {
            let (x, y) = (src[i].x as f64, src[i].y as f64);
            let (xp, yp) = (dst[i].x as f64, dst[i].y as f64);

            // h0*x + h1*y + h2 - h6*x*x' - h7*y*x' = x'
            a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -x * xp, -y * xp];
            b[2 * i] = xp;

            // h3*x + h4*y + h5 - h6*x*y' - h7*y*y' = y'
            a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -x * yp, -y * yp];
            b[2 * i + 1] = yp;
        }

        let h = solve_linear_system(&mut a, &mut b).ok_or(MappingError::SingularSystem)?;

        Ok(Self {
            m: [
                [h[0] as f32, h[1] as f32, h[2] as f32],
                [h[3] as f32, h[4] as f32, h[5] as f32],
                [h[6] as f32, h[7] as f32, 1.0],
            ],
        })
    }

    /// Homography taking the unit UV square onto a quad given as
    /// `[top-left, top-right, bottom-left, bottom-right]`.
    pub fn unit_square_to(quad: &[Vec2; 4]) -> Self {
        let uv = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
        ];
        Self::compute(&uv, quad)
    }

    /// Apply the transform to a point (with projective divide)
    pub fn apply(&self, point: Vec2) -> Vec2 {
        let h = &self.m;
        let w = h[2][0] * point.x + h[2][1] * point.y + h[2][2];
        if w.abs() < 1e-10 {
            return point;
        }
        let x = (h[0][0] * point.x + h[0][1] * point.y + h[0][2]) / w;
        let y = (h[1][0] * point.x + h[1][1] * point.y + h[1][2]) / w;
        Vec2::new(x, y)
    }

    /// Inverse transform, normalized so the bottom-right element is 1.
    ///
    /// Returns `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        let h = self.m.map(|row| row.map(|v| v as f64));

        let det = h[0][0] * (h[1][1] * h[2][2] - h[1][2] * h[2][1])
            - h[0][1] * (h[1][0] * h[2][2] - h[1][2] * h[2][0])
            + h[0][2] * (h[1][0] * h[2][1] - h[1][1] * h[2][0]);

        if det.abs() < 1e-10 {
            return None;
        }

        let inv_det = 1.0 / det;
        let inv = [
            [
                (h[1][1] * h[2][2] - h[1][2] * h[2][1]) * inv_det,
                (h[0][2] * h[2][1] - h[0][1] * h[2][2]) * inv_det,
                (h[0][1] * h[1][2] - h[0][2] * h[1][1]) * inv_det,
            ],
            [
                (h[1][2] * h[2][0] - h[1][0] * h[2][2]) * inv_det,
                (h[0][0] * h[2][2] - h[0][2] * h[2][0]) * inv_det,
                (h[0][2] * h[1][0] - h[0][0] * h[1][2]) * inv_det,
            ],
            [
                (h[1][0] * h[2][1] - h[1][1] * h[2][0]) * inv_det,
                (h[0][1] * h[2][0] - h[0][0] * h[2][1]) * inv_det,
                (h[0][0] * h[1][1] - h[0][1] * h[1][0]) * inv_det,
            ],
        ];

        let scale = if inv[2][2].abs() > 1e-12 { inv[2][2] } else { 1.0 };
        Some(Self {
            m: inv.map(|row| row.map(|v| (v / scale) as f32)),
        })
    }

    /// Check whether this is approximately the identity transform
    pub fn is_identity(&self, epsilon: f32) -> bool {
        let id = Self::IDENTITY;
        self.m
            .iter()
            .flatten()
            .zip(id.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

fn has_collinear_triple(points: &[Vec2]) -> bool {
    let (min, max) = points
        .iter()
        .fold((Vec2::INFINITY, Vec2::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let extent = (max - min).max_element();
    let tolerance = COLLINEAR_EPSILON * extent * extent;

    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let ab = points[j] - points[i];
                let ac = points[k] - points[i];
                if ab.perp_dot(ac).abs() <= tolerance {
                    return true;
                }
            }
        }
    }
    false
}

/// Gaussian elimination with partial pivoting on an 8x8 system.
///
/// Returns `None` when a pivot falls below [`PIVOT_EPSILON`].
fn solve_linear_system(a: &mut [[f64; 8]; 8], b: &mut [f64; 8]) -> Option<[f64; 8]> {
    let n = 8;

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = a[col][col].abs();
        for row in (col + 1)..n {
            if a[row][col].abs() > max_val {
                max_val = a[row][col].abs();
                max_row = row;
            }
        }

        if max_row != col {
            a.swap(col, max_row);
            b.swap(col, max_row);
        }

        let pivot = a[col][col];
        if pivot.abs() < PIVOT_EPSILON {
            return None;
        }

        for row in (col + 1)..n {
            let factor = a[row][col] / pivot;
            for j in col..n {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; 8];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }

    Some(x)
}

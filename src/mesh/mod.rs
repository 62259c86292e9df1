//! Mesh module: control grids and the geometry generated from them

mod geometry;
mod grid;

pub use geometry::{MaskGeometry, SurfaceGeometry, Vertex};
pub use grid::ControlGrid;

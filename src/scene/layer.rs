//! Layers: warpable surfaces and cut-out masks

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MappingError, MappingResult};
use crate::mesh::ControlGrid;

/// Upper bound for edge softness (half the UV square)
pub const MAX_EDGE_SOFTNESS: f32 = 0.5;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Stable layer identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a layer does in the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Textured, warpable mesh
    Surface,
    /// Stencil cut-out applied to every surface
    Mask,
}

impl LayerKind {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Surface => "Surface",
            LayerKind::Mask => "Mask",
        }
    }
}

/// A surface or mask in the layer stack
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    kind: LayerKind,
    visible: bool,
    opacity: f32,
    edge_softness: f32,
    grid: ControlGrid,
    /// Changes whenever the control points change; keys the geometry cache
    revision: u64,
}

impl Layer {
    /// Default 2x2 quad surface
    pub fn surface(name: impl Into<String>) -> Self {
        Self::with_grid(LayerId::new(), name, LayerKind::Surface, ControlGrid::create_quad())
    }

    /// Default triangle mask
    pub fn mask(name: impl Into<String>) -> Self {
        Self::with_grid(LayerId::new(), name, LayerKind::Mask, ControlGrid::create_mask())
    }

    fn with_grid(id: LayerId, name: impl Into<String>, kind: LayerKind, grid: ControlGrid) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            visible: true,
            opacity: 1.0,
            edge_softness: 0.0,
            grid,
            revision: next_revision(),
        }
    }

    /// Build a layer from stored parts, checking every invariant
    pub fn from_parts(
        id: LayerId,
        name: impl Into<String>,
        kind: LayerKind,
        grid: ControlGrid,
    ) -> MappingResult<Self> {
        match kind {
            LayerKind::Surface => grid.validate_surface()?,
            LayerKind::Mask => grid.validate_mask()?,
        }
        Ok(Self::with_grid(id, name, kind, grid))
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn edge_softness(&self) -> f32 {
        self.edge_softness
    }

    pub fn grid(&self) -> &ControlGrid {
        &self.grid
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_opacity(&mut self, opacity: f32) -> MappingResult<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(MappingError::InvalidProperty {
                property: "opacity",
                value: opacity,
            });
        }
        self.opacity = opacity;
        Ok(())
    }

    pub fn set_edge_softness(&mut self, softness: f32) -> MappingResult<()> {
        if !(0.0..=MAX_EDGE_SOFTNESS).contains(&softness) {
            return Err(MappingError::InvalidProperty {
                property: "edge_softness",
                value: softness,
            });
        }
        self.edge_softness = softness;
        Ok(())
    }

    pub fn set_point(&mut self, index: usize, position: Vec2) -> MappingResult<()> {
        self.grid.set_point(index, position)?;
        self.revision = next_revision();
        Ok(())
    }

    pub fn move_point(&mut self, index: usize, delta: Vec2) -> MappingResult<()> {
        self.grid.move_point(index, delta)?;
        self.revision = next_revision();
        Ok(())
    }

    /// Re-densify a quad surface. Masks are polygons and cannot be resampled.
    pub fn resample(&mut self, rows: usize, cols: usize) -> MappingResult<()> {
        match self.kind {
            LayerKind::Surface => self.grid.resample(rows, cols)?,
            LayerKind::Mask => {
                return Err(MappingError::MalformedGrid(
                    "mask polygons cannot be resampled".to_string(),
                ))
            }
        }
        self.revision = next_revision();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_creation() {
        let layer = Layer::surface("Surface 1");
        assert_eq!(layer.kind(), LayerKind::Surface);
        assert!(layer.is_visible());
        assert_eq!(layer.opacity(), 1.0);
        assert_eq!(layer.edge_softness(), 0.0);
        assert!(layer.grid().is_quad());

        let mask = Layer::mask("Mask 1");
        assert_eq!(mask.kind(), LayerKind::Mask);
        assert_eq!(mask.grid().len(), 3);
    }

    #[test]
    fn test_property_ranges_rejected() {
        let mut layer = Layer::surface("s");
        assert!(layer.set_opacity(1.5).is_err());
        assert!(layer.set_opacity(f32::NAN).is_err());
        assert_eq!(layer.opacity(), 1.0);

        assert!(layer.set_edge_softness(0.6).is_err());
        layer.set_edge_softness(0.5).unwrap();
        assert_eq!(layer.edge_softness(), 0.5);
    }

    #[test]
    fn test_revision_changes_only_on_geometry_edits() {
        let mut layer = Layer::surface("s");
        let rev = layer.revision();

        layer.set_opacity(0.5).unwrap();
        assert_eq!(layer.revision(), rev);

        layer.set_point(0, Vec2::new(-0.6, 0.6)).unwrap();
        assert_ne!(layer.revision(), rev);

        let rev = layer.revision();
        assert!(layer.set_point(10, Vec2::ZERO).is_err());
        assert_eq!(layer.revision(), rev);
    }

    #[test]
    fn test_mask_resample_rejected() {
        let mut mask = Layer::mask("m");
        assert!(matches!(mask.resample(3, 3), Err(MappingError::MalformedGrid(_))));
        assert_eq!(mask.grid().len(), 3);
    }

    #[test]
    fn test_from_parts_validates_kind() {
        let err = Layer::from_parts(LayerId::new(), "bad", LayerKind::Mask, ControlGrid::create_quad());
        assert!(err.is_err());

        let ok = Layer::from_parts(LayerId::new(), "ok", LayerKind::Surface, ControlGrid::create_quad());
        assert!(ok.is_ok());
    }
}

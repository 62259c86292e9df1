//! Derived per-layer data
//!
//! Geometry and homographies are rebuilt lazily from a layer's control points
//! and keyed by the layer revision, so an edit only invalidates the layer it
//! touched.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;

use super::{Layer, LayerId, LayerKind, Scene};
use crate::math::Homography;
use crate::mesh::{MaskGeometry, SurfaceGeometry, Vertex};

/// Renderable geometry for one layer
#[derive(Debug, Clone, PartialEq)]
pub enum LayerGeometry {
    Surface(SurfaceGeometry),
    Mask(MaskGeometry),
}

impl LayerGeometry {
    /// Generate geometry for a layer
    pub fn generate(layer: &Layer) -> Self {
        match layer.kind() {
            LayerKind::Surface => LayerGeometry::Surface(SurfaceGeometry::from_grid(layer.grid())),
            LayerKind::Mask => LayerGeometry::Mask(MaskGeometry::from_grid(layer.grid())),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            LayerGeometry::Surface(geo) => geo.is_empty(),
            LayerGeometry::Mask(geo) => geo.is_empty(),
        }
    }

    /// Every triangle, strips and fans alike
    pub fn triangles(&self) -> Box<dyn Iterator<Item = [Vertex; 3]> + '_> {
        match self {
            LayerGeometry::Surface(geo) => Box::new(geo.triangles()),
            LayerGeometry::Mask(geo) => Box::new(geo.triangles()),
        }
    }

    /// Flattened triangle list for backends without strip or fan topology
    pub fn triangle_list(&self) -> Vec<Vertex> {
        self.triangles().flatten().collect()
    }

    /// Point-in-geometry test in NDC
    pub fn contains(&self, point: Vec2) -> bool {
        self.triangles().any(|[a, b, c]| {
            let d1 = (b.position() - a.position()).perp_dot(point - a.position());
            let d2 = (c.position() - b.position()).perp_dot(point - b.position());
            let d3 = (a.position() - c.position()).perp_dot(point - c.position());
            let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
            let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
            !(has_neg && has_pos)
        })
    }
}

/// Cached geometry and homography for one layer revision
#[derive(Debug, Clone)]
pub struct CachedLayer {
    pub revision: u64,
    pub geometry: Arc<LayerGeometry>,
    /// UV square to the surface's outer corners; identity for masks
    pub homography: Homography,
}

impl CachedLayer {
    fn build(layer: &Layer) -> Self {
        let homography = match layer.kind() {
            LayerKind::Surface => layer
                .grid()
                .corners()
                .map(|corners| Homography::unit_square_to(&corners))
                .unwrap_or_default(),
            LayerKind::Mask => Homography::IDENTITY,
        };

        Self {
            revision: layer.revision(),
            geometry: Arc::new(LayerGeometry::generate(layer)),
            homography,
        }
    }
}

/// Lazily rebuilt geometry for every layer in a scene
#[derive(Debug, Default)]
pub struct GeometryCache {
    entries: HashMap<LayerId, CachedLayer>,
    builds: u64,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached data for a layer, regenerating it if the layer changed
    pub fn get(&mut self, layer: &Layer) -> &CachedLayer {
        let stale = self
            .entries
            .get(&layer.id)
            .map_or(true, |entry| entry.revision != layer.revision());

        if stale {
            log::debug!("Regenerating geometry for layer {} ({})", layer.name, layer.id);
            self.builds += 1;
            self.entries.insert(layer.id, CachedLayer::build(layer));
        }

        &self.entries[&layer.id]
    }

    /// Drop entries for layers no longer in the scene
    pub fn prune(&mut self, scene: &Scene) {
        self.entries.retain(|id, _| scene.layer(*id).is_some());
    }

    /// Number of geometry builds performed so far
    pub fn build_count(&self) -> u64 {
        self.builds
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_only_on_revision_change() {
        let mut a = Layer::surface("a");
        let b = Layer::surface("b");
        let mut cache = GeometryCache::new();

        cache.get(&a);
        cache.get(&b);
        assert_eq!(cache.build_count(), 2);

        cache.get(&a);
        cache.get(&b);
        assert_eq!(cache.build_count(), 2);

        a.set_point(0, Vec2::new(-0.7, 0.7)).unwrap();
        cache.get(&a);
        cache.get(&b);
        assert_eq!(cache.build_count(), 3);
    }

    #[test]
    fn test_surface_homography_maps_uv_corners() {
        let layer = Layer::surface("s");
        let mut cache = GeometryCache::new();
        let entry = cache.get(&layer);
        let tl = entry.homography.apply(Vec2::ZERO);
        assert!((tl - Vec2::new(-0.5, 0.5)).length() < 1e-5);
        assert!(matches!(*entry.geometry, LayerGeometry::Surface(_)));
    }
}

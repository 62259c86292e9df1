//! Scene state: the ordered layer stack and the commands that edit it
//!
//! All edits go through [`Scene::apply`]. A command either succeeds completely
//! or is rejected with a [`MappingError`] and leaves the scene untouched.

mod cache;
mod layer;

pub use cache::{CachedLayer, GeometryCache, LayerGeometry};
pub use layer::{Layer, LayerId, LayerKind, MAX_EDGE_SOFTNESS};

use glam::Vec2;

use crate::error::{MappingError, MappingResult};
use crate::math::Homography;

/// Discrete edit applied to a [`Scene`]
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    /// Append a default quad surface or default triangle mask
    AddLayer { kind: LayerKind },
    DeleteLayer { id: LayerId },
    SetPoint { id: LayerId, index: usize, point: Vec2 },
    MovePoint { id: LayerId, index: usize, delta: Vec2 },
    /// Re-densify a quad surface into `rows x cols`
    Resample { id: LayerId, rows: usize, cols: usize },
    SetOpacity { id: LayerId, opacity: f32 },
    SetEdgeSoftness { id: LayerId, softness: f32 },
    SetVisible { id: LayerId, visible: bool },
    Rename { id: LayerId, name: String },
    /// Move a layer to a new position in the stack (0 is drawn first)
    ReorderLayer { id: LayerId, index: usize },
}

/// Ordered layer stack. List order is z-order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    layers: Vec<Layer>,
    /// Bumped on every successful command
    version: u64,
    surface_count: usize,
    mask_count: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an edit, returning the id of the affected layer
    pub fn apply(&mut self, command: SceneCommand) -> MappingResult<LayerId> {
        let id = match command {
            SceneCommand::AddLayer { kind } => self.add_layer(kind),
            SceneCommand::DeleteLayer { id } => {
                let index = self.index_of(id)?;
                let layer = self.layers.remove(index);
                log::debug!("Deleted {} layer '{}'", layer.kind().name(), layer.name);
                id
            }
            SceneCommand::SetPoint { id, index, point } => {
                self.layer_mut(id)?.set_point(index, point)?;
                id
            }
            SceneCommand::MovePoint { id, index, delta } => {
                self.layer_mut(id)?.move_point(index, delta)?;
                id
            }
            SceneCommand::Resample { id, rows, cols } => {
                self.layer_mut(id)?.resample(rows, cols)?;
                id
            }
            SceneCommand::SetOpacity { id, opacity } => {
                self.layer_mut(id)?.set_opacity(opacity)?;
                id
            }
            SceneCommand::SetEdgeSoftness { id, softness } => {
                self.layer_mut(id)?.set_edge_softness(softness)?;
                id
            }
            SceneCommand::SetVisible { id, visible } => {
                self.layer_mut(id)?.set_visible(visible);
                id
            }
            SceneCommand::Rename { id, name } => {
                self.layer_mut(id)?.name = name;
                id
            }
            SceneCommand::ReorderLayer { id, index } => {
                let from = self.index_of(id)?;
                if index >= self.layers.len() {
                    return Err(MappingError::IndexOutOfRange {
                        index,
                        len: self.layers.len(),
                    });
                }
                let layer = self.layers.remove(from);
                self.layers.insert(index, layer);
                id
            }
        };

        self.version += 1;
        Ok(id)
    }

    fn add_layer(&mut self, kind: LayerKind) -> LayerId {
        let layer = match kind {
            LayerKind::Surface => {
                self.surface_count += 1;
                Layer::surface(format!("Surface {}", self.surface_count))
            }
            LayerKind::Mask => {
                self.mask_count += 1;
                Layer::mask(format!("Mask {}", self.mask_count))
            }
        };
        let id = layer.id;
        log::debug!("Added {} layer '{}'", kind.name(), layer.name);
        self.layers.push(layer);
        id
    }

    /// Append an already-built layer (used when loading projects)
    pub fn push_layer(&mut self, layer: Layer) {
        match layer.kind() {
            LayerKind::Surface => self.surface_count += 1,
            LayerKind::Mask => self.mask_count += 1,
        }
        self.layers.push(layer);
        self.version += 1;
    }

    /// Monotonic edit counter
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn layer_mut(&mut self, id: LayerId) -> MappingResult<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(MappingError::LayerNotFound(id))
    }

    fn index_of(&self, id: LayerId) -> MappingResult<usize> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(MappingError::LayerNotFound(id))
    }

    /// Surfaces in draw order
    pub fn surfaces(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.kind() == LayerKind::Surface)
    }

    /// Masks in list order
    pub fn masks(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.kind() == LayerKind::Mask)
    }

    pub fn has_visible_masks(&self) -> bool {
        self.masks().any(Layer::is_visible)
    }

    /// Topmost visible layer covering an NDC position
    pub fn layer_at(&self, ndc: Vec2) -> Option<LayerId> {
        self.layers
            .iter()
            .rev()
            .filter(|l| l.is_visible())
            .find(|l| LayerGeometry::generate(l).contains(ndc))
            .map(|l| l.id)
    }

    /// Control point under an NDC position, searching from the top of the stack
    pub fn point_at(&self, ndc: Vec2, radius: f32) -> Option<(LayerId, usize)> {
        self.layers
            .iter()
            .rev()
            .filter(|l| l.is_visible())
            .find_map(|l| l.grid().nearest_point(ndc, radius).map(|index| (l.id, index)))
    }

    /// Texture coordinate of an NDC position inside a surface's outer quad
    pub fn surface_uv_at(&self, id: LayerId, ndc: Vec2) -> Option<Vec2> {
        let layer = self.layer(id)?;
        if layer.kind() != LayerKind::Surface {
            return None;
        }
        let corners = layer.grid().corners()?;
        let to_uv = Homography::try_compute(&UNIT_SQUARE, &corners).ok()?.inverse()?;
        let uv = to_uv.apply(ndc);
        let inside = -UV_EPSILON..=1.0 + UV_EPSILON;
        (inside.contains(&uv.x) && inside.contains(&uv.y)).then(|| uv.clamp(Vec2::ZERO, Vec2::ONE))
    }
}

const UV_EPSILON: f32 = 1e-4;

const UNIT_SQUARE: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with(kinds: &[LayerKind]) -> (Scene, Vec<LayerId>) {
        let mut scene = Scene::new();
        let ids = kinds
            .iter()
            .map(|&kind| scene.apply(SceneCommand::AddLayer { kind }).unwrap())
            .collect();
        (scene, ids)
    }

    #[test]
    fn test_add_layers_named_per_kind() {
        let (scene, ids) = scene_with(&[LayerKind::Surface, LayerKind::Mask, LayerKind::Surface]);
        assert_eq!(scene.len(), 3);
        assert_eq!(scene.layer(ids[0]).unwrap().name, "Surface 1");
        assert_eq!(scene.layer(ids[1]).unwrap().name, "Mask 1");
        assert_eq!(scene.layer(ids[2]).unwrap().name, "Surface 2");
        assert_eq!(scene.surfaces().count(), 2);
        assert_eq!(scene.version(), 3);
    }

    #[test]
    fn test_rejected_command_leaves_scene_unchanged() {
        let (mut scene, ids) = scene_with(&[LayerKind::Surface]);
        let before = scene.layer(ids[0]).unwrap().clone();
        let version = scene.version();

        let err = scene
            .apply(SceneCommand::SetPoint {
                id: ids[0],
                index: 9,
                point: Vec2::ONE,
            })
            .unwrap_err();
        assert_eq!(err, MappingError::IndexOutOfRange { index: 9, len: 4 });

        let missing = LayerId::new();
        assert_eq!(
            scene.apply(SceneCommand::DeleteLayer { id: missing }),
            Err(MappingError::LayerNotFound(missing))
        );
        assert!(scene
            .apply(SceneCommand::SetOpacity { id: ids[0], opacity: -0.1 })
            .is_err());

        assert_eq!(scene.layer(ids[0]).unwrap(), &before);
        assert_eq!(scene.version(), version);
    }

    #[test]
    fn test_edit_invalidates_only_that_layer() {
        let (mut scene, ids) = scene_with(&[LayerKind::Surface, LayerKind::Surface]);
        let mut cache = GeometryCache::new();
        for layer in scene.layers() {
            cache.get(layer);
        }
        assert_eq!(cache.build_count(), 2);

        scene
            .apply(SceneCommand::MovePoint {
                id: ids[1],
                index: 3,
                delta: Vec2::new(0.1, -0.1),
            })
            .unwrap();
        scene
            .apply(SceneCommand::SetOpacity { id: ids[0], opacity: 0.5 })
            .unwrap();

        for layer in scene.layers() {
            cache.get(layer);
        }
        assert_eq!(cache.build_count(), 3);
    }

    #[test]
    fn test_delete_and_prune() {
        let (mut scene, ids) = scene_with(&[LayerKind::Surface, LayerKind::Mask]);
        let mut cache = GeometryCache::new();
        for layer in scene.layers() {
            cache.get(layer);
        }

        scene.apply(SceneCommand::DeleteLayer { id: ids[1] }).unwrap();
        cache.prune(&scene);
        assert_eq!(cache.len(), 1);
        assert!(!scene.has_visible_masks());
    }

    #[test]
    fn test_reorder() {
        let (mut scene, ids) = scene_with(&[LayerKind::Surface, LayerKind::Surface, LayerKind::Mask]);
        scene
            .apply(SceneCommand::ReorderLayer { id: ids[2], index: 0 })
            .unwrap();
        let order: Vec<LayerId> = scene.layers().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1]]);

        assert!(scene
            .apply(SceneCommand::ReorderLayer { id: ids[0], index: 3 })
            .is_err());
    }

    #[test]
    fn test_layer_at_picks_topmost_visible() {
        let (mut scene, ids) = scene_with(&[LayerKind::Surface, LayerKind::Surface]);
        assert_eq!(scene.layer_at(Vec2::ZERO), Some(ids[1]));
        assert_eq!(scene.layer_at(Vec2::new(0.9, 0.9)), None);

        scene
            .apply(SceneCommand::SetVisible { id: ids[1], visible: false })
            .unwrap();
        assert_eq!(scene.layer_at(Vec2::ZERO), Some(ids[0]));
    }

    #[test]
    fn test_surface_uv_at() {
        let (scene, ids) = scene_with(&[LayerKind::Surface]);
        let uv = scene.surface_uv_at(ids[0], Vec2::new(-0.5, 0.5)).unwrap();
        assert!(uv.length() < 1e-5);

        let center = scene.surface_uv_at(ids[0], Vec2::ZERO).unwrap();
        assert!((center - Vec2::splat(0.5)).length() < 1e-5);

        assert!(scene.surface_uv_at(ids[0], Vec2::new(0.9, 0.0)).is_none());
    }

    #[test]
    fn test_point_at_prefers_top_layer() {
        let (scene, ids) = scene_with(&[LayerKind::Surface, LayerKind::Surface]);
        assert_eq!(scene.point_at(Vec2::new(0.49, -0.49), 0.03), Some((ids[1], 3)));
        assert_eq!(scene.point_at(Vec2::new(0.2, 0.0), 0.03), None);
    }
}

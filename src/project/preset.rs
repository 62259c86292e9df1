//! Corner presets for quad surfaces

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};
use crate::scene::{Layer, LayerId, Scene, SceneCommand};

/// Named set of quad corners `[top-left, top-right, bottom-left, bottom-right]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerPreset {
    pub name: String,
    pub corners: [[f32; 2]; 4],
}

impl CornerPreset {
    /// Capture the corners of a plain quad surface
    pub fn capture(name: impl Into<String>, layer: &Layer) -> MappingResult<Self> {
        let grid = layer.grid();
        if !grid.is_quad() {
            return Err(MappingError::MalformedGrid(format!(
                "presets hold 4 corners, layer '{}' has {} points",
                layer.name,
                grid.len()
            )));
        }
        let mut corners = [[0.0; 2]; 4];
        for (dst, src) in corners.iter_mut().zip(&grid.points) {
            *dst = src.to_array();
        }
        Ok(Self {
            name: name.into(),
            corners,
        })
    }

    /// Move a quad surface's corners onto this preset.
    ///
    /// Validated up front so the scene is untouched on error.
    pub fn apply(&self, scene: &mut Scene, id: LayerId) -> MappingResult<()> {
        let layer = scene.layer(id).ok_or(MappingError::LayerNotFound(id))?;
        if !layer.grid().is_quad() {
            return Err(MappingError::MalformedGrid(format!(
                "preset '{}' needs a 4-point quad",
                self.name
            )));
        }
        for (index, corner) in self.corners.iter().enumerate() {
            scene.apply(SceneCommand::SetPoint {
                id,
                index,
                point: Vec2::from_array(*corner),
            })?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Saved preset '{}' to {:?}", self.name, path);
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let preset: Self = serde_json::from_str(&json)?;
        log::info!("Loaded preset '{}' from {:?}", preset.name, path);
        Ok(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::LayerKind;

    #[test]
    fn test_capture_and_apply() {
        let mut scene = Scene::new();
        let a = scene.apply(SceneCommand::AddLayer { kind: LayerKind::Surface }).unwrap();
        let b = scene.apply(SceneCommand::AddLayer { kind: LayerKind::Surface }).unwrap();
        scene
            .apply(SceneCommand::SetPoint {
                id: a,
                index: 0,
                point: Vec2::new(-0.9, 0.9),
            })
            .unwrap();

        let preset = CornerPreset::capture("wall", scene.layer(a).unwrap()).unwrap();
        assert_eq!(preset.corners[0], [-0.9, 0.9]);

        preset.apply(&mut scene, b).unwrap();
        assert_eq!(scene.layer(b).unwrap().grid(), scene.layer(a).unwrap().grid());
    }

    #[test]
    fn test_dense_grid_rejected() {
        let mut scene = Scene::new();
        let id = scene.apply(SceneCommand::AddLayer { kind: LayerKind::Surface }).unwrap();
        let preset = CornerPreset::capture("p", scene.layer(id).unwrap()).unwrap();
        scene.apply(SceneCommand::Resample { id, rows: 3, cols: 3 }).unwrap();

        assert!(CornerPreset::capture("p", scene.layer(id).unwrap()).is_err());
        let before = scene.layer(id).unwrap().clone();
        assert!(preset.apply(&mut scene, id).is_err());
        assert_eq!(scene.layer(id).unwrap(), &before);
    }
}

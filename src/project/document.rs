//! Project document: the JSON form of a scene and its editor state

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::ViewSettings;
use crate::error::{MappingError, MappingResult};
use crate::mesh::ControlGrid;
use crate::scene::{Layer, LayerId, LayerKind, Scene};

/// Current document format version
pub const PROJECT_VERSION: &str = "2.0";

/// Output display selection and resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub selected_screen_index: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            selected_screen_index: 0,
            width: 1920,
            height: 1080,
        }
    }
}

/// One layer as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub opacity: f32,
    pub edge_softness: f32,
    pub rows: usize,
    pub cols: usize,
    pub control_points: Vec<[f32; 2]>,
}

impl LayerRecord {
    pub fn from_layer(layer: &Layer) -> Self {
        let grid = layer.grid();
        Self {
            id: layer.id,
            name: layer.name.clone(),
            kind: layer.kind(),
            visible: layer.is_visible(),
            opacity: layer.opacity(),
            edge_softness: layer.edge_softness(),
            rows: grid.rows,
            cols: grid.cols,
            control_points: grid.points.iter().map(|p| p.to_array()).collect(),
        }
    }

    /// Rebuild the layer, checking the grid and property invariants
    pub fn to_layer(&self) -> MappingResult<Layer> {
        let grid = ControlGrid {
            rows: self.rows,
            cols: self.cols,
            points: self.control_points.iter().copied().map(Vec2::from_array).collect(),
        };
        if grid.points.iter().any(|p| !p.is_finite()) {
            return Err(MappingError::MalformedGrid(format!(
                "layer '{}' has non-finite control points",
                self.name
            )));
        }

        let mut layer = Layer::from_parts(self.id, self.name.clone(), self.kind, grid)?;
        layer.set_visible(self.visible);
        layer.set_opacity(self.opacity)?;
        layer.set_edge_softness(self.edge_softness)?;
        Ok(layer)
    }
}

/// Saved project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub name: String,
    pub version: String,
    pub layers: Vec<LayerRecord>,
    pub view_settings: ViewSettings,
    pub output_settings: OutputSettings,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self {
            name: "Untitled Project".to_string(),
            version: PROJECT_VERSION.to_string(),
            layers: Vec::new(),
            view_settings: ViewSettings::default(),
            output_settings: OutputSettings::default(),
        }
    }
}

impl ProjectDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Snapshot a scene, keeping the given editor and output state
    pub fn from_scene(
        name: impl Into<String>,
        scene: &Scene,
        view_settings: ViewSettings,
        output_settings: OutputSettings,
    ) -> Self {
        Self {
            name: name.into(),
            version: PROJECT_VERSION.to_string(),
            layers: scene.layers().iter().map(LayerRecord::from_layer).collect(),
            view_settings,
            output_settings,
        }
    }

    /// Build a scene from the stored layers.
    ///
    /// Every record is validated; the first invalid one fails the whole load.
    pub fn to_scene(&self) -> MappingResult<Scene> {
        let mut scene = Scene::new();
        for record in &self.layers {
            if scene.layer(record.id).is_some() {
                return Err(MappingError::MalformedGrid(format!(
                    "duplicate layer id {}",
                    record.id
                )));
            }
            scene.push_layer(record.to_layer()?);
        }
        Ok(scene)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a document
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let document: Self = serde_json::from_str(json)?;
        if document.version != PROJECT_VERSION {
            log::warn!(
                "Project '{}' has version {}, expected {}",
                document.name,
                document.version,
                PROJECT_VERSION
            );
        }
        document.to_scene()?;
        Ok(document)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved project to {:?}", path);
        Ok(())
    }

    /// Load from a file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let document = Self::from_json(&json)?;
        log::info!("Loaded project '{}' from {:?} ({} layers)", document.name, path, document.layers.len());
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneCommand;

    fn sample_scene() -> Scene {
        let mut scene = Scene::new();
        let s = scene.apply(SceneCommand::AddLayer { kind: LayerKind::Surface }).unwrap();
        scene.apply(SceneCommand::AddLayer { kind: LayerKind::Mask }).unwrap();
        scene.apply(SceneCommand::Resample { id: s, rows: 3, cols: 4 }).unwrap();
        scene.apply(SceneCommand::SetOpacity { id: s, opacity: 0.75 }).unwrap();
        scene
            .apply(SceneCommand::SetEdgeSoftness { id: s, softness: 0.1 })
            .unwrap();
        scene
    }

    #[test]
    fn test_json_round_trip() {
        let scene = sample_scene();
        let doc = ProjectDocument::from_scene("Show", &scene, ViewSettings::default(), OutputSettings::default());
        let parsed = ProjectDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed, doc);

        let restored = parsed.to_scene().unwrap();
        assert_eq!(restored.len(), 2);
        for (a, b) in scene.layers().iter().zip(restored.layers()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.kind(), b.kind());
            assert_eq!(a.grid(), b.grid());
            assert_eq!(a.opacity(), b.opacity());
            assert_eq!(a.edge_softness(), b.edge_softness());
        }
    }

    #[test]
    fn test_json_field_names() {
        let doc = ProjectDocument::from_scene("Show", &sample_scene(), ViewSettings::default(), OutputSettings::default());
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["version"], "2.0");
        assert_eq!(value["layers"][0]["kind"], "surface");
        assert_eq!(value["layers"][1]["kind"], "mask");
        assert_eq!(value["layers"][0]["control_points"].as_array().unwrap().len(), 12);
        assert!(value["view_settings"]["zoom_level"].is_number());
        assert!(value["output_settings"]["selected_screen_index"].is_number());
    }

    #[test]
    fn test_malformed_records_rejected() {
        let doc = ProjectDocument::from_scene("Show", &sample_scene(), ViewSettings::default(), OutputSettings::default());

        let mut short = doc.clone();
        short.layers[0].control_points.pop();
        assert!(short.to_scene().is_err());

        let mut opaque = doc.clone();
        opaque.layers[0].opacity = 2.0;
        assert!(matches!(
            opaque.to_scene(),
            Err(MappingError::InvalidProperty { property: "opacity", .. })
        ));

        let mut tiny_mask = doc.clone();
        tiny_mask.layers[1].control_points.truncate(2);
        assert!(ProjectDocument::from_json(&tiny_mask.to_json().unwrap()).is_err());

        let mut dup = doc;
        dup.layers[1].id = dup.layers[0].id;
        assert!(dup.to_scene().is_err());
    }

    #[test]
    fn test_non_finite_edit_keeps_scene_saveable() {
        let mut scene = sample_scene();
        let id = scene.layers()[0].id;
        let version = scene.version();

        let err = scene
            .apply(SceneCommand::SetPoint {
                id,
                index: 0,
                point: Vec2::new(f32::NAN, 0.0),
            })
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidProperty { property: "control_point", .. }));
        assert!(scene
            .apply(SceneCommand::MovePoint {
                id,
                index: 1,
                delta: Vec2::new(f32::INFINITY, 0.0),
            })
            .is_err());
        assert_eq!(scene.version(), version);

        let doc = ProjectDocument::from_scene("Show", &scene, ViewSettings::default(), OutputSettings::default());
        let restored = ProjectDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(restored, doc);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("aurora-project-{}.json", uuid::Uuid::new_v4()));
        let doc = ProjectDocument::from_scene("Show", &sample_scene(), ViewSettings::default(), OutputSettings::default());
        doc.save(&path).unwrap();
        let loaded = ProjectDocument::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, doc);
    }
}

//! Compositor configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How surface textures are sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

impl TextureFilter {
    pub fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            TextureFilter::Linear => wgpu::FilterMode::Linear,
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

/// Output and rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorSettings {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Clear color, straight RGBA 0..1
    pub background: [f32; 4],
    pub texture_filter: TextureFilter,
    /// Control point pick radius in NDC
    pub handle_radius: f32,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            background: [0.0, 0.0, 0.0, 1.0],
            texture_filter: TextureFilter::Linear,
            handle_radius: 0.03,
        }
    }
}

impl CompositorSettings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        if settings.width == 0 || settings.height == 0 {
            anyhow::bail!("Output size {}x{} is invalid", settings.width, settings.height);
        }
        log::info!("Loaded compositor settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Saved compositor settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: CompositorSettings =
            serde_json::from_str(r#"{ "width": 640, "texture_filter": "nearest" }"#).unwrap();
        assert_eq!(settings.width, 640);
        assert_eq!(settings.height, 1080);
        assert_eq!(settings.texture_filter, TextureFilter::Nearest);
    }

    #[test]
    fn test_save_load() {
        let path = std::env::temp_dir().join(format!("aurora-settings-{}.json", uuid::Uuid::new_v4()));
        let settings = CompositorSettings {
            width: 320,
            height: 200,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        let loaded = CompositorSettings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_zero_size_rejected() {
        let path = std::env::temp_dir().join(format!("aurora-settings-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "width": 0 }"#).unwrap();
        assert!(CompositorSettings::load(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}

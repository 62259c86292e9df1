//! Stencil compositor
//!
//! Builds the two-pass plan for a frame: every visible mask writes the stencil
//! reference, then every visible surface is drawn in list order wherever the
//! stencil does not hold the reference.

use std::collections::{HashMap, HashSet};

use super::{DrawCommand, FramePlan, RenderBackend, SurfaceUniforms};
use crate::error::{MappingError, RenderError};
use crate::scene::{GeometryCache, LayerId, Scene};
use crate::settings::CompositorSettings;
use crate::source::FrameSource;

/// Per-frame plan builder with per-layer caches
pub struct StencilCompositor<T> {
    geometry: GeometryCache,
    /// Last texture each surface was drawn with
    last_textures: HashMap<LayerId, T>,
    /// Layers already reported as missing a frame
    reported_missing: HashSet<LayerId>,
    clear_color: [f32; 4],
    frame_count: u64,
}

impl<T: Clone> StencilCompositor<T> {
    pub fn new(settings: &CompositorSettings) -> Self {
        Self {
            geometry: GeometryCache::new(),
            last_textures: HashMap::new(),
            reported_missing: HashSet::new(),
            clear_color: settings.background,
            frame_count: 0,
        }
    }

    /// Geometry cache shared by every frame
    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Build the draw list for the current state of `scene`.
    ///
    /// The source is latched once, so every surface in the frame samples the
    /// same texture. A surface with no texture falls back to the last one it
    /// was drawn with; a surface that never had one is skipped.
    pub fn build_plan<S>(&mut self, scene: &Scene, source: &S) -> FramePlan<T>
    where
        S: FrameSource<Texture = T>,
    {
        source.begin_frame();
        let texture = source.current_texture();

        self.geometry.prune(scene);
        self.last_textures.retain(|id, _| scene.layer(*id).is_some());

        let mut plan = FramePlan::new(self.clear_color);
        plan.commands.push(DrawCommand::ClearStencil);

        // Mask pass
        if scene.has_visible_masks() {
            for mask in scene.masks().filter(|l| l.is_visible()) {
                let geometry = &self.geometry.get(mask).geometry;
                if geometry.is_empty() {
                    continue;
                }
                plan.commands.push(DrawCommand::Mask {
                    layer: mask.id,
                    geometry: geometry.clone(),
                });
            }
        }

        // Surface pass
        for surface in scene.surfaces().filter(|l| l.is_visible()) {
            let frame = match &texture {
                Some(tex) => {
                    self.last_textures.insert(surface.id, tex.clone());
                    self.reported_missing.remove(&surface.id);
                    Some(tex.clone())
                }
                None => self.last_textures.get(&surface.id).cloned(),
            };

            let Some(frame) = frame else {
                if self.reported_missing.insert(surface.id) {
                    log::warn!("No frame for surface '{}', skipping draw", surface.name);
                }
                plan.skipped.push(MappingError::MissingFrame(surface.id));
                continue;
            };

            let geometry = &self.geometry.get(surface).geometry;
            if geometry.is_empty() {
                continue;
            }
            plan.commands.push(DrawCommand::Surface {
                layer: surface.id,
                geometry: geometry.clone(),
                texture: frame,
                uniforms: SurfaceUniforms::new(surface.opacity(), surface.edge_softness()),
            });
        }

        self.frame_count += 1;
        log::debug!(
            "Frame {}: {} masks, {} surfaces, {} skipped",
            self.frame_count,
            plan.mask_count(),
            plan.surface_count(),
            plan.skipped.len()
        );

        plan
    }

    /// Build a plan and execute it on `backend`
    pub fn render<S, B>(&mut self, scene: &Scene, source: &S, backend: &mut B) -> Result<FramePlan<T>, RenderError>
    where
        S: FrameSource<Texture = T>,
        B: RenderBackend<Texture = T>,
    {
        let plan = self.build_plan(scene, source);
        backend.execute(&plan)?;
        Ok(plan)
    }
}

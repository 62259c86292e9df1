//! Render module: stencil compositing and its backends
//!
//! The [`StencilCompositor`] turns a scene into a [`FramePlan`]. A
//! [`RenderBackend`] executes the plan, either on the GPU through wgpu or in
//! software through the reference rasterizer.

mod compositor;
mod cpu;
mod gpu;
mod pipeline;

pub use compositor::StencilCompositor;
pub use cpu::{CpuRasterizer, CpuTexture};
pub use gpu::{GpuContext, GpuRenderer, GpuTexture};

use std::sync::Arc;

use glam::Vec2;

use crate::error::{MappingError, RenderError};
use crate::mesh::Vertex;
use crate::scene::{LayerGeometry, LayerId};

impl Vertex {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            },
            wgpu::VertexAttribute {
                offset: 8,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };
}

/// Stencil value written by masks and rejected by surfaces
pub const STENCIL_REFERENCE: u8 = 1;

/// Uniform data for the surface shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SurfaceUniforms {
    /// [opacity, edge_softness, 0, 0]
    pub params: [f32; 4],
}

impl SurfaceUniforms {
    pub fn new(opacity: f32, edge_softness: f32) -> Self {
        Self {
            params: [opacity, edge_softness, 0.0, 0.0],
        }
    }

    pub fn opacity(&self) -> f32 {
        self.params[0]
    }

    pub fn edge_softness(&self) -> f32 {
        self.params[1]
    }
}

impl Default for SurfaceUniforms {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

/// Soft-edge alpha multiplier at a surface UV.
///
/// The minimum of four linear ramps, one per edge, each reaching 1 at
/// `softness` away from its edge. Always 1 when softness is 0.
pub fn edge_falloff(uv: Vec2, softness: f32) -> f32 {
    if softness <= 0.0 {
        return 1.0;
    }
    let d = uv.x.min(1.0 - uv.x).min(uv.y).min(1.0 - uv.y);
    (d / softness).clamp(0.0, 1.0)
}

/// One step of a frame
#[derive(Debug, Clone)]
pub enum DrawCommand<T> {
    /// Reset every stencil value to 0
    ClearStencil,
    /// Write the stencil reference under the mask, no color output
    Mask {
        layer: LayerId,
        geometry: Arc<LayerGeometry>,
    },
    /// Textured surface, drawn only where the stencil differs from the reference
    Surface {
        layer: LayerId,
        geometry: Arc<LayerGeometry>,
        texture: T,
        uniforms: SurfaceUniforms,
    },
}

/// Ordered draw list for one frame
#[derive(Debug, Clone)]
pub struct FramePlan<T> {
    /// Straight RGBA clear color
    pub clear_color: [f32; 4],
    pub commands: Vec<DrawCommand<T>>,
    /// Surface draws dropped because no texture was ever available
    pub skipped: Vec<MappingError>,
}

impl<T> FramePlan<T> {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            clear_color,
            commands: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn mask_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Mask { .. }))
            .count()
    }

    pub fn surface_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Surface { .. }))
            .count()
    }

    /// Layer ids in draw order
    pub fn draw_order(&self) -> Vec<LayerId> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::ClearStencil => None,
                DrawCommand::Mask { layer, .. } | DrawCommand::Surface { layer, .. } => Some(*layer),
            })
            .collect()
    }
}

/// Executes frame plans
pub trait RenderBackend {
    /// Texture handle sampled by surface draws
    type Texture: Clone;

    /// Output size in pixels
    fn size(&self) -> (u32, u32);

    /// Render a plan into the backend's target
    fn execute(&mut self, plan: &FramePlan<Self::Texture>) -> Result<(), RenderError>;

    /// Copy the target back as straight RGBA8
    fn read_pixels(&mut self) -> Result<image::RgbaImage, RenderError>;
}

//! AuroraMapper core
//!
//! Projection-mapping compositor: homography solving, warpable control grids,
//! mesh tessellation and stencil-masked compositing.

pub mod error;
pub mod math;
pub mod mesh;
pub mod project;
pub mod render;
pub mod scene;
pub mod settings;
pub mod source;

// Re-export commonly used types
pub use error::{MappingError, MappingResult, RenderError};
pub use math::{Homography, Viewport};
pub use mesh::{ControlGrid, MaskGeometry, SurfaceGeometry, Vertex};
pub use project::{CornerPreset, ProjectDocument, ViewSettings};
pub use render::{CpuRasterizer, FramePlan, GpuContext, GpuRenderer, RenderBackend, StencilCompositor};
pub use scene::{Layer, LayerId, LayerKind, Scene, SceneCommand};
pub use settings::{CompositorSettings, TextureFilter};
pub use source::{FrameSlot, FrameSource};

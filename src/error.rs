//! Error types for the mapping core
//!
//! Every condition here is recoverable: callers reject the offending edit or
//! fall back to the last good visual state for the affected layer only.

use crate::scene::LayerId;

/// Errors raised by mapping and editing operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("Homography needs exactly 4 correspondences per side (got {src} source, {dst} destination)")]
    InvalidCorrespondence { src: usize, dst: usize },
    #[error("Homography system is singular")]
    SingularSystem,
    #[error("Point index {index} out of range for {len} control points")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Malformed grid: {0}")]
    MalformedGrid(String),
    #[error("No frame texture available for layer {0}")]
    MissingFrame(LayerId),
    #[error("Layer {0} not found")]
    LayerNotFound(LayerId),
    #[error("Invalid value for {property}: {value}")]
    InvalidProperty { property: &'static str, value: f32 },
}

/// Errors raised by render backends
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("Renderer used before init or after teardown")]
    NotInitialized,
    #[error("Render target size {width}x{height} is invalid")]
    InvalidTargetSize { width: u32, height: u32 },
    #[error("Pixel readback failed: {0}")]
    Readback(String),
}

/// Convenience result alias for mapping operations
pub type MappingResult<T> = Result<T, MappingError>;

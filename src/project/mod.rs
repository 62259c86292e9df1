//! Project persistence
//!
//! JSON project documents, editor view state and quad corner presets.

mod document;
mod preset;
mod view;

pub use document::{LayerRecord, OutputSettings, ProjectDocument, PROJECT_VERSION};
pub use preset::CornerPreset;
pub use view::ViewSettings;

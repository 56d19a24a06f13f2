//! Trellis
//!
//! Scene graph viewer on wgpu and winit. Nodes are compiled each frame into
//! per-model instance buffers of a single geometry pass; Wavefront OBJ files
//! are packed into one texture atlas per model.

pub mod app;
pub mod atlas;
pub mod config;
pub mod containers;
pub mod gfx;
pub mod logging;
pub mod math;
pub mod prelude;
pub mod scene;
pub mod stats;
pub mod ui;
pub mod wavefront;

pub use app::TrellisApp;

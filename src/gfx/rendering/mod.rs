//! wgpu side of the renderer

pub mod render_engine;
pub mod texture_resource;
pub mod uniform_buffer;
pub mod wgpu_device;

pub use render_engine::RenderEngine;
pub use texture_resource::{DepthTarget, ImageTexture};
pub use wgpu_device::{GpuImage, WgpuDevice};

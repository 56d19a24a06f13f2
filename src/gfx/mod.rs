//! # Graphics Module
//!
//! - **Registries** ([`geometry_pass`]) - mesh, material and model pools plus the draw table
//! - **Device seam** ([`device`]) - resource callbacks the registries go through
//! - **Rendering** ([`rendering`]) - wgpu surface, pipeline and the [`device::RenderDevice`] backed by it
//! - **Handles** ([`handle`], [`pool`]) - generation checked slot storage
//!
//! The registries only hold ids handed out by a [`device::RenderDevice`]. Tests
//! drive them through [`device::HeadlessDevice`]; the viewer uses
//! [`rendering::WgpuDevice`].

pub mod device;
pub mod geometry_pass;
pub mod handle;
pub mod pool;
pub mod render;
pub mod rendering;
pub mod vertex;

pub use device::{HeadlessDevice, RenderDevice};
pub use geometry_pass::{GeometryPass, MaterialId, MeshId, ModelId};
pub use handle::{Handle, Trace};
pub use rendering::{RenderEngine, WgpuDevice};
pub use vertex::{InstanceData, Vertex};

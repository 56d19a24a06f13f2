//! Common imports
//!
//! ```no_run
//! use trellis::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let console = trellis::logging::init()?;
//!     TrellisApp::new(AppConfig::default(), console)?.run()
//! }
//! ```

pub use crate::app::TrellisApp;
pub use crate::config::{AppConfig, CliArgs};

pub use crate::gfx::geometry_pass::{MaterialDesc, MeshBoxDesc, MeshDesc, ModelDesc};
pub use crate::gfx::{GeometryPass, HeadlessDevice, MaterialId, MeshId, ModelId, RenderDevice, Vertex};
pub use crate::math::{quat_from_euler, quat_to_euler, Transform};
pub use crate::scene::{Camera, CameraController, NodeDesc, NodeId, Scene};
pub use crate::stats::Stats;
pub use crate::wavefront::{load_obj, make_model, ModelShape, WavefrontImage, WavefrontModel};

pub use cgmath::{InnerSpace, Quaternion, Vector3, Zero};

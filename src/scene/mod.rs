//! # Scene
//!
//! - [`scene::Scene`] - node pool, camera, light and root matrix
//! - [`compiler`] - turns the node hierarchy into per-model instance data
//! - [`camera`] - look-at camera and its mouse controller

pub mod camera;
pub mod compiler;
#[allow(clippy::module_inception)]
pub mod scene;

pub use camera::{Camera, CameraController};
pub use compiler::{CompileSummary, ModelBucket};
pub use scene::{Light, Node, NodeDesc, NodeId, Scene, SCENE_MAX_NODES};

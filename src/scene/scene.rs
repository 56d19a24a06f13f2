//! Scene nodes, camera and light
//!
//! Nodes live in a fixed pool of [`SCENE_MAX_NODES`] slots. Each node carries a
//! local transform, a colour and tile, an optional model and a parent; a node
//! whose parent is [`NodeId::INVALID`] hangs off the scene root matrix. The
//! parent graph has to stay acyclic.

use cgmath::{Matrix4, SquareMatrix, Vector3, Vector4};

use crate::gfx::geometry_pass::ModelId;
use crate::gfx::handle::{Handle, Trace};
use crate::gfx::pool::SlotPool;
use crate::math::Transform;

use super::camera::Camera;

pub const SCENE_MAX_NODES: usize = 128;

pub type NodeId = Handle<Node>;

#[derive(Debug, Clone)]
pub struct Node {
    pub transform: Transform,
    pub color: [f32; 4],
    /// UV rectangle `(u0, v0, u1, v1)` of the material image
    pub tile: [f32; 4],
    /// `ModelId::INVALID` for pure transform nodes
    pub model: ModelId,
    pub parent: NodeId,
    pub trace: Trace,
}

#[derive(Debug, Clone, Copy)]
pub struct NodeDesc<'a> {
    pub transform: Transform,
    pub color: [f32; 4],
    pub tile: [f32; 4],
    pub model: ModelId,
    pub parent: NodeId,
    pub label: &'a str,
}

impl Default for NodeDesc<'_> {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            color: [1.0; 4],
            tile: [0.0, 0.0, 1.0, 1.0],
            model: ModelId::INVALID,
            parent: NodeId::INVALID,
            label: "node",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Direction towards the light in `xyz`, plane distance in `w`
    pub plane: Vector4<f32>,
    pub ambient: Vector3<f32>,
    pub specular: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            plane: Vector4::new(0.3, 1.0, 0.5, 0.0),
            ambient: Vector3::new(0.25, 0.25, 0.3),
            specular: 0.5,
        }
    }
}

pub struct Scene {
    nodes: SlotPool<Node>,
    pub camera: Camera,
    pub light: Light,
    /// Applied on top of every root-attached node
    pub root: Matrix4<f32>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: SlotPool::new(SCENE_MAX_NODES),
            camera: Camera::default(),
            light: Light::default(),
            root: Matrix4::identity(),
        }
    }

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node)
    }

    /// Live nodes in slot order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a node; a parent that does not resolve attaches it to the root
    pub fn add_node(&mut self, desc: &NodeDesc) -> NodeId {
        let mut parent = desc.parent;
        if !parent.is_invalid() && !self.nodes.contains(parent) {
            log::warn!(
                "Node '{}' is parented to a missing node ({}), attaching to root",
                desc.label,
                parent.id()
            );
            parent = NodeId::INVALID;
        }

        let handle = self.nodes.insert(Node {
            transform: desc.transform,
            color: desc.color,
            tile: desc.tile,
            model: desc.model,
            parent,
            trace: Trace::new(desc.label),
        });

        if handle.is_invalid() {
            log::warn!("No free scene slot for node '{}'", desc.label);
        }
        handle
    }

    /// Removes a node
    ///
    /// With `recursive` the whole subtree goes. Otherwise the children are
    /// handed to the removed node's parent as they are: their local transforms
    /// are not rebased, so they keep their offsets but now relative to the new
    /// parent.
    pub fn remove_node(&mut self, node: NodeId, recursive: bool) {
        let Some(parent) = self.nodes.get(node).map(|n| n.parent) else {
            return;
        };

        if !recursive {
            for child in self.nodes.find_all(|n| n.parent == node) {
                if let Some(child) = self.nodes.get_mut(child) {
                    child.parent = parent;
                }
            }
            self.nodes.remove(node);
            return;
        }

        let mut doomed = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if doomed.contains(&current) {
                continue;
            }
            doomed.push(current);
            stack.extend(self.nodes.find_all(|n| n.parent == current));
        }

        // children before their parents
        for id in doomed.into_iter().rev() {
            self.nodes.remove(id);
        }
    }

    /// Drops every node that draws `model`
    pub fn remove_nodes_with_model(&mut self, model: ModelId) {
        for node in self.nodes.find_all(|n| n.model == model) {
            self.remove_node(node, false);
        }
    }

    pub fn clear(&mut self) {
        for node in self.nodes.find_all(|_| true) {
            self.nodes.remove(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translated(x: f32, y: f32, z: f32, parent: NodeId) -> NodeDesc<'static> {
        NodeDesc {
            transform: Transform::from_position(Vector3::new(x, y, z)),
            parent,
            ..Default::default()
        }
    }

    #[test]
    fn test_scene_capacity() {
        let mut scene = Scene::new();
        for _ in 0..SCENE_MAX_NODES {
            assert!(!scene.add_node(&NodeDesc::default()).is_invalid());
        }
        assert!(scene.add_node(&NodeDesc::default()).is_invalid());
    }

    #[test]
    fn test_remove_splices_children_without_rebasing() {
        let mut scene = Scene::new();
        let grandparent = scene.add_node(&translated(5.0, 0.0, 0.0, NodeId::INVALID));
        let parent = scene.add_node(&translated(1.0, 0.0, 0.0, grandparent));
        let child = scene.add_node(&translated(0.0, 1.0, 0.0, parent));

        scene.remove_node(parent, false);

        assert!(scene.node(parent).is_none());
        let child = scene.node(child).unwrap();
        assert_eq!(child.parent, grandparent);
        assert_eq!(child.transform.position, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_recursive_remove_takes_subtree() {
        let mut scene = Scene::new();
        let keep = scene.add_node(&translated(0.0, 0.0, 0.0, NodeId::INVALID));
        let root = scene.add_node(&translated(0.0, 0.0, 0.0, NodeId::INVALID));
        let a = scene.add_node(&translated(0.0, 0.0, 0.0, root));
        let b = scene.add_node(&translated(0.0, 0.0, 0.0, a));
        let c = scene.add_node(&translated(0.0, 0.0, 0.0, root));

        scene.remove_node(root, true);

        for gone in [root, a, b, c] {
            assert!(scene.node(gone).is_none());
        }
        assert!(scene.node(keep).is_some());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_remove_stale_handle_is_noop() {
        let mut scene = Scene::new();
        let first = scene.add_node(&NodeDesc::default());
        scene.remove_node(first, true);
        let second = scene.add_node(&NodeDesc::default());

        scene.remove_node(first, true);
        assert!(scene.node(second).is_some());
    }

    #[test]
    fn test_missing_parent_attaches_to_root() {
        let mut scene = Scene::new();
        let gone = scene.add_node(&NodeDesc::default());
        scene.remove_node(gone, true);

        let orphan = scene.add_node(&translated(1.0, 0.0, 0.0, gone));
        // the orphan lands in the freed slot and must not point at itself
        assert_eq!(orphan.id(), gone.id());
        assert!(scene.node(orphan).unwrap().parent.is_invalid());
    }
}

//! Scene graph to instance buffer compiler
//!
//! Once per frame the live nodes are flattened into links, sorted by the raw id
//! of their parent and resolved in that order: a root-attached link takes the
//! scene root matrix, any other link looks its parent up among all links and
//! multiplies onto whatever world pose that link holds at this point. The sort
//! puts root-attached nodes first, which is enough for hierarchies built in
//! creation order. A parent that itself sorts after its child has not been
//! resolved yet and still holds a zero pose; that case is reported, not
//! reordered.
//!
//! Resolved instances are grouped per model slot and uploaded through
//! [`GeometryPass::update_model_instances`].

use cgmath::{Matrix4, Zero};

use crate::gfx::device::RenderDevice;
use crate::gfx::geometry_pass::{GeometryPass, ModelId, GEOMETRY_PASS_MAX_MODELS};
use crate::gfx::vertex::InstanceData;
use crate::math::{normal_matrix, transform_to_mat4, Transform};

use super::scene::{NodeId, Scene};

struct Link {
    node: NodeId,
    parent: NodeId,
    model: ModelId,
    local: Transform,
    color: [f32; 4],
    tile: [f32; 4],
    world: Matrix4<f32>,
    resolved: bool,
}

/// Instances gathered for one model
#[derive(Debug, Clone)]
pub struct ModelBucket {
    pub model: ModelId,
    pub instances: Vec<InstanceData>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileSummary {
    /// Live nodes visited
    pub nodes: usize,
    /// Models that received instances
    pub models: usize,
    /// Instances kept after clamping
    pub instances: usize,
}

impl Scene {
    /// Resolves world poses and groups them into per-model buckets
    ///
    /// Nodes without a model only contribute their transform to children.
    /// Nodes whose model no longer exists in `pass` are skipped.
    pub fn compile(&self, pass: &GeometryPass) -> Vec<ModelBucket> {
        let mut links: Vec<Link> = self
            .nodes()
            .map(|(id, node)| Link {
                node: id,
                parent: node.parent,
                model: node.model,
                local: node.transform,
                color: node.color,
                tile: node.tile,
                world: Matrix4::zero(),
                resolved: false,
            })
            .collect();

        if links.is_empty() {
            return Vec::new();
        }

        links.sort_by_key(|link| link.parent.id());

        for i in 0..links.len() {
            let local_pose = transform_to_mat4(&links[i].local);
            let parent = links[i].parent;

            let world = if parent.is_invalid() {
                self.root * local_pose
            } else {
                match links.iter().find(|link| link.node == parent) {
                    Some(parent_link) => {
                        if !parent_link.resolved {
                            log::warn!(
                                "Node ({}) reads the pose of its parent ({}) before it is resolved",
                                links[i].node.id(),
                                parent.id()
                            );
                        }
                        parent_link.world * local_pose
                    }
                    None => {
                        log::warn!(
                            "Node ({}) has a missing parent ({}); attaching it to the scene root",
                            links[i].node.id(),
                            parent.id()
                        );
                        self.root * local_pose
                    }
                }
            };

            links[i].world = world;
            links[i].resolved = true;
        }

        let mut buckets: Vec<Option<ModelBucket>> = vec![None; GEOMETRY_PASS_MAX_MODELS];
        for link in &links {
            let Some(slot) = link.model.index() else {
                continue;
            };
            if slot >= buckets.len() || pass.model(link.model).is_none() {
                log::debug!(
                    "Node ({}) references a stale model ({})",
                    link.node.id(),
                    link.model.id()
                );
                continue;
            }

            let instance = InstanceData {
                color: link.color,
                tile: link.tile,
                pose: link.world.into(),
                normal: normal_matrix(&link.world).into(),
            };

            buckets[slot]
                .get_or_insert_with(|| ModelBucket {
                    model: link.model,
                    instances: Vec::new(),
                })
                .instances
                .push(instance);
        }

        buckets.into_iter().flatten().collect()
    }

    /// Refreshes the pass globals from camera and light, then uploads every
    /// non-empty model bucket
    ///
    /// An empty scene makes no registry calls at all.
    pub fn update_geometry_pass(
        &self,
        pass: &mut GeometryPass,
        device: &mut dyn RenderDevice,
    ) -> CompileSummary {
        pass.globals.view_proj = self.camera.view_proj().into();
        pass.globals.light_plane = self.light.plane.into();
        pass.globals.eye_pos = self.camera.eye_pos.extend(1.0).into();
        pass.globals.ambient_spec = self.light.ambient.extend(self.light.specular).into();

        let buckets = self.compile(pass);

        let mut summary = CompileSummary {
            nodes: self.len(),
            ..Default::default()
        };

        for bucket in buckets.iter().filter(|bucket| !bucket.instances.is_empty()) {
            summary.instances += pass.update_model_instances(device, bucket.model, &bucket.instances);
            summary.models += 1;
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::HeadlessDevice;
    use crate::gfx::geometry_pass::{MeshBoxDesc, ModelDesc, GEOMETRY_PASS_MAX_INSTANCES};
    use crate::scene::scene::NodeDesc;
    use cgmath::Vector3;

    fn setup() -> (HeadlessDevice, GeometryPass, ModelId) {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let mesh = pass.make_mesh_box(
            &mut device,
            &MeshBoxDesc {
                width: 1.0,
                height: 1.0,
                length: 1.0,
                label: "box",
            },
        );
        let material = pass.make_material_default(&mut device);
        let model = pass.create_model(
            &mut device,
            &ModelDesc {
                mesh,
                material,
                label: "box",
            },
        );
        (device, pass, model)
    }

    fn at(x: f32, y: f32, z: f32, parent: NodeId, model: ModelId) -> NodeDesc<'static> {
        NodeDesc {
            transform: Transform::from_position(Vector3::new(x, y, z)),
            parent,
            model,
            ..Default::default()
        }
    }

    fn translation(instance: &InstanceData) -> [f32; 3] {
        let w = instance.pose[3];
        [w[0], w[1], w[2]]
    }

    fn translations(buckets: &[ModelBucket]) -> Vec<[f32; 3]> {
        buckets
            .iter()
            .flat_map(|bucket| bucket.instances.iter().map(translation))
            .collect()
    }

    #[test]
    fn test_root_and_child_translation() {
        let (_, pass, model) = setup();
        let mut scene = Scene::new();
        let root = scene.add_node(&at(1.0, 0.0, 0.0, NodeId::INVALID, model));
        scene.add_node(&at(0.0, 1.0, 0.0, root, model));

        let buckets = scene.compile(&pass);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].model, model);
        assert_eq!(translations(&buckets), vec![[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_scene_root_matrix_applies_to_roots() {
        let (_, pass, model) = setup();
        let mut scene = Scene::new();
        scene.root = Matrix4::from_translation(Vector3::new(0.0, 0.0, -2.0));
        scene.add_node(&at(1.0, 0.0, 0.0, NodeId::INVALID, model));

        assert_eq!(translations(&scene.compile(&pass)), vec![[1.0, 0.0, -2.0]]);
    }

    // Removing a parent without recursion keeps the child's local offset, so
    // the child jumps from (1, 1, 0) to (0, 1, 0) in world space.
    #[test]
    fn test_non_recursive_remove_makes_child_jump() {
        let (_, pass, model) = setup();
        let mut scene = Scene::new();
        let root = scene.add_node(&at(1.0, 0.0, 0.0, NodeId::INVALID, model));
        let child = scene.add_node(&at(0.0, 1.0, 0.0, root, model));

        scene.remove_node(root, false);

        let node = scene.node(child).unwrap();
        assert!(node.parent.is_invalid());
        assert_eq!(node.transform.position, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(translations(&scene.compile(&pass)), vec![[0.0, 1.0, 0.0]]);
    }

    // A parent re-attached under a node created after it sorts behind its own
    // child, so the child multiplies onto a pose that is still zero.
    #[test]
    fn test_parent_sorted_after_child_reads_zero_pose() {
        let (_, pass, model) = setup();
        let mut scene = Scene::new();
        let _anchor = scene.add_node(&at(0.0, 0.0, 0.0, NodeId::INVALID, ModelId::INVALID));
        let parent = scene.add_node(&at(1.0, 0.0, 0.0, NodeId::INVALID, ModelId::INVALID));
        let late = scene.add_node(&at(0.0, 0.0, 3.0, NodeId::INVALID, ModelId::INVALID));
        scene.add_node(&at(0.0, 1.0, 0.0, parent, model));

        scene.node_mut(parent).unwrap().parent = late;

        let buckets = scene.compile(&pass);
        assert_eq!(buckets[0].instances.len(), 1);
        assert_eq!(buckets[0].instances[0].pose, [[0.0; 4]; 4]);
    }

    #[test]
    fn test_normal_matrix_of_scaled_node() {
        let (_, pass, model) = setup();
        let mut scene = Scene::new();
        let mut desc = at(0.0, 0.0, 0.0, NodeId::INVALID, model);
        desc.transform.scale = Vector3::new(2.0, 2.0, 2.0);
        scene.add_node(&desc);

        let buckets = scene.compile(&pass);
        let instance = &buckets[0].instances[0];
        assert_eq!(instance.pose[0][0], 2.0);
        assert!((instance.normal[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_update_clamps_per_model() {
        let (mut device, mut pass, model) = setup();
        let mut scene = Scene::new();
        for i in 0..GEOMETRY_PASS_MAX_INSTANCES + 5 {
            scene.add_node(&at(i as f32, 0.0, 0.0, NodeId::INVALID, model));
        }

        let summary = scene.update_geometry_pass(&mut pass, &mut device);
        assert_eq!(summary.instances, GEOMETRY_PASS_MAX_INSTANCES);
        assert_eq!(summary.models, 1);
        assert_eq!(summary.nodes, GEOMETRY_PASS_MAX_INSTANCES + 5);

        let draw = pass.render_pass().get(model.index().unwrap()).unwrap();
        assert_eq!(draw.num_instances as usize, GEOMETRY_PASS_MAX_INSTANCES);
    }

    #[test]
    fn test_uploaded_bytes_match_instances() {
        let (mut device, mut pass, model) = setup();
        let mut scene = Scene::new();
        scene.add_node(&at(4.0, 5.0, 6.0, NodeId::INVALID, model));
        scene.update_geometry_pass(&mut pass, &mut device);

        let buffer = device.buffer(pass.model(model).unwrap().instance_buffer).unwrap();
        let first: InstanceData = bytemuck::pod_read_unaligned(&buffer.bytes[..160]);
        assert_eq!(translation(&first), [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_empty_scene_makes_no_registry_calls() {
        let (mut device, mut pass, model) = setup();
        let scene = Scene::new();

        let summary = scene.update_geometry_pass(&mut pass, &mut device);
        assert_eq!(summary, CompileSummary::default());

        let buffer = device.buffer(pass.model(model).unwrap().instance_buffer).unwrap();
        assert_eq!(buffer.updates, 0);
    }

    #[test]
    fn test_stale_model_is_skipped() {
        let (mut device, mut pass, model) = setup();
        let mut scene = Scene::new();
        scene.add_node(&at(0.0, 0.0, 0.0, NodeId::INVALID, model));
        pass.destroy_model(&mut device, model);

        assert!(scene.compile(&pass).is_empty());
        assert_eq!(scene.update_geometry_pass(&mut pass, &mut device).instances, 0);
    }
}

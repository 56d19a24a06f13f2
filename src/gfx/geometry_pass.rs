//! # Geometry Pass
//!
//! Owns the mesh, material and model registries and the draw table that the
//! renderer replays every frame.
//!
//! ## Registries
//!
//! Each registry is a [`SlotPool`] with a fixed capacity. `make_*` takes the
//! first free slot and returns [`Handle::INVALID`] when the pool is full;
//! `destroy_*` frees the slot, releases the device resources it held and then
//! destroys every model that referenced it. Models are leaves, so destroying a
//! model cascades no further.
//!
//! ## Models
//!
//! A model pairs a mesh with a material and owns a per-instance vertex buffer
//! with room for [`GEOMETRY_PASS_MAX_INSTANCES`] entries. The model's slot index
//! doubles as its draw call slot in the [`RenderPass`].

use std::mem;

use super::device::{BufferDesc, BufferId, BufferUsage, ImageDesc, ImageFormat, ImageId, RenderDevice};
use super::handle::{Handle, Trace};
use super::pool::SlotPool;
use super::render::{Bindings, DrawCall, RenderPass, RENDER_PASS_MAX_DRAW_CALLS};
use super::vertex::{InstanceData, Vertex};

pub const GEOMETRY_PASS_MAX_MESHES: usize = 32;
pub const GEOMETRY_PASS_MAX_MATERIALS: usize = 16;
pub const GEOMETRY_PASS_MAX_MODELS: usize = RENDER_PASS_MAX_DRAW_CALLS;
pub const GEOMETRY_PASS_MAX_INSTANCES: usize = 64;

pub type MeshId = Handle<Mesh>;
pub type MaterialId = Handle<Material>;
pub type ModelId = Handle<Model>;

#[derive(Debug)]
pub struct Mesh {
    pub num_elements: u32,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub trace: Trace,
}

#[derive(Debug)]
pub struct Material {
    /// Ambient colour in `xyz`, specular strength in `w`
    pub ambient_spec: [f32; 4],
    pub albedo_rough: ImageId,
    pub width: u32,
    pub height: u32,
    pub trace: Trace,
}

#[derive(Debug)]
pub struct Model {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub instance_buffer: BufferId,
    pub trace: Trace,
}

#[derive(Debug, Clone, Copy)]
pub struct MeshDesc<'a> {
    pub vertices: &'a [Vertex],
    pub indices: &'a [u16],
    pub label: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct MeshBoxDesc<'a> {
    pub width: f32,
    pub height: f32,
    pub length: f32,
    pub label: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct MaterialDesc<'a> {
    pub width: u32,
    pub height: u32,
    /// Packed RGBA8 texels, row-major
    pub pixels: &'a [u32],
    pub ambient_spec: [f32; 4],
    pub label: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelDesc<'a> {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub label: &'a str,
}

/// Per-pass uniforms shared by every draw call
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GeometryPassGlobals {
    pub view_proj: [[f32; 4]; 4],
    /// Light direction in `xyz`, plane distance in `w`
    pub light_plane: [f32; 4],
    pub eye_pos: [f32; 4],
    /// Light ambient colour in `xyz`, specular strength in `w`
    pub ambient_spec: [f32; 4],
}

impl Default for GeometryPassGlobals {
    fn default() -> Self {
        Self {
            view_proj: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            light_plane: [0.0, 1.0, 0.0, 0.0],
            eye_pos: [0.0, 0.0, 0.0, 1.0],
            ambient_spec: [0.2, 0.2, 0.2, 0.5],
        }
    }
}

const CHECKERBOARD_PIXELS: [u32; 16] = [
    0x99FFFFFF, 0xFF000000, 0x99FFFFFF, 0xFF000000, //
    0xFF000000, 0x99FFFFFF, 0xFF000000, 0x99FFFFFF, //
    0x99FFFFFF, 0xFF000000, 0x99FFFFFF, 0xFF000000, //
    0xFF000000, 0x99FFFFFF, 0xFF000000, 0x99FFFFFF, //
];

pub struct GeometryPass {
    meshes: SlotPool<Mesh>,
    materials: SlotPool<Material>,
    models: SlotPool<Model>,
    pub globals: GeometryPassGlobals,
    render: RenderPass,
}

impl Default for GeometryPass {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryPass {
    pub fn new() -> Self {
        Self {
            meshes: SlotPool::new(GEOMETRY_PASS_MAX_MESHES),
            materials: SlotPool::new(GEOMETRY_PASS_MAX_MATERIALS),
            models: SlotPool::new(GEOMETRY_PASS_MAX_MODELS),
            globals: GeometryPassGlobals::default(),
            render: RenderPass::new(),
        }
    }

    pub fn mesh(&self, mesh: MeshId) -> Option<&Mesh> {
        self.meshes.get(mesh)
    }

    pub fn material(&self, material: MaterialId) -> Option<&Material> {
        self.materials.get(material)
    }

    pub fn model(&self, model: ModelId) -> Option<&Model> {
        self.models.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = (ModelId, &Model)> {
        self.models.iter()
    }

    /// Handle of the model currently living in slot `index`
    pub fn model_at(&self, index: usize) -> Option<ModelId> {
        self.models.handle_at(index)
    }

    pub fn render_pass(&self) -> &RenderPass {
        &self.render
    }

    /// Uploads a mesh and stores it in the first free mesh slot
    ///
    /// # Panics
    /// Panics if the descriptor has no vertices or no indices.
    pub fn make_mesh(&mut self, device: &mut dyn RenderDevice, desc: &MeshDesc) -> MeshId {
        assert!(!desc.vertices.is_empty(), "mesh '{}' has no vertices", desc.label);
        assert!(!desc.indices.is_empty(), "mesh '{}' has no indices", desc.label);

        let handle = self.meshes.insert_with(|_| {
            let vertex_buffer = device.create_buffer(&BufferDesc {
                label: Trace::new(&format!("{}-vb", desc.label)).as_str(),
                usage: BufferUsage::Vertex,
                size: mem::size_of_val(desc.vertices),
                contents: Some(bytemuck::cast_slice(desc.vertices)),
            });

            let index_buffer = device.create_buffer(&BufferDesc {
                label: Trace::new(&format!("{}-ib", desc.label)).as_str(),
                usage: BufferUsage::Index,
                size: mem::size_of_val(desc.indices),
                contents: Some(bytemuck::cast_slice(desc.indices)),
            });

            Mesh {
                num_elements: desc.indices.len() as u32,
                vertex_buffer,
                index_buffer,
                trace: Trace::new(desc.label),
            }
        });

        if handle.is_invalid() {
            log::warn!("No free mesh slot for '{}'", desc.label);
        }
        handle
    }

    /// Axis aligned box centred on the origin, 4 vertices per face
    pub fn make_mesh_box(&mut self, device: &mut dyn RenderDevice, desc: &MeshBoxDesc) -> MeshId {
        let (vertices, indices) = box_geometry(desc.width, desc.height, desc.length);

        self.make_mesh(
            device,
            &MeshDesc {
                vertices: &vertices,
                indices: &indices,
                label: desc.label,
            },
        )
    }

    /// Frees the mesh and destroys every model that draws it
    pub fn destroy_mesh(&mut self, device: &mut dyn RenderDevice, mesh: MeshId) {
        if let Some(removed) = self.meshes.remove(mesh) {
            device.destroy_buffer(removed.vertex_buffer);
            device.destroy_buffer(removed.index_buffer);
            log::debug!("Destroyed mesh ({}:{})", removed.trace, mesh.id());
        }

        for model in self.models.find_all(|model| model.mesh == mesh) {
            self.destroy_model(device, model);
        }
    }

    /// Uploads a material image and stores it in the first free material slot
    ///
    /// # Panics
    /// Panics on zero dimensions or when `pixels` does not hold exactly
    /// `width * height` texels.
    pub fn make_material(
        &mut self,
        device: &mut dyn RenderDevice,
        desc: &MaterialDesc,
    ) -> MaterialId {
        assert!(desc.width > 0 && desc.height > 0, "material '{}' is empty", desc.label);
        assert_eq!(
            desc.pixels.len(),
            (desc.width * desc.height) as usize,
            "material '{}' pixel count does not match its size",
            desc.label
        );

        let handle = self.materials.insert_with(|_| {
            let albedo_rough = device.create_image(&ImageDesc {
                label: Trace::new(&format!("{}-image", desc.label)).as_str(),
                width: desc.width,
                height: desc.height,
                format: ImageFormat::Rgba8,
                pixels: bytemuck::cast_slice(desc.pixels),
            });

            Material {
                ambient_spec: desc.ambient_spec,
                albedo_rough,
                width: desc.width,
                height: desc.height,
                trace: Trace::new(desc.label),
            }
        });

        if handle.is_invalid() {
            log::warn!("No free material slot for '{}'", desc.label);
        }
        handle
    }

    /// 4x4 checkerboard, handy when a model comes without textures
    pub fn make_material_default(&mut self, device: &mut dyn RenderDevice) -> MaterialId {
        self.make_material(
            device,
            &MaterialDesc {
                width: 4,
                height: 4,
                pixels: &CHECKERBOARD_PIXELS,
                ambient_spec: [1.0, 1.0, 1.0, 0.0],
                label: "checkerboard-material",
            },
        )
    }

    /// Frees the material and destroys every model that uses it
    pub fn destroy_material(&mut self, device: &mut dyn RenderDevice, material: MaterialId) {
        if let Some(removed) = self.materials.remove(material) {
            device.destroy_image(removed.albedo_rough);
            log::debug!("Destroyed material ({}:{})", removed.trace, material.id());
        }

        for model in self.models.find_all(|model| model.material == material) {
            self.destroy_model(device, model);
        }
    }

    /// Pairs a live mesh with a live material and sets up its draw call
    ///
    /// Returns [`Handle::INVALID`] when either reference does not resolve or no
    /// model slot is free.
    pub fn create_model(&mut self, device: &mut dyn RenderDevice, desc: &ModelDesc) -> ModelId {
        let (Some(mesh), Some(material)) =
            (self.meshes.get(desc.mesh), self.materials.get(desc.material))
        else {
            log::warn!(
                "Model '{}' references a missing mesh ({}) or material ({})",
                desc.label,
                desc.mesh.id(),
                desc.material.id()
            );
            return ModelId::INVALID;
        };

        let num_indices = mesh.num_elements;
        let vertex_buffer = mesh.vertex_buffer;
        let index_buffer = mesh.index_buffer;
        let image = material.albedo_rough;

        let mut instance_buffer = None;
        let handle = self.models.insert_with(|_| {
            let buffer = device.create_buffer(&BufferDesc {
                label: "geometry-pass-instance-data",
                usage: BufferUsage::Instance,
                size: GEOMETRY_PASS_MAX_INSTANCES * mem::size_of::<InstanceData>(),
                contents: None,
            });
            instance_buffer = Some(buffer);

            Model {
                mesh: desc.mesh,
                material: desc.material,
                instance_buffer: buffer,
                trace: Trace::new(desc.label),
            }
        });

        let (Some(index), Some(instance_buffer)) = (handle.index(), instance_buffer) else {
            log::warn!("No free model slot for '{}'", desc.label);
            return handle;
        };

        self.render.set(
            index,
            DrawCall {
                indices_offset: 0,
                num_indices,
                num_instances: 0,
                bindings: Bindings {
                    index_buffer,
                    vertex_buffers: [vertex_buffer, instance_buffer],
                    fs_images: [image],
                },
            },
        );

        handle
    }

    /// Frees the model, its instance buffer and its draw call
    pub fn destroy_model(&mut self, device: &mut dyn RenderDevice, model: ModelId) {
        let Some(removed) = self.models.remove(model) else {
            return;
        };

        device.destroy_buffer(removed.instance_buffer);
        if let Some(index) = model.index() {
            self.render.clear(index);
        }
        log::debug!("Destroyed model ({}:{})", removed.trace, model.id());
    }

    /// Uploads this frame's instances for `model` and returns how many were kept
    ///
    /// More than [`GEOMETRY_PASS_MAX_INSTANCES`] entries are clamped with a
    /// warning. A model whose mesh or material no longer resolves is skipped.
    pub fn update_model_instances(
        &mut self,
        device: &mut dyn RenderDevice,
        model: ModelId,
        instances: &[InstanceData],
    ) -> usize {
        let Some(entry) = self.models.get(model) else {
            log::warn!("Model ({}) does not exist", model.id());
            return 0;
        };

        if !self.meshes.contains(entry.mesh) || !self.materials.contains(entry.material) {
            log::warn!("Model ({}:{}) is not valid", entry.trace, model.id());
            return 0;
        }

        let mut count = instances.len();
        if count > GEOMETRY_PASS_MAX_INSTANCES {
            log::warn!(
                "Too many instances ({}) for model ({}:{}); only {} will be updated",
                count,
                entry.trace,
                model.id(),
                GEOMETRY_PASS_MAX_INSTANCES
            );
            count = GEOMETRY_PASS_MAX_INSTANCES;
        }

        if count > 0 {
            device.update_buffer(entry.instance_buffer, bytemuck::cast_slice(&instances[..count]));
        }

        if let Some(draw) = model.index().and_then(|index| self.render.get_mut(index)) {
            draw.num_instances = count as u32;
        }
        count
    }

    /// Zeroes every draw call's instance count
    ///
    /// Call before compiling a frame so models left without nodes stop drawing.
    pub fn reset_instances(&mut self) {
        for index in 0..GEOMETRY_PASS_MAX_MODELS {
            if let Some(draw) = self.render.get_mut(index) {
                draw.num_instances = 0;
            }
        }
    }

    /// Destroys every mesh and material; models go with them
    pub fn cleanup(&mut self, device: &mut dyn RenderDevice) {
        for mesh in self.meshes.find_all(|_| true) {
            self.destroy_mesh(device, mesh);
        }
        for material in self.materials.find_all(|_| true) {
            self.destroy_material(device, material);
        }
    }
}

fn box_geometry(width: f32, height: f32, length: f32) -> (Vec<Vertex>, Vec<u16>) {
    let hw = width * 0.5;
    let hh = height * 0.5;
    let hl = length * 0.5;

    #[rustfmt::skip]
    let vertices = vec![
        Vertex::new([-hw, -hh, -hl], [0.0, 0.0, -1.0], [0.0, 0.0]),
        Vertex::new([ hw, -hh, -hl], [0.0, 0.0, -1.0], [1.0, 0.0]),
        Vertex::new([ hw,  hh, -hl], [0.0, 0.0, -1.0], [1.0, 1.0]),
        Vertex::new([-hw,  hh, -hl], [0.0, 0.0, -1.0], [0.0, 1.0]),

        Vertex::new([-hw, -hh,  hl], [0.0, 0.0, 1.0], [0.0, 0.0]),
        Vertex::new([ hw, -hh,  hl], [0.0, 0.0, 1.0], [1.0, 0.0]),
        Vertex::new([ hw,  hh,  hl], [0.0, 0.0, 1.0], [1.0, 1.0]),
        Vertex::new([-hw,  hh,  hl], [0.0, 0.0, 1.0], [0.0, 1.0]),

        Vertex::new([-hw, -hh, -hl], [-1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::new([-hw,  hh, -hl], [-1.0, 0.0, 0.0], [1.0, 0.0]),
        Vertex::new([-hw,  hh,  hl], [-1.0, 0.0, 0.0], [1.0, 1.0]),
        Vertex::new([-hw, -hh,  hl], [-1.0, 0.0, 0.0], [0.0, 1.0]),

        Vertex::new([ hw, -hh, -hl], [1.0, 0.0, 0.0], [0.0, 0.0]),
        Vertex::new([ hw,  hh, -hl], [1.0, 0.0, 0.0], [1.0, 0.0]),
        Vertex::new([ hw,  hh,  hl], [1.0, 0.0, 0.0], [1.0, 1.0]),
        Vertex::new([ hw, -hh,  hl], [1.0, 0.0, 0.0], [0.0, 1.0]),

        Vertex::new([-hw, -hh, -hl], [0.0, -1.0, 0.0], [0.0, 0.0]),
        Vertex::new([-hw, -hh,  hl], [0.0, -1.0, 0.0], [1.0, 0.0]),
        Vertex::new([ hw, -hh,  hl], [0.0, -1.0, 0.0], [1.0, 1.0]),
        Vertex::new([ hw, -hh, -hl], [0.0, -1.0, 0.0], [0.0, 1.0]),

        Vertex::new([-hw,  hh, -hl], [0.0, 1.0, 0.0], [0.0, 0.0]),
        Vertex::new([-hw,  hh,  hl], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([ hw,  hh,  hl], [0.0, 1.0, 0.0], [1.0, 1.0]),
        Vertex::new([ hw,  hh, -hl], [0.0, 1.0, 0.0], [0.0, 1.0]),
    ];

    #[rustfmt::skip]
    let indices = vec![
        2, 1, 0,  3, 2, 0,
        4, 5, 6,  4, 6, 7,
        10, 9, 8,  11, 10, 8,
        12, 13, 14,  12, 14, 15,
        18, 17, 16,  19, 18, 16,
        20, 21, 22,  20, 22, 23,
    ];

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::HeadlessDevice;

    fn triangle() -> ([Vertex; 3], [u16; 3]) {
        (
            [
                Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            [0, 1, 2],
        )
    }

    fn make_triangle(pass: &mut GeometryPass, device: &mut HeadlessDevice) -> MeshId {
        let (vertices, indices) = triangle();
        pass.make_mesh(
            device,
            &MeshDesc {
                vertices: &vertices,
                indices: &indices,
                label: "triangle",
            },
        )
    }

    fn setup_model(pass: &mut GeometryPass, device: &mut HeadlessDevice) -> (MeshId, MaterialId, ModelId) {
        let mesh = pass.make_mesh_box(
            device,
            &MeshBoxDesc {
                width: 1.0,
                height: 1.0,
                length: 1.0,
                label: "box",
            },
        );
        let material = pass.make_material_default(device);
        let model = pass.create_model(
            device,
            &ModelDesc {
                mesh,
                material,
                label: "box-model",
            },
        );
        (mesh, material, model)
    }

    #[test]
    fn test_mesh_pool_exhaustion() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();

        let handles: Vec<_> = (0..GEOMETRY_PASS_MAX_MESHES)
            .map(|_| make_triangle(&mut pass, &mut device))
            .collect();
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.id(), i as i32);
        }

        let overflow = make_triangle(&mut pass, &mut device);
        assert!(overflow.is_invalid());
        assert_eq!(device.live_buffers(), GEOMETRY_PASS_MAX_MESHES * 2);
    }

    #[test]
    fn test_box_mesh_counts() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let (mesh, _, _) = setup_model(&mut pass, &mut device);

        let mesh = pass.mesh(mesh).unwrap();
        assert_eq!(mesh.num_elements, 36);
        let vb = device.buffer(mesh.vertex_buffer).unwrap();
        assert_eq!(vb.bytes.len(), 24 * mem::size_of::<Vertex>());
        assert_eq!(vb.label, "box-vb");
    }

    #[test]
    fn test_destroy_mesh_cascades_to_model() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let (mesh, material, model) = setup_model(&mut pass, &mut device);
        let slot = model.index().unwrap();
        assert!(pass.render_pass().get(slot).is_some());

        pass.destroy_mesh(&mut device, mesh);

        assert!(pass.model(model).is_none());
        assert!(pass.model_at(slot).is_none());
        assert!(pass.render_pass().get(slot).is_none());
        assert!(pass.material(material).is_some());
        // only the material image is left
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_images(), 1);
    }

    #[test]
    fn test_destroy_material_cascades_to_model() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let (mesh, material, model) = setup_model(&mut pass, &mut device);

        pass.destroy_material(&mut device, material);
        assert!(pass.model(model).is_none());
        assert!(pass.mesh(mesh).is_some());
        assert_eq!(device.live_images(), 0);
    }

    #[test]
    fn test_create_model_rejects_missing_refs() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let material = pass.make_material_default(&mut device);

        let model = pass.create_model(
            &mut device,
            &ModelDesc {
                mesh: MeshId::INVALID,
                material,
                label: "broken",
            },
        );
        assert!(model.is_invalid());
        assert!(pass.render_pass().is_empty());
    }

    #[test]
    fn test_update_clamps_to_max_instances() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let (_, _, model) = setup_model(&mut pass, &mut device);

        let instances = vec![InstanceData::default(); GEOMETRY_PASS_MAX_INSTANCES + 5];
        let kept = pass.update_model_instances(&mut device, model, &instances);
        assert_eq!(kept, GEOMETRY_PASS_MAX_INSTANCES);

        let draw = pass.render_pass().get(model.index().unwrap()).unwrap();
        assert_eq!(draw.num_instances as usize, GEOMETRY_PASS_MAX_INSTANCES);
        assert_eq!(draw.num_indices, 36);

        let buffer = device.buffer(pass.model(model).unwrap().instance_buffer).unwrap();
        assert_eq!(buffer.updates, 1);
        assert_eq!(buffer.bytes.len(), GEOMETRY_PASS_MAX_INSTANCES * 160);
    }

    #[test]
    fn test_stale_mesh_handle_is_ignored() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let old = make_triangle(&mut pass, &mut device);
        pass.destroy_mesh(&mut device, old);

        let new = make_triangle(&mut pass, &mut device);
        assert_eq!(old.id(), new.id());

        pass.destroy_mesh(&mut device, old);
        assert!(pass.mesh(new).is_some());
    }

    #[test]
    fn test_default_material_pixels() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let material = pass.make_material_default(&mut device);

        let material = pass.material(material).unwrap();
        assert_eq!(material.ambient_spec, [1.0, 1.0, 1.0, 0.0]);
        let image = device.image(material.albedo_rough).unwrap();
        assert_eq!((image.width, image.height), (4, 4));
        assert_eq!(image.pixels.len(), 64);
        assert_eq!(&image.pixels[0..4], &[0xFF, 0xFF, 0xFF, 0x99]);
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let (_, _, model) = setup_model(&mut pass, &mut device);
        make_triangle(&mut pass, &mut device);

        pass.cleanup(&mut device);
        assert!(pass.model(model).is_none());
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_images(), 0);
        assert!(pass.render_pass().is_empty());
    }
}

//! Wavefront OBJ loading and model building
//!
//! [`load_obj`] parses OBJ text (through tobj, triangulated, one index per
//! vertex) into shapes with 16 bit indices. [`make_model`] then merges every
//! shape of an object into a single mesh: a model can bind only one image, so
//! the shapes' diffuse images are packed into one texture atlas and each
//! shape's UVs are remapped into its atlas rectangle.

use std::io::Cursor;
use std::path::Path;

use cgmath::{InnerSpace, Vector3, Zero};
use thiserror::Error;

use crate::atlas::TextureAtlas;
use crate::gfx::device::RenderDevice;
use crate::gfx::geometry_pass::{GeometryPass, MaterialDesc, MeshDesc, ModelDesc, ModelId};
use crate::gfx::vertex::Vertex;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WavefrontError {
    #[error("shape images do not fit into the texture atlas")]
    AtlasOutOfSize,
    #[error("face indices exceed the 16 bit index range")]
    FacesOutOfRange,
    #[error("mesh data is malformed")]
    MeshMalformed,
    #[error("object is invalid or could not be registered")]
    InvalidObject,
}

impl From<tobj::LoadError> for WavefrontError {
    fn from(error: tobj::LoadError) -> Self {
        match error {
            tobj::LoadError::FaceVertexOutOfBounds
            | tobj::LoadError::FaceTexCoordOutOfBounds
            | tobj::LoadError::FaceNormalOutOfBounds => WavefrontError::FacesOutOfRange,
            tobj::LoadError::InvalidObjectName => WavefrontError::InvalidObject,
            _ => WavefrontError::MeshMalformed,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WavefrontMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct WavefrontShape {
    pub name: String,
    pub mesh: WavefrontMesh,
    /// Diffuse colour with dissolve as alpha
    pub color: [f32; 4],
    /// Diffuse texture file named by the material, if any
    pub texture: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WavefrontObj {
    pub shapes: Vec<WavefrontShape>,
}

/// RGBA8 image, one packed `u32` per texel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavefrontImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl WavefrontImage {
    /// `size` x `size` image of a single colour
    pub fn solid(color: [f32; 4], size: u32) -> Self {
        let texel = pack_rgba(color);
        Self {
            width: size,
            height: size,
            pixels: vec![texel; (size * size) as usize],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModelShape<'a> {
    pub mesh: &'a WavefrontMesh,
    pub diffuse: &'a WavefrontImage,
}

#[derive(Debug, Clone, Copy)]
pub struct WavefrontModel<'a> {
    pub shapes: &'a [ModelShape<'a>],
    pub label: &'a str,
}

const DEFAULT_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

pub fn pack_rgba(color: [f32; 4]) -> u32 {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    channel(color[0])
        | channel(color[1]) << 8
        | channel(color[2]) << 16
        | channel(color[3]) << 24
}

/// Parses OBJ source into shapes
///
/// Material libraries are looked up relative to `mtl_dir`; without one, or
/// when the library cannot be read, shapes fall back to a light grey.
pub fn load_obj(data: &[u8], mtl_dir: Option<&Path>) -> Result<WavefrontObj, WavefrontError> {
    let (models, materials) = tobj::load_obj_buf(
        &mut Cursor::new(data),
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |path| match mtl_dir {
            Some(dir) => tobj::load_mtl(dir.join(path)),
            None => Err(tobj::LoadError::OpenFileFailed),
        },
    )?;

    let materials = materials.unwrap_or_else(|error| {
        log::info!("No usable material library ({}), using default colours", error);
        Vec::new()
    });

    let mut shapes = Vec::with_capacity(models.len());
    for model in models {
        let material = model.mesh.material_id.and_then(|id| materials.get(id));

        let color = material
            .map(|mtl| {
                let diffuse = mtl.diffuse.unwrap_or([0.8, 0.8, 0.8]);
                [diffuse[0], diffuse[1], diffuse[2], mtl.dissolve.unwrap_or(1.0)]
            })
            .unwrap_or(DEFAULT_COLOR);

        let texture = material
            .and_then(|mtl| mtl.diffuse_texture.clone())
            .filter(|name| !name.is_empty());

        shapes.push(WavefrontShape {
            mesh: convert_mesh(&model.mesh)?,
            name: model.name,
            color,
            texture,
        });
    }

    log::debug!("Loaded {} wavefront shapes", shapes.len());
    Ok(WavefrontObj { shapes })
}

fn convert_mesh(mesh: &tobj::Mesh) -> Result<WavefrontMesh, WavefrontError> {
    if mesh.positions.len() % 3 != 0 {
        return Err(WavefrontError::MeshMalformed);
    }

    let count = mesh.positions.len() / 3;
    if count > u16::MAX as usize + 1 {
        return Err(WavefrontError::FacesOutOfRange);
    }

    let mut indices = Vec::with_capacity(mesh.indices.len());
    for &index in &mesh.indices {
        if index as usize >= count {
            return Err(WavefrontError::MeshMalformed);
        }
        indices.push(index as u16);
    }

    let normals = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals.clone()
    } else {
        calculate_normals(&mesh.positions, &mesh.indices)
    };
    let has_uvs = mesh.texcoords.len() == count * 2;

    let vertices = (0..count)
        .map(|i| {
            let uv = if has_uvs {
                // OBJ puts v = 0 at the bottom
                [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            };
            Vertex::new(
                [
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ],
                [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]],
                uv,
            )
        })
        .collect();

    Ok(WavefrontMesh { vertices, indices })
}

/// Area weighted vertex normals for meshes that come without any
fn calculate_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let position = |i: u32| {
        let i = i as usize * 3;
        Vector3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    let mut accumulated = vec![Vector3::zero(); positions.len() / 3];
    for triangle in indices.chunks_exact(3) {
        let (a, b, c) = (position(triangle[0]), position(triangle[1]), position(triangle[2]));
        let face = (b - a).cross(c - a);
        for &index in triangle {
            accumulated[index as usize] += face;
        }
    }

    accumulated
        .into_iter()
        .flat_map(|normal: Vector3<f32>| {
            let normal = if normal.magnitude2() > 0.0 {
                normal.normalize()
            } else {
                Vector3::unit_y()
            };
            [normal.x, normal.y, normal.z]
        })
        .collect()
}

/// Builds one mesh, one atlas material and one model out of all shapes
///
/// Nothing stays registered in `pass` when an error is returned.
pub fn make_model(
    pass: &mut GeometryPass,
    device: &mut dyn RenderDevice,
    model: &WavefrontModel,
    atlas_size: u32,
) -> Result<ModelId, WavefrontError> {
    if model.shapes.is_empty() {
        return Err(WavefrontError::InvalidObject);
    }

    let mut atlas = TextureAtlas::new(atlas_size);
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices: Vec<u16> = Vec::new();

    for shape in model.shapes {
        let mesh = shape.mesh;
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(WavefrontError::MeshMalformed);
        }

        let image = shape.diffuse;
        if image.width == 0
            || image.height == 0
            || image.pixels.len() != (image.width * image.height) as usize
        {
            return Err(WavefrontError::MeshMalformed);
        }

        let tex = atlas
            .push_pixels(&image.pixels, image.width, image.height)
            .ok_or(WavefrontError::AtlasOutOfSize)?;
        let (begin, end) = atlas.coords(tex).ok_or(WavefrontError::AtlasOutOfSize)?;

        let base = vertices.len();
        if base + mesh.vertices.len() > u16::MAX as usize + 1 {
            return Err(WavefrontError::FacesOutOfRange);
        }

        vertices.extend(mesh.vertices.iter().map(|vertex| {
            let u = vertex.uv[0].clamp(0.0, 1.0);
            let v = vertex.uv[1].clamp(0.0, 1.0);
            Vertex {
                uv: [
                    begin[0] + u * (end[0] - begin[0]),
                    begin[1] + v * (end[1] - begin[1]),
                ],
                ..*vertex
            }
        }));

        for &index in &mesh.indices {
            if index as usize >= mesh.vertices.len() {
                return Err(WavefrontError::MeshMalformed);
            }
            indices.push((base + index as usize) as u16);
        }
    }

    let mesh = pass.make_mesh(
        device,
        &MeshDesc {
            vertices: &vertices,
            indices: &indices,
            label: model.label,
        },
    );
    if mesh.is_invalid() {
        return Err(WavefrontError::InvalidObject);
    }

    let material = pass.make_material(
        device,
        &MaterialDesc {
            width: atlas.width(),
            height: atlas.width(),
            pixels: atlas.pixels(),
            ambient_spec: [1.0, 1.0, 1.0, 0.5],
            label: model.label,
        },
    );
    if material.is_invalid() {
        pass.destroy_mesh(device, mesh);
        return Err(WavefrontError::InvalidObject);
    }

    let handle = pass.create_model(
        device,
        &ModelDesc {
            mesh,
            material,
            label: model.label,
        },
    );
    if handle.is_invalid() {
        pass.destroy_mesh(device, mesh);
        pass.destroy_material(device, material);
        return Err(WavefrontError::InvalidObject);
    }

    log::info!(
        "Built model '{}' from {} shapes ({} vertices, {} indices)",
        model.label,
        model.shapes.len(),
        vertices.len(),
        indices.len()
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::HeadlessDevice;

    const TWO_TRIANGLES: &str = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
o second
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
";

    #[test]
    fn test_load_two_shapes() {
        let obj = load_obj(TWO_TRIANGLES.as_bytes(), None).unwrap();
        assert_eq!(obj.shapes.len(), 2);
        assert_eq!(obj.shapes[0].name, "first");
        assert_eq!(obj.shapes[0].mesh.vertices.len(), 3);
        assert_eq!(obj.shapes[0].mesh.indices.len(), 3);
        assert_eq!(obj.shapes[1].color, DEFAULT_COLOR);
        assert!(obj.shapes[1].texture.is_none());

        // generated normal of a triangle in the z = 1 plane
        let normal = obj.shapes[1].mesh.vertices[0].normal;
        assert!((normal[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_make_model_packs_shapes() {
        let obj = load_obj(TWO_TRIANGLES.as_bytes(), None).unwrap();
        let images: Vec<_> = obj
            .shapes
            .iter()
            .map(|shape| WavefrontImage::solid(shape.color, 4))
            .collect();
        let shapes: Vec<_> = obj
            .shapes
            .iter()
            .zip(&images)
            .map(|(shape, image)| ModelShape {
                mesh: &shape.mesh,
                diffuse: image,
            })
            .collect();

        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let model = make_model(
            &mut pass,
            &mut device,
            &WavefrontModel {
                shapes: &shapes,
                label: "triangles",
            },
            8,
        )
        .unwrap();

        let entry = pass.model(model).unwrap();
        assert_eq!(pass.mesh(entry.mesh).unwrap().num_elements, 6);
        assert_eq!(pass.material(entry.material).unwrap().width, 8);

        let vb = device.buffer(pass.mesh(entry.mesh).unwrap().vertex_buffer).unwrap();
        let second: Vertex = bytemuck::pod_read_unaligned(&vb.bytes[32 * 3..32 * 4]);
        // second shape landed right of the first 4x4 block
        assert_eq!(second.uv, [0.5, 0.0]);
    }

    #[test]
    fn test_atlas_too_small() {
        let mesh = load_obj(TWO_TRIANGLES.as_bytes(), None).unwrap().shapes[0].mesh.clone();
        let image = WavefrontImage::solid([1.0; 4], 4);
        let shapes = [ModelShape {
            mesh: &mesh,
            diffuse: &image,
        }];

        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let result = make_model(
            &mut pass,
            &mut device,
            &WavefrontModel {
                shapes: &shapes,
                label: "big",
            },
            2,
        );
        assert_eq!(result, Err(WavefrontError::AtlasOutOfSize));
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_no_shapes_is_invalid() {
        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let result = make_model(
            &mut pass,
            &mut device,
            &WavefrontModel {
                shapes: &[],
                label: "empty",
            },
            16,
        );
        assert_eq!(result, Err(WavefrontError::InvalidObject));
    }

    #[test]
    fn test_load_error_mapping() {
        assert_eq!(
            WavefrontError::from(tobj::LoadError::FaceVertexOutOfBounds),
            WavefrontError::FacesOutOfRange
        );
        assert_eq!(
            WavefrontError::from(tobj::LoadError::InvalidObjectName),
            WavefrontError::InvalidObject
        );
        assert_eq!(
            WavefrontError::from(tobj::LoadError::PositionParseError),
            WavefrontError::MeshMalformed
        );
    }

    #[test]
    fn test_pack_rgba() {
        assert_eq!(pack_rgba([1.0, 0.0, 0.0, 1.0]), 0xFF0000FF);
        assert_eq!(pack_rgba([0.0, 0.0, 1.0, 0.0]), 0x00FF0000);
    }

    fn flat_mesh(vertex_count: usize) -> WavefrontMesh {
        WavefrontMesh {
            vertices: vec![Vertex::default(); vertex_count],
            indices: vec![0, 1, 2],
        }
    }

    fn build(
        pass: &mut GeometryPass,
        device: &mut HeadlessDevice,
        meshes: &[WavefrontMesh],
    ) -> Result<ModelId, WavefrontError> {
        let image = WavefrontImage::solid([1.0; 4], 1);
        let shapes: Vec<_> = meshes
            .iter()
            .map(|mesh| ModelShape {
                mesh,
                diffuse: &image,
            })
            .collect();
        make_model(
            pass,
            device,
            &WavefrontModel {
                shapes: &shapes,
                label: "wide",
            },
            8,
        )
    }

    #[test]
    fn test_merged_vertices_beyond_u16_range() {
        let meshes = [flat_mesh(40_000), flat_mesh(40_000)];

        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let result = build(&mut pass, &mut device, &meshes);
        assert_eq!(result, Err(WavefrontError::FacesOutOfRange));
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_images(), 0);
    }

    #[test]
    fn test_merged_vertices_fill_u16_range() {
        let meshes = [flat_mesh(32_768), flat_mesh(32_768)];

        let mut device = HeadlessDevice::new();
        let mut pass = GeometryPass::new();
        let model = build(&mut pass, &mut device, &meshes).unwrap();
        let mesh = pass.model(model).unwrap().mesh;
        assert_eq!(pass.mesh(mesh).unwrap().num_elements, 6);
    }

    #[test]
    fn test_single_shape_beyond_u16_range() {
        let mesh = tobj::Mesh {
            positions: vec![0.0; 3 * (u16::MAX as usize + 2)],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        assert_eq!(convert_mesh(&mesh).unwrap_err(), WavefrontError::FacesOutOfRange);

        let mesh = tobj::Mesh {
            positions: vec![0.0; 3 * (u16::MAX as usize + 1)],
            indices: vec![0, 1, u16::MAX as u32],
            ..Default::default()
        };
        let converted = convert_mesh(&mesh).unwrap();
        assert_eq!(converted.vertices.len(), u16::MAX as usize + 1);
        assert_eq!(converted.indices, vec![0, 1, u16::MAX]);
    }
}

//! [`RenderDevice`] backed by wgpu
//!
//! Buffers and images are kept in id keyed maps; the renderer looks them up
//! again when it replays the draw table. Every image gets its own bind group
//! against the material layout (texture at binding 0, sampler at binding 1).

use std::collections::HashMap;
use std::sync::Arc;

use crate::gfx::device::{BufferDesc, BufferId, BufferUsage, ImageDesc, ImageId, RenderDevice};

use super::texture_resource::ImageTexture;

pub struct GpuImage {
    pub texture: ImageTexture,
    pub bind_group: wgpu::BindGroup,
}

/// Bind group layout shared by every material image
pub fn material_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Material Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    material_layout: wgpu::BindGroupLayout,
    next_id: u32,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    images: HashMap<ImageId, GpuImage>,
}

impl WgpuDevice {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        material_layout: wgpu::BindGroupLayout,
    ) -> Self {
        Self {
            device,
            queue,
            material_layout,
            next_id: 0,
            buffers: HashMap::new(),
            images: HashMap::new(),
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn buffer(&self, buffer: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(&buffer)
    }

    pub fn image(&self, image: ImageId) -> Option<&GpuImage> {
        self.images.get(&image)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }
}

impl RenderDevice for WgpuDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId {
        let usage = match desc.usage {
            BufferUsage::Vertex | BufferUsage::Instance => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let size = wgpu::util::align_to(desc.size.max(1) as u64, wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage,
            mapped_at_creation: desc.contents.is_some(),
        });

        if let Some(contents) = desc.contents {
            buffer.slice(..).get_mapped_range_mut()[..contents.len()].copy_from_slice(contents);
            buffer.unmap();
        }

        let id = BufferId(self.next_id());
        self.buffers.insert(id, buffer);
        log::debug!("Created buffer '{}' ({} bytes)", desc.label, size);
        id
    }

    fn update_buffer(&mut self, buffer: BufferId, bytes: &[u8]) {
        let Some(target) = self.buffers.get(&buffer) else {
            log::warn!("Update of unknown buffer {:?}", buffer);
            return;
        };

        if bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(target, 0, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(
                wgpu::util::align_to(bytes.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize,
                0,
            );
            self.queue.write_buffer(target, 0, &padded);
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn create_image(&mut self, desc: &ImageDesc) -> ImageId {
        let texture = ImageTexture::from_rgba8(
            &self.device,
            &self.queue,
            desc.pixels,
            desc.width,
            desc.height,
            desc.label,
        );

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(desc.label),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        });

        let id = ImageId(self.next_id());
        self.images.insert(
            id,
            GpuImage {
                texture,
                bind_group,
            },
        );
        log::debug!("Created image '{}' ({}x{})", desc.label, desc.width, desc.height);
        id
    }

    fn destroy_image(&mut self, image: ImageId) {
        if let Some(image) = self.images.remove(&image) {
            image.texture.texture.destroy();
        }
    }
}

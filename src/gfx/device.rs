//! GPU resource callbacks consumed by the registries
//!
//! The geometry pass never talks to wgpu directly. It creates, updates and
//! destroys buffers and images through [`RenderDevice`] and only stores the ids
//! it gets back. [`WgpuDevice`](crate::gfx::rendering::WgpuDevice) is the real
//! implementation; [`HeadlessDevice`] records every call in memory and is what
//! the tests run against.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    /// Per-instance vertex data, rewritten every frame
    Instance,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub usage: BufferUsage,
    /// Size in bytes
    pub size: usize,
    /// Initial contents; `None` leaves the buffer zeroed
    pub contents: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Rgba8,
}

impl ImageFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            ImageFormat::Rgba8 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub pixels: &'a [u8],
}

/// Resource creation callback set
pub trait RenderDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId;

    /// Overwrites the start of `buffer` with `bytes`
    fn update_buffer(&mut self, buffer: BufferId, bytes: &[u8]);

    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_image(&mut self, desc: &ImageDesc) -> ImageId;

    fn destroy_image(&mut self, image: ImageId);
}

#[derive(Debug, Clone)]
pub struct RecordedBuffer {
    pub label: String,
    pub usage: BufferUsage,
    pub bytes: Vec<u8>,
    pub updates: usize,
}

#[derive(Debug, Clone)]
pub struct RecordedImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// In-memory device that keeps the bytes of every live resource
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_id: u32,
    buffers: HashMap<BufferId, RecordedBuffer>,
    images: HashMap<ImageId, RecordedImage>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn buffer(&self, buffer: BufferId) -> Option<&RecordedBuffer> {
        self.buffers.get(&buffer)
    }

    pub fn image(&self, image: ImageId) -> Option<&RecordedImage> {
        self.images.get(&image)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId {
        let id = BufferId(self.next_id());

        let mut bytes = vec![0; desc.size];
        if let Some(contents) = desc.contents {
            assert!(contents.len() <= desc.size, "buffer contents exceed its size");
            bytes[..contents.len()].copy_from_slice(contents);
        }

        self.buffers.insert(
            id,
            RecordedBuffer {
                label: desc.label.to_owned(),
                usage: desc.usage,
                bytes,
                updates: 0,
            },
        );
        id
    }

    fn update_buffer(&mut self, buffer: BufferId, bytes: &[u8]) {
        let Some(recorded) = self.buffers.get_mut(&buffer) else {
            log::warn!("update of unknown buffer {:?}", buffer);
            return;
        };

        assert!(bytes.len() <= recorded.bytes.len(), "buffer update out of range");
        recorded.bytes[..bytes.len()].copy_from_slice(bytes);
        recorded.updates += 1;
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn create_image(&mut self, desc: &ImageDesc) -> ImageId {
        let id = ImageId(self.next_id());
        self.images.insert(
            id,
            RecordedImage {
                label: desc.label.to_owned(),
                width: desc.width,
                height: desc.height,
                pixels: desc.pixels.to_vec(),
            },
        );
        id
    }

    fn destroy_image(&mut self, image: ImageId) {
        self.images.remove(&image);
    }
}

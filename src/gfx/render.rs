//! Draw calls recorded by the geometry pass and replayed by the renderer

use super::device::{BufferId, ImageId};

/// Draw table size; one draw call per model slot
pub const RENDER_PASS_MAX_DRAW_CALLS: usize = 16;

/// Resources bound for one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bindings {
    pub index_buffer: BufferId,
    /// Slot 0 holds mesh vertices, slot 1 per-instance data
    pub vertex_buffers: [BufferId; 2],
    pub fs_images: [ImageId; 1],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub indices_offset: u32,
    pub num_indices: u32,
    pub num_instances: u32,
    pub bindings: Bindings,
}

/// Fixed table of draw calls, indexed by model slot
#[derive(Debug)]
pub struct RenderPass {
    draws: Vec<Option<DrawCall>>,
}

impl Default for RenderPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass {
    pub fn new() -> Self {
        Self {
            draws: vec![None; RENDER_PASS_MAX_DRAW_CALLS],
        }
    }

    pub fn set(&mut self, slot: usize, draw: DrawCall) {
        assert!(slot < self.draws.len(), "draw call slot out of range");
        self.draws[slot] = Some(draw);
    }

    pub fn clear(&mut self, slot: usize) {
        if let Some(draw) = self.draws.get_mut(slot) {
            *draw = None;
        }
    }

    pub fn get(&self, slot: usize) -> Option<&DrawCall> {
        self.draws.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut DrawCall> {
        self.draws.get_mut(slot)?.as_mut()
    }

    /// Draw calls that would produce geometry this frame
    pub fn active(&self) -> impl Iterator<Item = &DrawCall> {
        self.draws
            .iter()
            .flatten()
            .filter(|draw| draw.num_instances > 0 && draw.num_indices > 0)
    }

    /// Number of recorded draw calls, active or not
    pub fn len(&self) -> usize {
        self.draws.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

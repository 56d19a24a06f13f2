//! Binary tree rectangle packer backing a single square texture
//!
//! Every node of the tree owns a rectangle of the atlas. Leaves are either free,
//! or hold exactly one inserted texture. Inserting a region descends depth first
//! (child 0 before child 1); a free leaf that is larger than the request is
//! split along the axis with more slack and the search continues in the first
//! half, which then matches the request in at least one dimension.
//!
//! Pixels are staged in a CPU side RGBA8 image that callers upload once packing
//! is done (see [`crate::wavefront::make_model`]).

use crate::containers::ChainedHashMap;

/// Identifier of a packed region; ids start at 1 and grow by one per insert
pub type TexId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone)]
struct AtlasNode {
    kids: Option<[usize; 2]>,
    rect: AtlasRect,
    // 0 while the leaf is free
    id: TexId,
}

impl AtlasNode {
    fn leaf(rect: AtlasRect) -> Self {
        Self {
            kids: None,
            rect,
            id: 0,
        }
    }
}

fn hash_tex_id(id: &TexId) -> u64 {
    *id as u64
}

fn compare_tex_id(a: &TexId, b: &TexId) -> i64 {
    *a as i64 - *b as i64
}

pub struct TextureAtlas {
    nodes: Vec<AtlasNode>,
    textures: ChainedHashMap<TexId, usize>,
    ntextures: u32,
    width: u32,
    pixels: Vec<u32>,
}

impl TextureAtlas {
    /// Creates an empty `width` x `width` atlas
    pub fn new(width: u32) -> Self {
        assert!(width > 0, "atlas width must be positive");

        let root = AtlasNode::leaf(AtlasRect {
            x: 0,
            y: 0,
            w: width,
            h: width,
        });

        Self {
            nodes: vec![root],
            textures: ChainedHashMap::new(hash_tex_id, compare_tex_id, 11),
            ntextures: 0,
            width,
            pixels: vec![0; (width * width) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of regions packed so far
    pub fn len(&self) -> u32 {
        self.ntextures
    }

    pub fn is_empty(&self) -> bool {
        self.ntextures == 0
    }

    /// Staged RGBA8 image, one `u32` per texel, row-major
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Reserves a `w` x `h` region without writing any pixels
    ///
    /// Returns `None` when the atlas has no free leaf that can hold the region.
    pub fn insert(&mut self, w: u32, h: u32) -> Option<TexId> {
        assert!(w > 0 && h > 0, "atlas regions must not be empty");

        let id = self.ntextures + 1;
        let node = self.insert_at(0, w, h, id)?;

        self.textures.put(id, node);
        self.ntextures += 1;
        Some(id)
    }

    /// Packs a `w` x `h` block of RGBA8 texels and copies it into the staged image
    pub fn push_pixels(&mut self, pixels: &[u32], w: u32, h: u32) -> Option<TexId> {
        assert_eq!(
            pixels.len(),
            (w * h) as usize,
            "pixel block does not match its dimensions"
        );

        let id = self.insert(w, h)?;
        let rect = self.rect(id)?;

        for row in 0..rect.h as usize {
            let src = &pixels[row * w as usize..(row + 1) * w as usize];
            let dst_start = (rect.y as usize + row) * self.width as usize + rect.x as usize;
            self.pixels[dst_start..dst_start + w as usize].copy_from_slice(src);
        }

        Some(id)
    }

    fn insert_at(&mut self, node: usize, w: u32, h: u32, id: TexId) -> Option<usize> {
        if let Some([first, second]) = self.nodes[node].kids {
            return self
                .insert_at(first, w, h, id)
                .or_else(|| self.insert_at(second, w, h, id));
        }

        let rect = self.nodes[node].rect;
        let in_use = self.nodes[node].id != 0;

        if rect.w == w && rect.h == h && !in_use {
            self.nodes[node].id = id;
            return Some(node);
        }

        if rect.w < w || rect.h < h || in_use {
            return None;
        }

        let dw = rect.w - w;
        let dh = rect.h - h;
        let (first, second) = if dh < dw {
            (
                AtlasRect { w, ..rect },
                AtlasRect {
                    x: rect.x + w,
                    w: rect.w - w,
                    ..rect
                },
            )
        } else {
            (
                AtlasRect { h, ..rect },
                AtlasRect {
                    y: rect.y + h,
                    h: rect.h - h,
                    ..rect
                },
            )
        };

        let first_index = self.nodes.len();
        self.nodes.push(AtlasNode::leaf(first));
        self.nodes.push(AtlasNode::leaf(second));
        self.nodes[node].kids = Some([first_index, first_index + 1]);

        self.insert_at(first_index, w, h, id)
    }

    pub fn contains(&self, id: TexId) -> bool {
        self.textures.contains_key(&id)
    }

    /// Pixel rectangle of a packed region
    pub fn rect(&self, id: TexId) -> Option<AtlasRect> {
        self.textures.get(&id).map(|&node| self.nodes[node].rect)
    }

    /// Normalized `[0, 1]` texture coordinates `(begin, end)` of a packed region
    pub fn coords(&self, id: TexId) -> Option<([f32; 2], [f32; 2])> {
        let rect = self.rect(id)?;
        let size = self.width as f32;

        let begin = [rect.x as f32 / size, rect.y as f32 / size];
        let end = [
            begin[0] + rect.w as f32 / size,
            begin[1] + rect.h as f32 / size,
        ];
        Some((begin, end))
    }

    /// Forgets every packed region and clears the staged image
    pub fn reset(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0] = AtlasNode::leaf(AtlasRect {
            x: 0,
            y: 0,
            w: self.width,
            h: self.width,
        });
        self.textures.clear();
        self.ntextures = 0;
        self.pixels.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_size_region_only_once() {
        let mut atlas = TextureAtlas::new(128);
        assert_eq!(atlas.insert(128, 128), Some(1));
        assert_eq!(atlas.insert(128, 128), None);
        assert_eq!(atlas.insert(1, 1), None);

        atlas.reset();
        assert!(atlas.is_empty());
        assert_eq!(atlas.insert(128, 128), Some(1));
    }

    #[test]
    fn test_two_halves_tile_the_atlas() {
        let mut atlas = TextureAtlas::new(64);
        let left = atlas.insert(32, 64).unwrap();
        let right = atlas.insert(32, 64).unwrap();
        assert_eq!((left, right), (1, 2));
        assert_eq!(atlas.insert(1, 1), None);

        assert_eq!(atlas.coords(left), Some(([0.0, 0.0], [0.5, 1.0])));
        assert_eq!(atlas.coords(right), Some(([0.5, 0.0], [1.0, 1.0])));
    }

    #[test]
    fn test_split_along_larger_slack() {
        let mut atlas = TextureAtlas::new(64);
        // height slack (48) exceeds width slack (0): split rows
        let id = atlas.insert(64, 16).unwrap();
        assert_eq!(
            atlas.rect(id),
            Some(AtlasRect {
                x: 0,
                y: 0,
                w: 64,
                h: 16
            })
        );

        let next = atlas.insert(16, 16).unwrap();
        assert_eq!(atlas.rect(next).map(|r| (r.x, r.y)), Some((0, 16)));
    }

    #[test]
    fn test_failed_insert_keeps_ids_dense() {
        let mut atlas = TextureAtlas::new(16);
        assert_eq!(atlas.insert(8, 8), Some(1));
        assert_eq!(atlas.insert(32, 4), None);
        assert_eq!(atlas.insert(8, 8), Some(2));
        assert_eq!(atlas.len(), 2);
        assert!(atlas.contains(2));
        assert!(!atlas.contains(3));
        assert_eq!(atlas.coords(3), None);
    }

    #[test]
    fn test_push_pixels_lands_in_region() {
        let mut atlas = TextureAtlas::new(4);
        atlas.push_pixels(&[1; 8], 2, 4).unwrap();
        let id = atlas.push_pixels(&[7, 8, 9, 10], 2, 2).unwrap();

        let rect = atlas.rect(id).unwrap();
        assert_eq!((rect.x, rect.y), (2, 0));

        let pixels = atlas.pixels();
        assert_eq!(&pixels[0..4], &[1, 1, 7, 8]);
        assert_eq!(&pixels[4..8], &[1, 1, 9, 10]);
        assert_eq!(&pixels[8..12], &[1, 1, 0, 0]);
    }
}

//! Bip buffer: a byte ring that always hands out contiguous reads
//!
//! The storage is split into two regions. Region A is the readable range
//! `[a_start, a_end)`. Region B, `[0, b_end)`, is only written once the gap in
//! front of A is larger than the tail space behind it; from then on writes go to
//! B until A drains, at which point B becomes the new A. Readers therefore never
//! see a range that wraps around the end of the storage, and nothing is copied.
//!
//! The cursors live next to the storage rather than inside it, so the whole
//! requested capacity is usable.

pub struct BipBuffer {
    data: Box<[u8]>,
    a_start: usize,
    a_end: usize,
    b_end: usize,
    b_inuse: bool,
}

impl BipBuffer {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "bip buffer needs a non-zero capacity");

        Self {
            data: vec![0; capacity].into_boxed_slice(),
            a_start: 0,
            a_end: 0,
            b_end: 0,
            b_inuse: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes available to the next push
    pub fn unused(&self) -> usize {
        if self.b_inuse {
            self.a_start - self.b_end
        } else {
            self.data.len() - self.a_end
        }
    }

    /// Bytes pushed but not yet popped, across both regions
    pub fn used(&self) -> usize {
        (self.a_end - self.a_start) + self.b_end
    }

    pub fn is_empty(&self) -> bool {
        self.a_start == self.a_end
    }

    /// Appends `bytes` and returns how many were written
    ///
    /// Writes are all-or-nothing: if `bytes` does not fit into [`unused`] the
    /// buffer is left untouched and `0` is returned.
    ///
    /// [`unused`]: BipBuffer::unused
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let len = bytes.len();
        if len == 0 || self.unused() < len {
            return 0;
        }

        if self.b_inuse {
            self.data[self.b_end..self.b_end + len].copy_from_slice(bytes);
            self.b_end += len;
        } else {
            self.data[self.a_end..self.a_end + len].copy_from_slice(bytes);
            self.a_end += len;
        }

        self.check_for_switch_to_b();
        len
    }

    /// Returns the first `len` readable bytes without consuming them
    pub fn peek(&self, len: usize) -> Option<&[u8]> {
        if self.is_empty() || len > self.a_end - self.a_start {
            return None;
        }
        Some(&self.data[self.a_start..self.a_start + len])
    }

    /// Consumes the first `len` readable bytes and returns them
    ///
    /// The returned slice stays valid until the next push.
    pub fn pop(&mut self, len: usize) -> Option<&[u8]> {
        if self.is_empty() || len > self.a_end - self.a_start {
            return None;
        }

        let start = self.a_start;
        self.a_start += len;

        if self.a_start == self.a_end {
            if self.b_inuse {
                // B becomes the readable region
                self.a_start = 0;
                self.a_end = self.b_end;
                self.b_end = 0;
                self.b_inuse = false;
            } else {
                self.a_start = 0;
                self.a_end = 0;
            }
        }

        self.check_for_switch_to_b();
        Some(&self.data[start..start + len])
    }

    /// Drops every pending byte
    pub fn clear(&mut self) {
        self.a_start = 0;
        self.a_end = 0;
        self.b_end = 0;
        self.b_inuse = false;
    }

    fn check_for_switch_to_b(&mut self) {
        if self.data.len() - self.a_end < self.a_start - self.b_end {
            self.b_inuse = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::VecDeque;

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
    }

    #[test]
    fn test_push_then_pop_every_size() {
        let mut buffer = BipBuffer::new(64);
        for size in 1..=buffer.capacity() {
            let bytes = pattern(size, size as u8);
            assert_eq!(buffer.push(&bytes), size);
            assert_eq!(buffer.used(), size);
            assert_eq!(buffer.pop(size), Some(bytes.as_slice()));
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_push_past_unused_is_rejected() {
        let mut buffer = BipBuffer::new(16);
        assert_eq!(buffer.push(&pattern(12, 0)), 12);
        assert_eq!(buffer.unused(), 4);

        let rejected = pattern(6, 100);
        assert_eq!(buffer.push(&rejected), 0);
        assert_eq!(buffer.used(), 12);
        assert_eq!(buffer.peek(12), Some(pattern(12, 0).as_slice()));

        // free everything, the same push now fits
        assert!(buffer.pop(12).is_some());
        assert_eq!(buffer.push(&rejected), 6);
        assert_eq!(buffer.pop(6), Some(rejected.as_slice()));
    }

    #[test]
    fn test_peek_and_pop_bounds() {
        let mut buffer = BipBuffer::new(8);
        assert_eq!(buffer.peek(1), None);
        assert_eq!(buffer.pop(1), None);

        buffer.push(&[1, 2, 3]);
        assert_eq!(buffer.peek(4), None);
        assert_eq!(buffer.pop(4), None);
        assert_eq!(buffer.peek(2), Some([1u8, 2].as_slice()));
        assert_eq!(buffer.used(), 3);
    }

    #[test]
    fn test_switch_to_b_and_fold() {
        let mut buffer = BipBuffer::new(16);
        buffer.push(&pattern(10, 0));
        buffer.pop(8);

        // tail (6) is now smaller than the gap in front of A (8)
        assert_eq!(buffer.unused(), 8);
        let wrapped = pattern(8, 50);
        assert_eq!(buffer.push(&wrapped), 8);
        assert_eq!(buffer.used(), 10);
        assert_eq!(buffer.unused(), 0);

        // only A is readable until it drains
        assert_eq!(buffer.peek(10), None);
        assert_eq!(buffer.pop(2), Some([8u8, 9].as_slice()));
        assert_eq!(buffer.peek(8), Some(wrapped.as_slice()));
        assert_eq!(buffer.used(), 8);
    }

    #[test]
    fn test_used_tracks_random_cycles() {
        let mut rng = rand::rng();
        let mut buffer = BipBuffer::new(97);
        let mut pending: VecDeque<Vec<u8>> = VecDeque::new();
        let mut seed = 0u8;

        for _ in 0..5000 {
            if rng.random_bool(0.55) {
                let frame = pattern(rng.random_range(1..24), seed);
                seed = seed.wrapping_add(7);
                if buffer.push(&frame) == frame.len() {
                    pending.push_back(frame);
                }
            } else if let Some(front) = pending.front() {
                // a frame written into B only becomes readable after A drains
                if let Some(bytes) = buffer.pop(front.len()) {
                    assert_eq!(bytes, front.as_slice());
                    pending.pop_front();
                }
            }

            let expected: usize = pending.iter().map(Vec::len).sum();
            assert_eq!(buffer.used(), expected);
        }
    }
}

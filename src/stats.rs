//! # Frame Statistics
//!
//! Keeps the update and render times of the last `max_frames` frames, in
//! seconds, and their averages over that window.
//!
//! ```rust
//! use trellis::stats::Stats;
//!
//! let mut stats = Stats::new(120);
//! stats.tick(0.002, 0.010);
//! assert_eq!(stats.len(), 1);
//! ```

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FrameTiming {
    update: f32,
    render: f32,
}

#[derive(Debug, Clone)]
pub struct Stats {
    frames: VecDeque<FrameTiming>,
    max_frames: usize,
    update_sum: f64,
    render_sum: f64,
}

impl Stats {
    pub fn new(max_frames: usize) -> Self {
        assert!(max_frames > 0, "stats window must hold at least one frame");
        Self {
            frames: VecDeque::with_capacity(max_frames),
            max_frames,
            update_sum: 0.0,
            render_sum: 0.0,
        }
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Records one frame, evicting the oldest once the window is full
    pub fn tick(&mut self, update: f32, render: f32) {
        if self.frames.len() == self.max_frames {
            if let Some(oldest) = self.frames.pop_front() {
                self.update_sum -= oldest.update as f64;
                self.render_sum -= oldest.render as f64;
            }
        }

        self.frames.push_back(FrameTiming { update, render });
        self.update_sum += update as f64;
        self.render_sum += render as f64;
    }

    /// Copies the stored timings oldest first, returns how many were written
    pub fn timings(&self, update_out: &mut [f32], render_out: &mut [f32]) -> usize {
        let count = self.frames.len().min(update_out.len()).min(render_out.len());
        for (i, frame) in self.frames.iter().take(count).enumerate() {
            update_out[i] = frame.update;
            render_out[i] = frame.render;
        }
        count
    }

    pub fn update_times(&self) -> Vec<f32> {
        self.frames.iter().map(|frame| frame.update).collect()
    }

    pub fn render_times(&self) -> Vec<f32> {
        self.frames.iter().map(|frame| frame.render).collect()
    }

    pub fn average_update(&self) -> f32 {
        self.average(self.update_sum)
    }

    pub fn average_render(&self) -> f32 {
        self.average(self.render_sum)
    }

    pub fn average_frame(&self) -> f32 {
        self.average(self.update_sum + self.render_sum)
    }

    fn average(&self, sum: f64) -> f32 {
        if self.frames.is_empty() {
            0.0
        } else {
            (sum / self.frames.len() as f64) as f32
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.update_sum = 0.0;
        self.render_sum = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = Stats::new(4);
        assert!(stats.is_empty());
        assert_eq!(stats.average_frame(), 0.0);
        let mut u = [0.0; 4];
        let mut r = [0.0; 4];
        assert_eq!(stats.timings(&mut u, &mut r), 0);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut stats = Stats::new(3);
        for i in 1..=5 {
            stats.tick(i as f32, 10.0 * i as f32);
        }

        let mut u = [0.0; 8];
        let mut r = [0.0; 8];
        assert_eq!(stats.timings(&mut u, &mut r), 3);
        assert_eq!(&u[..3], &[3.0, 4.0, 5.0]);
        assert_eq!(&r[..3], &[30.0, 40.0, 50.0]);

        assert_eq!(stats.average_update(), 4.0);
        assert_eq!(stats.average_render(), 40.0);
        assert_eq!(stats.average_frame(), 44.0);
    }

    #[test]
    fn test_timings_respect_output_length() {
        let mut stats = Stats::new(8);
        for i in 0..6 {
            stats.tick(i as f32, 0.0);
        }
        let mut u = [0.0; 2];
        let mut r = [0.0; 4];
        assert_eq!(stats.timings(&mut u, &mut r), 2);
        assert_eq!(u, [0.0, 1.0]);
    }

    #[test]
    fn test_clear() {
        let mut stats = Stats::new(2);
        stats.tick(1.0, 1.0);
        stats.clear();
        assert!(stats.is_empty());
        assert_eq!(stats.average_update(), 0.0);
    }
}

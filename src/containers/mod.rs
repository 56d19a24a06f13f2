//! General purpose containers used by the viewer core
//!
//! - [`hashmap::ChainedHashMap`] - hash map with caller supplied hash/compare
//!   functions and a removal tolerant cursor
//! - [`bip_buffer::BipBuffer`] - two region byte ring with contiguous reads

pub mod bip_buffer;
pub mod hashmap;

pub use bip_buffer::BipBuffer;
pub use hashmap::ChainedHashMap;

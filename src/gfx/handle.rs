//! Typed, generation checked handles into fixed-capacity slot pools
//!
//! A handle is a plain index (`-1` meaning "no reference") plus the generation
//! of the slot at the time the handle was issued. Pools bump a slot's
//! generation whenever its occupant is removed, so a handle that outlived its
//! target no longer resolves even after the slot has been reused.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Maximum number of characters kept in a debug label
pub const TRACE_MAX_LEN: usize = 31;

pub struct Handle<T> {
    id: i32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Sentinel meaning "no reference"
    pub const INVALID: Self = Self {
        id: -1,
        generation: 0,
        _marker: PhantomData,
    };

    pub(crate) const fn new(index: usize, generation: u32) -> Self {
        Self {
            id: index as i32,
            generation,
            _marker: PhantomData,
        }
    }

    /// Raw slot index, `-1` for [`Handle::INVALID`]
    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Slot index, `None` for the sentinel
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.id).ok()
    }

    /// True when `0 <= id < capacity`
    ///
    /// This is the range check only; whether the slot still holds the same
    /// occupant is answered by the owning pool.
    pub fn is_valid(&self, capacity: usize) -> bool {
        self.index().is_some_and(|index| index < capacity)
    }

    pub fn is_invalid(&self) -> bool {
        self.id < 0
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Handle(INVALID)")
        } else {
            write!(f, "Handle({}v{})", self.id, self.generation)
        }
    }
}

/// Short debug label attached to pooled resources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace(String);

impl Trace {
    pub fn new(label: &str) -> Self {
        Self(label.chars().take(TRACE_MAX_LEN).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Trace {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing;

    #[test]
    fn test_invalid_sentinel() {
        let handle = Handle::<Thing>::INVALID;
        assert_eq!(handle.id(), -1);
        assert_eq!(handle.index(), None);
        assert!(!handle.is_valid(16));
        assert_eq!(Handle::<Thing>::default(), handle);
    }

    #[test]
    fn test_range_check() {
        let handle = Handle::<Thing>::new(3, 0);
        assert!(handle.is_valid(4));
        assert!(!handle.is_valid(3));
        assert_ne!(handle, Handle::new(3, 1));
    }

    #[test]
    fn test_trace_truncates() {
        let trace = Trace::new("a label that is clearly longer than thirty one characters");
        assert_eq!(trace.as_str().chars().count(), TRACE_MAX_LEN);
        assert_eq!(Trace::from("box").to_string(), "box");
    }
}

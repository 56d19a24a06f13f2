//! Fixed-capacity slot storage behind every registry
//!
//! Slots never move and the pool never grows. An empty slot is `None`; making
//! an entry takes the first empty slot found by a linear scan, and a full pool
//! answers with [`Handle::INVALID`].

use super::handle::Handle;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
}

impl<T> SlotPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|_| Slot {
                    generation: 0,
                    value: None,
                })
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.value.is_none())
    }

    /// Stores `value` in the first free slot
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.insert_with(|_| value)
    }

    /// Builds the value only once a free slot is known
    ///
    /// `make` receives the handle the value will live under, which lets it
    /// create resources that are labelled or keyed by it.
    pub fn insert_with(&mut self, make: impl FnOnce(Handle<T>) -> T) -> Handle<T> {
        let Some(index) = self.first_free() else {
            return Handle::INVALID;
        };

        let slot = &mut self.slots[index];
        let handle = Handle::new(index, slot.generation);
        slot.value = Some(make(handle));
        handle
    }

    /// Like [`SlotPool::insert_with`] for constructors that can fail
    pub fn try_insert_with<E>(
        &mut self,
        make: impl FnOnce(Handle<T>) -> Result<T, E>,
    ) -> Result<Handle<T>, E> {
        let Some(index) = self.first_free() else {
            return Ok(Handle::INVALID);
        };

        let slot = &mut self.slots[index];
        let handle = Handle::new(index, slot.generation);
        slot.value = Some(make(handle)?);
        Ok(handle)
    }

    fn slot(&self, handle: Handle<T>) -> Option<&Slot<T>> {
        let slot = self.slots.get(handle.index()?)?;
        (slot.generation == handle.generation()).then_some(slot)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slot(handle)?.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// True while `handle` still names the occupant it was issued for
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Empties the slot and hands back its value
    ///
    /// Stale and invalid handles are ignored.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index()?)?;
        if slot.generation != handle.generation() {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(value)
    }

    /// Handle of the current occupant of slot `index`
    pub fn handle_at(&self, index: usize) -> Option<Handle<T>> {
        let slot = self.slots.get(index)?;
        slot.value
            .as_ref()
            .map(|_| Handle::new(index, slot.generation))
    }

    /// Occupied slots in index order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index, slot.generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::new(index, generation), value))
        })
    }

    /// Handles of every occupant matching `predicate`
    pub fn find_all(&self, predicate: impl Fn(&T) -> bool) -> Vec<Handle<T>> {
        self.iter()
            .filter(|(_, value)| predicate(value))
            .map(|(handle, _)| handle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_then_reports_invalid() {
        let mut pool = SlotPool::new(3);
        let handles: Vec<_> = (0..3).map(|i| pool.insert(i)).collect();
        assert_eq!(
            handles.iter().map(|h| h.id()).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(pool.insert(99), Handle::INVALID);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_insert_with_not_called_when_full() {
        let mut pool = SlotPool::new(1);
        pool.insert(1);
        let handle = pool.insert_with(|_| panic!("no free slot, must not build"));
        assert!(handle.is_invalid());
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut pool = SlotPool::new(2);
        let first = pool.insert("first");
        assert_eq!(pool.remove(first), Some("first"));

        let second = pool.insert("second");
        assert_eq!(second.id(), first.id());
        assert_eq!(pool.get(first), None);
        assert_eq!(pool.remove(first), None);
        assert_eq!(pool.get(second), Some(&"second"));
    }

    #[test]
    fn test_first_free_slot_is_reused() {
        let mut pool = SlotPool::new(4);
        let a = pool.insert('a');
        let _b = pool.insert('b');
        pool.remove(a);
        let c = pool.insert('c');
        assert_eq!(c.id(), 0);
        assert_eq!(pool.handle_at(0), Some(c));
        assert_eq!(pool.handle_at(2), None);
    }
}

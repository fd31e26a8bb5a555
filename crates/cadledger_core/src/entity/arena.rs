//! Generational arena backing each entity store.
//!
//! O(1) insertion, release and lookup with use-after-release detection.

struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Slot storage whose keys carry a generation.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Inserts a value and returns its `(index, generation)`.
    pub(crate) fn insert(&mut self, value: T) -> (u32, u32) {
        self.len += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            (index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                value: Some(value),
                generation: 0,
            });
            (index, 0)
        }
    }

    /// Frees a slot, bumping its generation so old keys go stale.
    pub(crate) fn free(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;

        if slot.generation != generation || slot.value.is_none() {
            return None;
        }

        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);
        self.len -= 1;

        slot.value.take()
    }

    /// Gets a reference to a live slot.
    pub(crate) fn get(&self, index: u32, generation: u32) -> Option<&T> {
        let slot = self.slots.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to a live slot.
    pub(crate) fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Returns the number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut arena = Arena::new();
        let (i, g) = arena.insert("a");
        assert_eq!(arena.get(i, g), Some(&"a"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn freed_key_goes_stale_after_reuse() {
        let mut arena = Arena::new();
        let (i, g) = arena.insert(1);
        assert_eq!(arena.free(i, g), Some(1));
        let (j, h) = arena.insert(2);
        assert_eq!(i, j);
        assert_ne!(g, h);
        assert!(arena.get(i, g).is_none());
        assert_eq!(arena.get(j, h), Some(&2));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut arena = Arena::new();
        let (i, g) = arena.insert(1);
        assert!(arena.free(i, g).is_some());
        assert!(arena.free(i, g).is_none());
        assert_eq!(arena.len(), 0);
    }
}

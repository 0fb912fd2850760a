// Host-side arrays indexed by swapchain image or frame slot.
//
// Resizing keeps the allocation when the length is unchanged, so a resize
// that leaves the image count alone never touches the host heap.

use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone)]
pub struct SlotArray<T: Copy + Default> {
    items: Vec<T>,
    reallocations: u32,
}

impl<T: Copy + Default> SlotArray<T> {
    /// Initial allocation; not counted as a reallocation.
    pub fn with_len(len: usize) -> Self {
        Self {
            items: vec![T::default(); len],
            reallocations: 0,
        }
    }

    /// Resize to `len`, resetting every entry. Returns whether storage was
    /// reallocated.
    pub fn ensure_len(&mut self, len: usize) -> bool {
        if self.items.len() == len {
            return false;
        }
        self.items = vec![T::default(); len];
        self.reallocations += 1;
        true
    }

    pub fn clear(&mut self) {
        self.items.fill(T::default());
    }

    pub fn reallocations(&self) -> u32 {
        self.reallocations
    }
}

impl<T: Copy + Default> Default for SlotArray<T> {
    fn default() -> Self {
        Self::with_len(0)
    }
}

impl<T: Copy + Default> Deref for SlotArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T: Copy + Default> DerefMut for SlotArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

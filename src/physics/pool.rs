//! Grow-only object pool for per-frame scratch data.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Index of an object handed out by a [`Pool`].
///
/// Valid until the next [`Pool::free_all`]; after that the slot may be reissued.
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize) -> Self {
        Self {
            index: index as u32,
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index as usize
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
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// Reusable instances of a single type.
///
/// `allocate` hands out the next free instance, doubling the backing store
/// when exhausted. `free_all` only rewinds the cursor: field values survive,
/// so callers overwrite everything they read after allocating.
pub struct Pool<T> {
    items: Vec<T>,
    in_use: usize,
    make: fn() -> T,
}

impl<T> Pool<T> {
    /// Create a pool pre-filled with `capacity` instances built by `make`.
    pub fn new(capacity: usize, make: fn() -> T) -> Self {
        let mut pool = Self {
            items: Vec::new(),
            in_use: 0,
            make,
        };
        pool.grow_to(capacity);
        pool
    }

    fn grow_to(&mut self, capacity: usize) {
        self.items.reserve(capacity.saturating_sub(self.items.len()));
        while self.items.len() < capacity {
            self.items.push((self.make)());
        }
    }

    /// Hand out the next free instance.
    pub fn allocate(&mut self) -> Handle<T> {
        if self.in_use == self.items.len() {
            let capacity = (self.items.len() * 2).max(1);
            self.grow_to(capacity);
        }
        let handle = Handle::new(self.in_use);
        self.in_use += 1;
        handle
    }

    /// Mark every instance free. Nothing is dropped or cleared.
    pub fn free_all(&mut self) {
        self.in_use = 0;
    }

    /// Number of instances handed out since the last `free_all`.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Number of constructed instances.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Debug builds panic on a handle issued before the last `free_all`.
    pub fn get(&self, handle: Handle<T>) -> &T {
        debug_assert!(handle.index() < self.in_use, "stale pool {:?}", handle);
        &self.items[handle.index()]
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> &mut T {
        debug_assert!(handle.index() < self.in_use, "stale pool {:?}", handle);
        &mut self.items[handle.index()]
    }
}

impl<T: Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new(1, T::default)
    }
}

impl<T> Index<Handle<T>> for Pool<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        self.get(handle)
    }
}

impl<T> IndexMut<Handle<T>> for Pool<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        self.get_mut(handle)
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("in_use", &self.in_use)
            .field("capacity", &self.items.len())
            .finish()
    }
}

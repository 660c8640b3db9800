//! Shared element storage and the allocators that hand it out.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Reference-counted flat storage of `f64` elements.
///
/// Cloning a `Buffer` clones the handle, not the data. Elements are stored in
/// [`Cell`]s so several views may read and write the same storage; a buffer is
/// neither `Send` nor `Sync`, which keeps every writer on one thread.
#[derive(Clone)]
pub struct Buffer {
    cells: Rc<[Cell<f64>]>,
}

impl Buffer {
    /// Create a zero-filled buffer of `len` elements.
    pub fn zeros(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| Cell::new(0.0)).collect(),
        }
    }

    /// Create a buffer holding a copy of `values`.
    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            cells: values.iter().map(|&v| Cell::new(v)).collect(),
        }
    }

    /// Number of elements in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The underlying cells, in storage order.
    #[inline]
    pub fn cells(&self) -> &[Cell<f64>] {
        &self.cells
    }

    /// Read the element at `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn load(&self, index: usize) -> f64 {
        self.cells[index].get()
    }

    /// Write the element at `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn store(&self, index: usize, value: f64) {
        self.cells[index].set(value)
    }

    /// Copy the contents out in storage order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.cells.iter().map(Cell::get).collect()
    }

    /// Whether two handles refer to the same storage.
    #[inline]
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Rc::ptr_eq(&self.cells, &other.cells)
    }

    /// Number of live handles to this storage (views and arenas included).
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.cells)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("handles", &self.handle_count())
            .finish()
    }
}

/// Source of fresh buffers.
///
/// Operations that need new storage (allocating a matrix, materializing a
/// transpose) ask an allocator instead of allocating on their own.
pub trait Allocator {
    /// Allocate a zero-filled buffer of `len` elements.
    fn allocate(&self, len: usize) -> Buffer;
}

/// Allocator whose buffers live exactly as long as the views using them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heap;

impl Allocator for Heap {
    #[inline]
    fn allocate(&self, len: usize) -> Buffer {
        Buffer::zeros(len)
    }
}

/// Session allocator that keeps every buffer it hands out alive until the
/// arena itself is dropped.
#[derive(Debug, Default)]
pub struct Arena {
    buffers: RefCell<Vec<Buffer>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers allocated from this arena.
    pub fn buffer_count(&self) -> usize {
        self.buffers.borrow().len()
    }

    /// Total number of elements allocated from this arena.
    pub fn allocated_elements(&self) -> usize {
        self.buffers.borrow().iter().map(Buffer::len).sum()
    }
}

impl Allocator for Arena {
    fn allocate(&self, len: usize) -> Buffer {
        let buffer = Buffer::zeros(len);
        let mut buffers = self.buffers.borrow_mut();
        buffers.push(buffer.clone());
        log::debug!(
            "arena allocated {} elements (buffer #{})",
            len,
            buffers.len()
        );
        buffer
    }
}

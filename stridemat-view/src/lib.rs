//! Strided 2-D matrix views over shared `f64` buffers.
//!
//! A [`MatrixView`] describes a rectangular window into a [`Buffer`] through
//! a shape, a pair of offsets and a pair of strides. Views never own the data
//! they address: any number of views may share one buffer, and the storage is
//! released when the last handle to it goes away.
//!
//! # Core Types
//!
//! - [`Buffer`]: reference-counted flat storage of `f64` cells
//! - [`Allocator`] with [`Heap`] and [`Arena`]: where fresh buffers come from
//! - [`MatrixView`]: shape/offset/stride descriptor over a buffer
//! - [`Trans`], [`Conj`], [`Structure`], [`Uplo`], [`Diag`]: view metadata
//!   consumed by linear-algebra backends
//!
//! # Example
//!
//! ```rust
//! use stridemat_view::{Heap, MatrixView};
//!
//! let m = MatrixView::from_row_major(&Heap, 2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! assert_eq!(m.get(1, 2).unwrap(), 5.0);
//!
//! // Sub-views share the parent's buffer.
//! let right = m.sub_view(0, 1, 2, 2).unwrap();
//! right.set(0, 0, 10.0).unwrap();
//! assert_eq!(m.get(0, 1).unwrap(), 10.0);
//! ```

pub mod buffer;
pub mod metadata;
pub mod view;

pub use buffer::{Allocator, Arena, Buffer, Heap};
pub use metadata::{Conj, Diag, Structure, Trans, Uplo};
pub use view::{Layout, MatrixView};

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur during matrix view operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatrixError {
    /// Operand shapes are incompatible for the operation.
    #[error("mismatched matrices: a{left:?} x b{right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Element index outside the declared bounds of a view.
    #[error("index ({row}, {column}) out of range for {rows}x{columns} matrix")]
    IndexOutOfRange {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },

    /// Argument rejected before any work was done.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The addresses of a view leave its buffer.
    #[error("view addresses element {required} but buffer holds {len}")]
    BufferTooSmall { required: isize, len: usize },

    /// Integer overflow while computing view addresses.
    #[error("offset overflow while computing view addresses")]
    OffsetOverflow,
}

/// Result type for matrix view operations.
pub type Result<T> = std::result::Result<T, MatrixError>;

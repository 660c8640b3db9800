//! Broadcasting elementwise and reduction kernels over strided matrix views.
//!
//! Operations take one primary [`MatrixView`], up to two secondary operands
//! and a caller-supplied operator, and write into a destination view.
//! Secondary operands broadcast against the primary the way NumPy does for
//! 2-D arrays: same shape, scalar (`1x1`), row vector (`1xN`) or column vector
//! (`Mx1`).
//!
//! # Operators and kernels
//!
//! Any closure with the right signature is an operator and is evaluated by a
//! strided nested loop. Wrapping the closure in a kernel
//! ([`UnaryKernel`], [`BinaryKernel`], [`TernaryKernel`], [`ReductionKernel`])
//! additionally exposes flat-memory routines; the dispatcher uses them
//! whenever every participating view is laid out contiguously, and falls back
//! to the strided loop otherwise. Both paths give identical results.
//!
//! # Example
//!
//! ```rust
//! use stridemat_kernel::{zip_map2_into, BinaryKernel};
//! use stridemat_view::{Heap, MatrixView};
//!
//! let a = MatrixView::from_row_major(&Heap, 2, 3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! let v = MatrixView::from_row_major(&Heap, 1, 3, &[1.0, -1.0, 1.0]).unwrap();
//! let out = MatrixView::new(&Heap, 2, 3).unwrap();
//!
//! // Plain closure: strided loop.
//! zip_map2_into(&out, &a, &v, &|x: f64, y: f64| x * y).unwrap();
//! assert_eq!(out.to_rows(), vec![vec![0.0, -1.0, 2.0], vec![3.0, -4.0, 5.0]]);
//!
//! // Kernel: contiguous fast path, same answer.
//! zip_map2_into(&out, &a, &v, &BinaryKernel::new(|x, y| x * y)).unwrap();
//! assert_eq!(out.to_rows(), vec![vec![0.0, -1.0, 2.0], vec![3.0, -4.0, 5.0]]);
//! ```
//!
//! # Parallelism
//!
//! Kernels built with `parallel(..)` split vector broadcasts and vector
//! reductions into independent slices and run them on the rayon pool when the
//! `parallel` feature is enabled and the run holds at least
//! [`MIN_PARALLEL_LEN`] elements. Floating-point accumulation never crosses
//! a slice boundary, so parallel results are bit-identical to sequential ones.

pub mod broadcast;
pub mod kernel;
pub mod linalg;
mod maybe_sync;
pub mod operator;
pub mod ops_view;
pub mod reduce_view;
mod threading;

pub use broadcast::{
    classify, map_inplace, map_into, zip_map2_inplace, zip_map2_into, zip_map3_inplace,
    zip_map3_into, Broadcast,
};
pub use kernel::{
    BinaryBroadcast, BinaryKernel, Parallelism, ReductionBroadcast, ReductionKernel,
    TernaryBroadcast, TernaryKernel, UnaryBroadcast, UnaryKernel,
};
pub use linalg::{LinalgBackend, ReferenceBackend};
pub use maybe_sync::MaybeSync;
pub use operator::{BinaryOperator, ReductionOperator, TernaryOperator, UnaryOperator};
pub use ops_view::{
    add_assign, concat_horizontally, concat_vertically, copy_into, extract_column_into, fill,
    for_each, set_each, transpose, transpose_into,
};
pub use reduce_view::{
    column_means, column_std, mean, reduce_columns, reduce_columns_staged, reduce_full,
    reduce_rows, sum,
};
pub use threading::MIN_PARALLEL_LEN;

pub use stridemat_view::{
    Allocator, Arena, Buffer, Heap, Layout, MatrixError, MatrixView, Result,
};

//! Rayon-based execution of vector kernels.
//!
//! A vector broadcast or vector reduction is a sequence of `count`
//! independent slices of length `stride`. The slice range is split in half
//! recursively with `rayon::join` until a piece falls below
//! [`MIN_PARALLEL_LEN`] elements or holds a single slice.

use crate::kernel::Parallelism;

#[cfg(feature = "parallel")]
use std::cell::Cell;

/// Minimum number of elements to justify multi-threaded execution.
pub const MIN_PARALLEL_LEN: usize = 1 << 15;

/// Whether a run of `count` slices of length `stride` goes to the pool.
pub(crate) fn use_parallel(parallelism: Parallelism, count: usize, stride: usize) -> bool {
    cfg!(feature = "parallel")
        && parallelism == Parallelism::Parallel
        && count > 1
        && count.saturating_mul(stride) >= MIN_PARALLEL_LEN
}

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data is valid for the
/// lifetime of any parallel operation and that no data races occur
/// (different threads touch disjoint slices).
#[cfg(feature = "parallel")]
pub(crate) struct SendPtr<T>(*const T);

#[cfg(feature = "parallel")]
impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

#[cfg(feature = "parallel")]
impl<T> Copy for SendPtr<T> {}

#[cfg(feature = "parallel")]
unsafe impl<T> Send for SendPtr<T> {}
#[cfg(feature = "parallel")]
unsafe impl<T> Sync for SendPtr<T> {}

#[cfg(feature = "parallel")]
impl<T> SendPtr<T> {
    pub(crate) fn as_const(self) -> *const T {
        self.0
    }
}

/// Rebuild slice `j` of length `stride` from a base pointer.
///
/// # Safety
/// `base` must point to at least `(j + 1) * stride` live cells.
#[cfg(feature = "parallel")]
unsafe fn slice_at<'a>(base: SendPtr<Cell<f64>>, j: usize, stride: usize) -> &'a [Cell<f64>] {
    std::slice::from_raw_parts(base.as_const().add(j * stride), stride)
}

/// Recursive halving of `lo..hi` into pieces run by `leaf`.
#[cfg(feature = "parallel")]
fn split_range<L>(lo: usize, hi: usize, stride: usize, leaf: &L)
where
    L: Fn(usize, usize) + Sync,
{
    let count = hi - lo;
    if count <= 1 || count * stride <= MIN_PARALLEL_LEN {
        leaf(lo, hi);
        return;
    }
    let mid = lo + count / 2;
    rayon::join(
        || split_range(lo, mid, stride, leaf),
        || split_range(mid, hi, stride, leaf),
    );
}

/// Run `f(j, a_j, r_j)` for every slice `j < count`, in parallel.
///
/// `a` and `r` hold at least `count * stride` cells and may be the same run.
/// Slice `j` of `r` is written by exactly one worker, which is also the only
/// one reading slice `j` of `a`.
#[cfg(feature = "parallel")]
pub(crate) fn for_each_slice<F>(
    a: &[Cell<f64>],
    r: &[Cell<f64>],
    stride: usize,
    count: usize,
    f: &F,
) where
    F: Fn(usize, &[Cell<f64>], &[Cell<f64>]) + Sync,
{
    assert!(a.len() >= count * stride && r.len() >= count * stride);
    log::debug!(
        "parallel vector kernel: {} slices x {} elements on {} threads",
        count,
        stride,
        rayon::current_num_threads()
    );
    let a_ptr = SendPtr(a.as_ptr());
    let r_ptr = SendPtr(r.as_ptr());
    split_range(0, count, stride, &|lo, hi| {
        for j in lo..hi {
            // SAFETY: bounds checked above; slices of different `j` are disjoint.
            let (a_j, r_j) = unsafe { (slice_at(a_ptr, j, stride), slice_at(r_ptr, j, stride)) };
            f(j, a_j, r_j);
        }
    });
}

/// Evaluate `f(a_j)` for every slice `j < count`, in parallel, in slice order.
#[cfg(feature = "parallel")]
pub(crate) fn map_slices<F>(a: &[Cell<f64>], stride: usize, count: usize, f: &F) -> Vec<f64>
where
    F: Fn(&[Cell<f64>]) -> f64 + Sync,
{
    use rayon::prelude::*;

    assert!(a.len() >= count * stride);
    log::debug!(
        "parallel vector reduction: {} slices x {} elements",
        count,
        stride
    );
    let a_ptr = SendPtr(a.as_ptr());
    let min_len = (MIN_PARALLEL_LEN / stride.max(1)).max(1);
    (0..count)
        .into_par_iter()
        .with_min_len(min_len)
        .map(|j| {
            // SAFETY: bounds checked above; the slices are only read.
            let a_j = unsafe { slice_at(a_ptr, j, stride) };
            f(a_j)
        })
        .collect()
}

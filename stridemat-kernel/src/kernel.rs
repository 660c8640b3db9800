//! Flat-memory broadcast kernels.
//!
//! Each trait works on contiguous runs of cells and processes `r.len()`
//! elements per call. The provided methods are sequential loops; kernels
//! created with [`Parallelism::Parallel`] override the vector forms to run
//! their independent slices on the rayon pool.
//!
//! Source and destination runs may be the very same cells (in-place
//! updates). Every element is read before it is written.

use std::cell::Cell;
use std::fmt;

use crate::maybe_sync::MaybeSync;
use crate::operator::{BinaryOperator, ReductionOperator, TernaryOperator, UnaryOperator};
use crate::threading;

/// Execution mode of a kernel's vector forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel,
}

// ============================================================================
// Kernel traits
// ============================================================================

pub trait UnaryBroadcast: UnaryOperator {
    /// `r[i] = f(a[i])`.
    fn unary_broadcast(&self, a: &[Cell<f64>], r: &[Cell<f64>]) {
        for (x, out) in a.iter().zip(r) {
            out.set(self.apply(x.get()));
        }
    }
}

pub trait BinaryBroadcast: BinaryOperator {
    /// `r[i] = f(a[i], b)`.
    fn broadcast_scalar(&self, a: &[Cell<f64>], b: f64, r: &[Cell<f64>]) {
        for (x, out) in a.iter().zip(r) {
            out.set(self.apply(x.get(), b));
        }
    }

    /// Slice `j` of length `stride` is broadcast against the scalar `b[j]`.
    ///
    /// `a` and `r` hold `stride * b.len()` elements.
    fn broadcast_vector(&self, a: &[Cell<f64>], b: &[f64], r: &[Cell<f64>], stride: usize) {
        for (j, &bj) in b.iter().enumerate() {
            let slice = j * stride..(j + 1) * stride;
            self.broadcast_scalar(&a[slice.clone()], bj, &r[slice]);
        }
    }

    /// `r[i] = f(a[i], b[i])`.
    fn broadcast_matrix(&self, a: &[Cell<f64>], b: &[Cell<f64>], r: &[Cell<f64>]) {
        for ((x, y), out) in a.iter().zip(b).zip(r) {
            out.set(self.apply(x.get(), y.get()));
        }
    }
}

pub trait TernaryBroadcast: TernaryOperator {
    /// `r[i] = f(a[i], b, c)`.
    fn broadcast_scalar(&self, a: &[Cell<f64>], b: f64, c: f64, r: &[Cell<f64>]) {
        for (x, out) in a.iter().zip(r) {
            out.set(self.apply(x.get(), b, c));
        }
    }

    /// Slice `j` of length `stride` is broadcast against `(b[j], c[j])`.
    fn broadcast_vector(
        &self,
        a: &[Cell<f64>],
        b: &[f64],
        c: &[f64],
        r: &[Cell<f64>],
        stride: usize,
    ) {
        for (j, (&bj, &cj)) in b.iter().zip(c).enumerate() {
            let slice = j * stride..(j + 1) * stride;
            TernaryBroadcast::broadcast_scalar(self, &a[slice.clone()], bj, cj, &r[slice]);
        }
    }

    /// `r[i] = f(a[i], b[i], c[i])`.
    fn broadcast_matrix(
        &self,
        a: &[Cell<f64>],
        b: &[Cell<f64>],
        c: &[Cell<f64>],
        r: &[Cell<f64>],
    ) {
        for (((x, y), z), out) in a.iter().zip(b).zip(c).zip(r) {
            out.set(self.apply(x.get(), y.get(), z.get()));
        }
    }
}

pub trait ReductionBroadcast: ReductionOperator {
    /// Fold `a` into an accumulator seeded with `0.0`.
    fn reduce_scalar(&self, a: &[Cell<f64>]) -> f64 {
        a.iter().fold(0.0, |acc, x| self.apply(acc, x.get()))
    }

    /// `r[j]` is the reduction of slice `j` (length `stride`) of `a`.
    fn reduce_vector(&self, a: &[Cell<f64>], r: &[Cell<f64>], stride: usize) {
        for (j, out) in r.iter().enumerate() {
            out.set(self.reduce_scalar(&a[j * stride..(j + 1) * stride]));
        }
    }
}

// ============================================================================
// Closure-backed kernels
// ============================================================================

/// Implements the kernel structs: constructors, `Debug`, and the operator
/// trait advertising the kernel.
macro_rules! closure_kernel {
    ($name:ident, $op:ident, $flat:ident, ($($arg:ident),+), $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy)]
        pub struct $name<F> {
            f: F,
            parallelism: Parallelism,
        }

        impl<F> $name<F>
        where
            F: Fn($(closure_kernel!(@f64 $arg)),+) -> f64 + MaybeSync,
        {
            /// Sequential kernel.
            pub fn new(f: F) -> Self {
                Self::with_parallelism(f, Parallelism::Sequential)
            }

            /// Kernel whose vector forms may run on the thread pool.
            pub fn parallel(f: F) -> Self {
                Self::with_parallelism(f, Parallelism::Parallel)
            }

            pub fn with_parallelism(f: F, parallelism: Parallelism) -> Self {
                Self { f, parallelism }
            }
        }

        impl<F> $name<F> {
            #[inline]
            pub fn parallelism(&self) -> Parallelism {
                self.parallelism
            }
        }

        impl<F> fmt::Debug for $name<F> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("parallelism", &self.parallelism)
                    .finish_non_exhaustive()
            }
        }

        impl<F> $op for $name<F>
        where
            F: Fn($(closure_kernel!(@f64 $arg)),+) -> f64 + MaybeSync,
        {
            #[inline]
            fn apply(&self, $($arg: f64),+) -> f64 {
                (self.f)($($arg),+)
            }

            fn kernel(&self) -> Option<&dyn $flat> {
                Some(self)
            }
        }
    };
    (@f64 $arg:ident) => { f64 };
}

closure_kernel!(
    UnaryKernel,
    UnaryOperator,
    UnaryBroadcast,
    (a),
    "Unary operator with a flat-memory kernel."
);
closure_kernel!(
    BinaryKernel,
    BinaryOperator,
    BinaryBroadcast,
    (a, b),
    "Binary operator with scalar, vector and matrix broadcast kernels."
);
closure_kernel!(
    TernaryKernel,
    TernaryOperator,
    TernaryBroadcast,
    (a, b, c),
    "Ternary operator with scalar, vector and matrix broadcast kernels."
);
closure_kernel!(
    ReductionKernel,
    ReductionOperator,
    ReductionBroadcast,
    (acc, x),
    "Reduction accumulator with flat scalar and vector reduction kernels."
);

impl<F: Fn(f64) -> f64 + MaybeSync> UnaryBroadcast for UnaryKernel<F> {}

impl<F: Fn(f64, f64) -> f64 + MaybeSync> BinaryBroadcast for BinaryKernel<F> {
    fn broadcast_vector(&self, a: &[Cell<f64>], b: &[f64], r: &[Cell<f64>], stride: usize) {
        if !threading::use_parallel(self.parallelism, b.len(), stride) {
            for (j, &bj) in b.iter().enumerate() {
                let slice = j * stride..(j + 1) * stride;
                self.broadcast_scalar(&a[slice.clone()], bj, &r[slice]);
            }
            return;
        }
        #[cfg(feature = "parallel")]
        threading::for_each_slice(a, r, stride, b.len(), &|j, a_j, r_j| {
            self.broadcast_scalar(a_j, b[j], r_j)
        });
    }
}

impl<F: Fn(f64, f64, f64) -> f64 + MaybeSync> TernaryBroadcast for TernaryKernel<F> {
    fn broadcast_vector(
        &self,
        a: &[Cell<f64>],
        b: &[f64],
        c: &[f64],
        r: &[Cell<f64>],
        stride: usize,
    ) {
        if !threading::use_parallel(self.parallelism, b.len(), stride) {
            for (j, (&bj, &cj)) in b.iter().zip(c).enumerate() {
                let slice = j * stride..(j + 1) * stride;
                self.broadcast_scalar(&a[slice.clone()], bj, cj, &r[slice]);
            }
            return;
        }
        #[cfg(feature = "parallel")]
        threading::for_each_slice(a, r, stride, b.len(), &|j, a_j, r_j| {
            self.broadcast_scalar(a_j, b[j], c[j], r_j)
        });
    }
}

impl<F: Fn(f64, f64) -> f64 + MaybeSync> ReductionBroadcast for ReductionKernel<F> {
    fn reduce_vector(&self, a: &[Cell<f64>], r: &[Cell<f64>], stride: usize) {
        if !threading::use_parallel(self.parallelism, r.len(), stride) {
            for (j, out) in r.iter().enumerate() {
                out.set(self.reduce_scalar(&a[j * stride..(j + 1) * stride]));
            }
            return;
        }
        #[cfg(feature = "parallel")]
        {
            // Results are gathered first so no worker writes while others read `a`.
            let results = threading::map_slices(a, stride, r.len(), &|a_j| self.reduce_scalar(a_j));
            for (out, v) in r.iter().zip(results) {
                out.set(v);
            }
        }
    }
}

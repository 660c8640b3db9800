//! Scalar operators accepted by the elementwise and reduction entry points.
//!
//! Every closure of the matching shape is an operator. An operator may also
//! advertise a flat-memory kernel through `kernel()`; the dispatcher checks
//! for it explicitly and only then considers the contiguous fast path.
//!
//! Closures passed directly need annotated parameters
//! (`&|a: f64, b: f64| a * b`), since the signature is not inferred through
//! the trait bound.

use crate::kernel::{BinaryBroadcast, ReductionBroadcast, TernaryBroadcast, UnaryBroadcast};

/// `f(a)`.
pub trait UnaryOperator {
    fn apply(&self, a: f64) -> f64;

    /// Flat-memory implementation of the same operator, if any.
    fn kernel(&self) -> Option<&dyn UnaryBroadcast> {
        None
    }
}

/// `f(a, b)`.
pub trait BinaryOperator {
    fn apply(&self, a: f64, b: f64) -> f64;

    fn kernel(&self) -> Option<&dyn BinaryBroadcast> {
        None
    }
}

/// `f(a, b, c)`.
pub trait TernaryOperator {
    fn apply(&self, a: f64, b: f64, c: f64) -> f64;

    fn kernel(&self) -> Option<&dyn TernaryBroadcast> {
        None
    }
}

/// Reduction accumulator `acc' = f(acc, x)`.
///
/// Reductions seed the accumulator with `0.0` and fold elements in a fixed
/// order; the operator need not be commutative.
pub trait ReductionOperator {
    fn apply(&self, acc: f64, x: f64) -> f64;

    fn kernel(&self) -> Option<&dyn ReductionBroadcast> {
        None
    }
}

impl<F: Fn(f64) -> f64> UnaryOperator for F {
    #[inline]
    fn apply(&self, a: f64) -> f64 {
        self(a)
    }
}

impl<F: Fn(f64, f64) -> f64> BinaryOperator for F {
    #[inline]
    fn apply(&self, a: f64, b: f64) -> f64 {
        self(a, b)
    }
}

impl<F: Fn(f64, f64, f64) -> f64> TernaryOperator for F {
    #[inline]
    fn apply(&self, a: f64, b: f64, c: f64) -> f64 {
        self(a, b, c)
    }
}

impl<F: Fn(f64, f64) -> f64> ReductionOperator for F {
    #[inline]
    fn apply(&self, acc: f64, x: f64) -> f64 {
        self(acc, x)
    }
}

//! Feature-gated Sync marker trait.
//!
//! When the `parallel` feature is enabled, [`MaybeSync`] ≡ [`Sync`], since
//! parallel kernels share their closure across rayon workers. When
//! `parallel` is disabled it is blanket-implemented for all types, so kernels
//! may capture non-thread-safe state such as a [`stridemat_view::MatrixView`].

#[cfg(feature = "parallel")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "parallel")]
impl<T: Sync> MaybeSync for T {}

#[cfg(not(feature = "parallel"))]
pub trait MaybeSync {}
#[cfg(not(feature = "parallel"))]
impl<T> MaybeSync for T {}

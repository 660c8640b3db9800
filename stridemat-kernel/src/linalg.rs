//! Dense linear-algebra routines behind a swappable backend.
//!
//! [`LinalgBackend`] is the seam to an optimized numerical library.
//! [`ReferenceBackend`] implements it with plain loops over the views, for
//! tests and small problems.

use stridemat_view::{MatrixError, MatrixView, Result};

use crate::broadcast::{map_inplace, zip_map2_inplace};
use crate::kernel::{BinaryKernel, ReductionKernel, UnaryKernel};
use crate::ops_view::{copy_into, fill, transpose_into};
use crate::reduce_view::reduce_full;

/// Matrix-level routines in BLAS naming.
///
/// Operands carry their own `Trans` flag; backends that honor it read the
/// operand as its transpose without materializing it.
pub trait LinalgBackend {
    /// `C = alpha * op(A) * op(B) + beta * C`. With `beta == 0` the previous
    /// contents of `C` are ignored.
    fn gemm(
        &self,
        alpha: f64,
        a: &MatrixView,
        b: &MatrixView,
        beta: f64,
        c: &MatrixView,
    ) -> Result<()>;

    /// `B = op(A)`.
    fn copy(&self, a: &MatrixView, b: &MatrixView) -> Result<()>;

    /// `sqrt(sum(a[i, j]^2))`.
    fn norm_frobenius(&self, a: &MatrixView) -> f64;

    /// `A = alpha * A`.
    fn scal(&self, alpha: f64, a: &MatrixView) -> Result<()>;

    /// `Y = alpha * X + Y`.
    fn axpy(&self, alpha: f64, x: &MatrixView, y: &MatrixView) -> Result<()>;

    /// Every element of `A` set to `alpha`.
    fn set(&self, alpha: f64, a: &MatrixView) -> Result<()>;
}

/// Loop-based backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceBackend;

/// Shape of `op(view)` and an element reader honoring the transpose flag.
fn effective(view: &MatrixView) -> ((usize, usize), impl Fn(usize, usize) -> f64 + '_) {
    let transposed = view.trans().is_transposed();
    let shape = if transposed {
        (view.columns(), view.rows())
    } else {
        view.shape()
    };
    let read = move |i: usize, j: usize| {
        if transposed {
            view.load(j, i)
        } else {
            view.load(i, j)
        }
    };
    (shape, read)
}

impl LinalgBackend for ReferenceBackend {
    fn gemm(
        &self,
        alpha: f64,
        a: &MatrixView,
        b: &MatrixView,
        beta: f64,
        c: &MatrixView,
    ) -> Result<()> {
        let ((m, k), read_a) = effective(a);
        let ((k_b, n), read_b) = effective(b);
        if k != k_b {
            return Err(MatrixError::ShapeMismatch {
                left: (m, k),
                right: (k_b, n),
            });
        }
        if c.shape() != (m, n) {
            return Err(MatrixError::ShapeMismatch {
                left: (m, n),
                right: c.shape(),
            });
        }
        log::trace!("reference gemm m={m} n={n} k={k}");

        // The product is formed completely before C is touched, so C may
        // share storage with A or B.
        let mut product = vec![0.0; m * n];
        for j in 0..n {
            for p in 0..k {
                let b_pj = read_b(p, j);
                for i in 0..m {
                    product[j * m + i] += read_a(i, p) * b_pj;
                }
            }
        }
        for j in 0..n {
            for i in 0..m {
                let scaled = alpha * product[j * m + i];
                let value = if beta == 0.0 {
                    scaled
                } else {
                    scaled + beta * c.load(i, j)
                };
                c.store(i, j, value);
            }
        }
        Ok(())
    }

    fn copy(&self, a: &MatrixView, b: &MatrixView) -> Result<()> {
        if a.trans().is_transposed() {
            transpose_into(a, b)
        } else {
            copy_into(a, b)
        }
    }

    fn norm_frobenius(&self, a: &MatrixView) -> f64 {
        reduce_full(a, &ReductionKernel::new(|acc, x| acc + x * x)).sqrt()
    }

    fn scal(&self, alpha: f64, a: &MatrixView) -> Result<()> {
        map_inplace(a, &UnaryKernel::new(move |x| alpha * x))
    }

    fn axpy(&self, alpha: f64, x: &MatrixView, y: &MatrixView) -> Result<()> {
        if x.shape() != y.shape() {
            return Err(MatrixError::ShapeMismatch {
                left: x.shape(),
                right: y.shape(),
            });
        }
        zip_map2_inplace(y, x, &BinaryKernel::new(move |y, x| alpha * x + y))
    }

    fn set(&self, alpha: f64, a: &MatrixView) -> Result<()> {
        fill(a, alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stridemat_view::{Heap, Trans};

    fn from_rows(rows: &[&[f64]]) -> MatrixView {
        let values: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        MatrixView::from_row_major(&Heap, rows.len(), rows[0].len(), &values).unwrap()
    }

    #[test]
    fn test_gemm_plain() {
        let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = from_rows(&[&[5.0, 6.0], &[7.0, 8.0]]);
        let c = from_rows(&[&[1.0, 1.0], &[1.0, 1.0]]);
        ReferenceBackend.gemm(1.0, &a, &b, 2.0, &c).unwrap();
        assert_eq!(c.to_rows(), vec![vec![21.0, 24.0], vec![45.0, 52.0]]);
    }

    #[test]
    fn test_gemm_honors_trans_and_ignores_c_with_zero_beta() {
        let a = from_rows(&[&[1.0, 3.0], &[2.0, 4.0]]).with_trans(Trans::Transpose);
        let b = from_rows(&[&[5.0, 6.0], &[7.0, 8.0]]);
        let c = from_rows(&[&[f64::NAN, f64::NAN], &[f64::NAN, f64::NAN]]);
        ReferenceBackend.gemm(1.0, &a, &b, 0.0, &c).unwrap();
        assert_eq!(c.to_rows(), vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
    }

    #[test]
    fn test_gemm_shape_checks() {
        let a = MatrixView::new(&Heap, 2, 3).unwrap();
        let b = MatrixView::new(&Heap, 2, 2).unwrap();
        let c = MatrixView::new(&Heap, 2, 2).unwrap();
        assert!(matches!(
            ReferenceBackend.gemm(1.0, &a, &b, 0.0, &c),
            Err(MatrixError::ShapeMismatch { .. })
        ));
        let b = MatrixView::new(&Heap, 3, 4).unwrap();
        assert_eq!(
            ReferenceBackend.gemm(1.0, &a, &b, 0.0, &c).unwrap_err(),
            MatrixError::ShapeMismatch {
                left: (2, 4),
                right: (2, 2)
            }
        );
    }

    #[test]
    fn test_gemm_output_may_alias_input() {
        let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let backend = ReferenceBackend;
        backend.gemm(1.0, &a, &a.clone(), 0.0, &a).unwrap();
        assert_eq!(a.to_rows(), vec![vec![7.0, 10.0], vec![15.0, 22.0]]);
    }

    #[test]
    fn test_level1_routines() {
        let backend = ReferenceBackend;
        let x = from_rows(&[&[3.0, 0.0], &[0.0, 4.0]]);
        assert_relative_eq!(backend.norm_frobenius(&x), 5.0);

        let y = MatrixView::new(&Heap, 2, 2).unwrap();
        backend.set(1.0, &y).unwrap();
        backend.axpy(2.0, &x, &y).unwrap();
        assert_eq!(y.to_rows(), vec![vec![7.0, 1.0], vec![1.0, 9.0]]);
        backend.scal(0.5, &y).unwrap();
        assert_eq!(y.to_rows(), vec![vec![3.5, 0.5], vec![0.5, 4.5]]);
        assert!(backend
            .axpy(1.0, &x, &MatrixView::new(&Heap, 1, 2).unwrap())
            .is_err());
    }

    #[test]
    fn test_copy_honors_trans() {
        let backend = ReferenceBackend;
        let a = from_rows(&[&[1.0, 2.0, 3.0]]);
        let column = MatrixView::new(&Heap, 3, 1).unwrap();
        backend.copy(&a.with_trans(Trans::Transpose), &column).unwrap();
        assert_eq!(column.to_vec_column_major(), vec![1.0, 2.0, 3.0]);
        let row = MatrixView::new(&Heap, 1, 3).unwrap();
        backend.copy(&a, &row).unwrap();
        assert_eq!(row, a);
    }
}

//! Shape classification and dispatch of elementwise operations.
//!
//! Every entry point validates shapes first, then runs either the operator's
//! flat-memory kernel (when it has one and all views are laid out densely) or
//! a strided nested loop. Nothing is written before validation succeeds.

use std::cell::Cell;

use stridemat_view::{Layout, MatrixError, MatrixView, Result};

use crate::kernel::{BinaryBroadcast, TernaryBroadcast, UnaryBroadcast};
use crate::operator::{BinaryOperator, TernaryOperator, UnaryOperator};

/// How a secondary operand lines up with the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Broadcast {
    /// Identical shape; elements pair up one to one.
    SameShape,
    /// `1x1`; the single value pairs with every element.
    Scalar,
    /// `1xN` with `N` the primary's columns; element `j` pairs with column `j`.
    RowVector,
    /// `Mx1` with `M` the primary's rows; element `i` pairs with row `i`.
    ColumnVector,
}

/// Classify `secondary` against `primary`. The first matching case wins, in
/// declaration order of [`Broadcast`].
///
/// # Errors
/// `ShapeMismatch` carrying both shapes when no case applies.
pub fn classify(primary: (usize, usize), secondary: (usize, usize)) -> Result<Broadcast> {
    let (rows, columns) = primary;
    match secondary {
        s if s == primary => Ok(Broadcast::SameShape),
        (1, 1) => Ok(Broadcast::Scalar),
        (1, n) if n == columns => Ok(Broadcast::RowVector),
        (m, 1) if m == rows => Ok(Broadcast::ColumnVector),
        _ => Err(MatrixError::ShapeMismatch {
            left: primary,
            right: secondary,
        }),
    }
}

fn check_destination(dest: &MatrixView, a: &MatrixView) -> Result<()> {
    if dest.shape() != a.shape() {
        return Err(MatrixError::ShapeMismatch {
            left: a.shape(),
            right: dest.shape(),
        });
    }
    Ok(())
}

/// The cells of a dense view, in storage order.
#[inline]
pub(crate) fn flat(view: &MatrixView) -> &[Cell<f64>] {
    &view.buffer().cells()[..view.len()]
}

/// A layout in which every view is dense, if there is one.
fn shared_dense_layout(views: &[&MatrixView]) -> Option<Layout> {
    [Layout::ColumnMajor, Layout::RowMajor]
        .into_iter()
        .find(|&layout| views.iter().all(|v| v.is_dense(layout)))
}

/// Snapshot of a broadcast secondary taken before the destination is
/// written, so a secondary inside the destination reads its old values.
/// Same-shape secondaries are read in place and yield an empty snapshot.
fn gather(view: &MatrixView, case: Broadcast) -> Vec<f64> {
    match case {
        Broadcast::SameShape => Vec::new(),
        Broadcast::Scalar => vec![view.load(0, 0)],
        Broadcast::RowVector => view.to_vec_row_major(),
        Broadcast::ColumnVector => view.to_vec_column_major(),
    }
}

/// Secondary element paired with primary element `(i, j)`.
#[inline]
fn secondary_at(view: &MatrixView, values: &[f64], case: Broadcast, i: usize, j: usize) -> f64 {
    match case {
        Broadcast::SameShape => view.load(i, j),
        Broadcast::Scalar => values[0],
        Broadcast::RowVector => values[j],
        Broadcast::ColumnVector => values[i],
    }
}

/// Visit every `(i, j)` of a `rows x columns` region: column by column,
/// except for column-vector broadcasts which go row by row.
#[inline]
fn for_each_index(case: Broadcast, shape: (usize, usize), mut f: impl FnMut(usize, usize)) {
    let (rows, columns) = shape;
    if case == Broadcast::ColumnVector {
        for i in 0..rows {
            for j in 0..columns {
                f(i, j);
            }
        }
    } else {
        for j in 0..columns {
            for i in 0..rows {
                f(i, j);
            }
        }
    }
}

// ============================================================================
// Unary
// ============================================================================

/// `dest[i, j] = op(a[i, j])`.
///
/// # Errors
/// `ShapeMismatch` when `dest` and `a` differ in shape.
pub fn map_into<O>(dest: &MatrixView, a: &MatrixView, op: &O) -> Result<()>
where
    O: UnaryOperator + ?Sized,
{
    check_destination(dest, a)?;
    if let Some(kernel) = op.kernel() {
        if unary_fast(kernel, dest, a) {
            log::trace!("map {:?}: kernel", a.shape());
            return Ok(());
        }
    }
    log::trace!("map {:?}: strided loop", a.shape());
    for_each_index(Broadcast::SameShape, a.shape(), |i, j| {
        dest.store(i, j, op.apply(a.load(i, j)))
    });
    Ok(())
}

/// `a[i, j] = op(a[i, j])`.
pub fn map_inplace<O>(a: &MatrixView, op: &O) -> Result<()>
where
    O: UnaryOperator + ?Sized,
{
    map_into(a, a, op)
}

fn unary_fast(kernel: &dyn UnaryBroadcast, dest: &MatrixView, a: &MatrixView) -> bool {
    if shared_dense_layout(&[a, dest]).is_none() {
        return false;
    }
    kernel.unary_broadcast(flat(a), flat(dest));
    true
}

// ============================================================================
// Binary
// ============================================================================

/// `dest[i, j] = op(a[i, j], b')` where `b'` is the element of `b` that
/// broadcasts onto `(i, j)`.
///
/// `dest` may be `a` itself. A scalar or vector `b` may lie inside `dest`;
/// its values are read before anything is written. A same-shape `b` must not
/// overlap `dest` unless it is the same view as `dest`.
///
/// # Errors
/// `ShapeMismatch` when `dest` and `a` differ in shape or `b` does not
/// broadcast against `a`.
pub fn zip_map2_into<O>(dest: &MatrixView, a: &MatrixView, b: &MatrixView, op: &O) -> Result<()>
where
    O: BinaryOperator + ?Sized,
{
    check_destination(dest, a)?;
    let case = classify(a.shape(), b.shape())?;
    if let Some(kernel) = op.kernel() {
        if binary_fast(kernel, case, dest, a, b) {
            log::trace!("zip_map2 {:?} {:?}: kernel", a.shape(), case);
            return Ok(());
        }
    }
    log::trace!("zip_map2 {:?} {:?}: strided loop", a.shape(), case);
    let bv = gather(b, case);
    for_each_index(case, a.shape(), |i, j| {
        let y = secondary_at(b, &bv, case, i, j);
        dest.store(i, j, op.apply(a.load(i, j), y))
    });
    Ok(())
}

/// `a[i, j] = op(a[i, j], b')`.
pub fn zip_map2_inplace<O>(a: &MatrixView, b: &MatrixView, op: &O) -> Result<()>
where
    O: BinaryOperator + ?Sized,
{
    zip_map2_into(a, a, b, op)
}

fn binary_fast(
    kernel: &dyn BinaryBroadcast,
    case: Broadcast,
    dest: &MatrixView,
    a: &MatrixView,
    b: &MatrixView,
) -> bool {
    let (rows, columns) = a.shape();
    match case {
        Broadcast::SameShape => {
            if shared_dense_layout(&[a, b, dest]).is_none() {
                return false;
            }
            kernel.broadcast_matrix(flat(a), flat(b), flat(dest));
        }
        Broadcast::Scalar => {
            if shared_dense_layout(&[a, dest]).is_none() {
                return false;
            }
            kernel.broadcast_scalar(flat(a), b.load(0, 0), flat(dest));
        }
        Broadcast::RowVector => {
            if !(a.is_dense(Layout::ColumnMajor) && dest.is_dense(Layout::ColumnMajor)) {
                return false;
            }
            kernel.broadcast_vector(flat(a), &gather(b, case), flat(dest), rows);
        }
        Broadcast::ColumnVector => {
            if !(a.is_dense(Layout::RowMajor) && dest.is_dense(Layout::RowMajor)) {
                return false;
            }
            kernel.broadcast_vector(flat(a), &gather(b, case), flat(dest), columns);
        }
    }
    true
}

// ============================================================================
// Ternary
// ============================================================================

/// `dest[i, j] = op(a[i, j], b', c')`.
///
/// `b` and `c` must have the same shape, which is classified against `a`.
///
/// # Errors
/// `ShapeMismatch` when `dest` and `a` differ in shape, when `b` and `c`
/// differ in shape, or when `b` does not broadcast against `a`.
pub fn zip_map3_into<O>(
    dest: &MatrixView,
    a: &MatrixView,
    b: &MatrixView,
    c: &MatrixView,
    op: &O,
) -> Result<()>
where
    O: TernaryOperator + ?Sized,
{
    check_destination(dest, a)?;
    if b.shape() != c.shape() {
        return Err(MatrixError::ShapeMismatch {
            left: b.shape(),
            right: c.shape(),
        });
    }
    let case = classify(a.shape(), b.shape())?;
    if let Some(kernel) = op.kernel() {
        if ternary_fast(kernel, case, dest, a, b, c) {
            log::trace!("zip_map3 {:?} {:?}: kernel", a.shape(), case);
            return Ok(());
        }
    }
    log::trace!("zip_map3 {:?} {:?}: strided loop", a.shape(), case);
    let (bv, cv) = (gather(b, case), gather(c, case));
    for_each_index(case, a.shape(), |i, j| {
        let y = secondary_at(b, &bv, case, i, j);
        let z = secondary_at(c, &cv, case, i, j);
        dest.store(i, j, op.apply(a.load(i, j), y, z))
    });
    Ok(())
}

/// `a[i, j] = op(a[i, j], b', c')`.
pub fn zip_map3_inplace<O>(a: &MatrixView, b: &MatrixView, c: &MatrixView, op: &O) -> Result<()>
where
    O: TernaryOperator + ?Sized,
{
    zip_map3_into(a, a, b, c, op)
}

fn ternary_fast(
    kernel: &dyn TernaryBroadcast,
    case: Broadcast,
    dest: &MatrixView,
    a: &MatrixView,
    b: &MatrixView,
    c: &MatrixView,
) -> bool {
    let (rows, columns) = a.shape();
    match case {
        Broadcast::SameShape => {
            if shared_dense_layout(&[a, b, c, dest]).is_none() {
                return false;
            }
            kernel.broadcast_matrix(flat(a), flat(b), flat(c), flat(dest));
        }
        Broadcast::Scalar => {
            if shared_dense_layout(&[a, dest]).is_none() {
                return false;
            }
            kernel.broadcast_scalar(flat(a), b.load(0, 0), c.load(0, 0), flat(dest));
        }
        Broadcast::RowVector => {
            if !(a.is_dense(Layout::ColumnMajor) && dest.is_dense(Layout::ColumnMajor)) {
                return false;
            }
            let (bv, cv) = (gather(b, case), gather(c, case));
            kernel.broadcast_vector(flat(a), &bv, &cv, flat(dest), rows);
        }
        Broadcast::ColumnVector => {
            if !(a.is_dense(Layout::RowMajor) && dest.is_dense(Layout::RowMajor)) {
                return false;
            }
            let (bv, cv) = (gather(b, case), gather(c, case));
            kernel.broadcast_vector(flat(a), &bv, &cv, flat(dest), columns);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{BinaryKernel, TernaryKernel, UnaryKernel};
    use stridemat_view::Heap;

    fn from_rows(rows: &[&[f64]]) -> MatrixView {
        let values: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        MatrixView::from_row_major(&Heap, rows.len(), rows[0].len(), &values).unwrap()
    }

    /// Binary operator whose kernel counts how often it ran.
    struct CountingAdd {
        calls: Cell<usize>,
    }

    impl BinaryOperator for CountingAdd {
        fn apply(&self, a: f64, b: f64) -> f64 {
            a + b
        }

        fn kernel(&self) -> Option<&dyn BinaryBroadcast> {
            Some(self)
        }
    }

    impl BinaryBroadcast for CountingAdd {
        fn broadcast_scalar(&self, a: &[Cell<f64>], b: f64, r: &[Cell<f64>]) {
            self.calls.set(self.calls.get() + 1);
            for (x, out) in a.iter().zip(r) {
                out.set(x.get() + b);
            }
        }

        fn broadcast_matrix(&self, a: &[Cell<f64>], b: &[Cell<f64>], r: &[Cell<f64>]) {
            self.calls.set(self.calls.get() + 1);
            for ((x, y), out) in a.iter().zip(b).zip(r) {
                out.set(x.get() + y.get());
            }
        }
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify((3, 4), (3, 4)).unwrap(), Broadcast::SameShape);
        // 1x1 primary: same shape wins over scalar.
        assert_eq!(classify((1, 1), (1, 1)).unwrap(), Broadcast::SameShape);
        assert_eq!(classify((3, 4), (1, 1)).unwrap(), Broadcast::Scalar);
        // 1x1 secondary against a single column: scalar wins over column vector.
        assert_eq!(classify((1, 5), (1, 1)).unwrap(), Broadcast::Scalar);
        assert_eq!(classify((3, 4), (1, 4)).unwrap(), Broadcast::RowVector);
        assert_eq!(classify((3, 4), (3, 1)).unwrap(), Broadcast::ColumnVector);
        assert_eq!(
            classify((3, 4), (2, 4)).unwrap_err(),
            MatrixError::ShapeMismatch {
                left: (3, 4),
                right: (2, 4)
            }
        );
        assert!(classify((3, 4), (4, 1)).is_err());
        assert!(classify((3, 4), (4, 3)).is_err());
    }

    #[test]
    fn test_destination_shape_checked_before_writing() {
        let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let dest = MatrixView::new(&Heap, 2, 3).unwrap();
        let err = zip_map2_into(&dest, &a, &a, &|x: f64, y: f64| x + y).unwrap_err();
        assert!(matches!(err, MatrixError::ShapeMismatch { .. }));
        assert!(dest.to_vec_column_major().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_scalar_broadcast() {
        let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let s = from_rows(&[&[10.0]]);
        let out = MatrixView::new(&Heap, 2, 2).unwrap();
        zip_map2_into(&out, &a, &s, &BinaryKernel::new(|x, y| x * y)).unwrap();
        assert_eq!(out.to_rows(), vec![vec![10.0, 20.0], vec![30.0, 40.0]]);
    }

    #[test]
    fn test_kernel_used_only_for_dense_operands() {
        let a = from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let op = CountingAdd {
            calls: Cell::new(0),
        };

        let out = MatrixView::new(&Heap, 2, 3).unwrap();
        zip_map2_into(&out, &a, &a, &op).unwrap();
        assert_eq!(op.calls.get(), 1);

        // Row vector over column-major operands: one slice per column.
        let v = from_rows(&[&[1.0, 1.0, 1.0]]);
        zip_map2_into(&out, &a, &v, &op).unwrap();
        assert_eq!(op.calls.get(), 4);

        // Column vector over column-major operands: strided loop.
        let w = from_rows(&[&[1.0], &[2.0]]);
        zip_map2_into(&out, &a, &w, &op).unwrap();
        assert_eq!(op.calls.get(), 4);
        assert_eq!(out.to_rows(), vec![vec![2.0, 3.0, 4.0], vec![6.0, 7.0, 8.0]]);

        // Sub-view destination: strided loop.
        let big = MatrixView::new(&Heap, 3, 4).unwrap();
        let window = big.sub_view(1, 1, 2, 3).unwrap();
        zip_map2_into(&window, &a, &a, &op).unwrap();
        assert_eq!(op.calls.get(), 4);
        assert_eq!(window.to_rows(), vec![vec![2.0, 4.0, 6.0], vec![8.0, 10.0, 12.0]]);
        assert_eq!(big.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_column_vector_fast_path_on_row_major() {
        let a = MatrixView::with_layout(&Heap, 3, 2, Layout::RowMajor).unwrap();
        zip_map2_inplace(&a, &from_rows(&[&[1.0]]), &BinaryKernel::new(|_, y| y)).unwrap();
        let col = from_rows(&[&[1.0], &[2.0], &[3.0]]);
        let op = CountingAdd {
            calls: Cell::new(0),
        };
        zip_map2_inplace(&a, &col, &op).unwrap();
        assert_eq!(op.calls.get(), 3);
        assert_eq!(
            a.to_rows(),
            vec![vec![2.0, 2.0], vec![3.0, 3.0], vec![4.0, 4.0]]
        );
    }

    #[test]
    fn test_mixed_layouts_fall_back() {
        let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = MatrixView::with_layout(&Heap, 2, 2, Layout::RowMajor).unwrap();
        b.set(0, 1, 5.0).unwrap();
        let op = CountingAdd {
            calls: Cell::new(0),
        };
        let out = MatrixView::new(&Heap, 2, 2).unwrap();
        zip_map2_into(&out, &a, &b, &op).unwrap();
        assert_eq!(op.calls.get(), 0);
        assert_eq!(out.to_rows(), vec![vec![1.0, 7.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_unary_in_place() {
        let a = from_rows(&[&[1.0, -2.0], &[-3.0, 4.0]]);
        map_inplace(&a, &UnaryKernel::new(f64::abs)).unwrap();
        assert_eq!(a.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let s = a.sub_view(0, 1, 2, 1).unwrap();
        map_inplace(&s, &|x: f64| -x).unwrap();
        assert_eq!(a.to_rows(), vec![vec![1.0, -2.0], vec![3.0, -4.0]]);
    }

    #[test]
    fn test_ternary_requires_matching_secondaries() {
        let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = from_rows(&[&[1.0, 2.0]]);
        let c = from_rows(&[&[1.0], &[2.0]]);
        let err = zip_map3_inplace(&a, &b, &c, &|x: f64, y: f64, z: f64| x + y + z).unwrap_err();
        assert_eq!(
            err,
            MatrixError::ShapeMismatch {
                left: (1, 2),
                right: (2, 1)
            }
        );
    }

    #[test]
    fn test_ternary_row_vector() {
        let a = from_rows(&[&[1.0, 4.0], &[3.0, 8.0]]);
        let means = from_rows(&[&[2.0, 6.0]]);
        let scales = from_rows(&[&[1.0, 2.0]]);
        let expected = vec![vec![-1.0, -1.0], vec![1.0, 1.0]];

        let out = MatrixView::new(&Heap, 2, 2).unwrap();
        zip_map3_into(&out, &a, &means, &scales, &TernaryKernel::new(|x, m, s| (x - m) / s))
            .unwrap();
        assert_eq!(out.to_rows(), expected);

        zip_map3_inplace(&a, &means, &scales, &|x: f64, m: f64, s: f64| (x - m) / s).unwrap();
        assert_eq!(a.to_rows(), expected);
    }
}

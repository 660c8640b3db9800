//! Reductions over strided matrix views.
//!
//! Accumulators start at `0.0` and visit elements in a fixed order, so
//! non-commutative accumulators give reproducible results on every path.

use stridemat_view::{Layout, MatrixError, MatrixView, Result};

use crate::broadcast::{flat, map_inplace};
use crate::kernel::ReductionKernel;
use crate::operator::ReductionOperator;

fn check_reduction_target(dest: &MatrixView, expected: (usize, usize), what: &str) -> Result<()> {
    if dest.shape() != expected {
        return Err(MatrixError::InvalidArgument(format!(
            "{what} destination must be {}x{}, got {}x{}",
            expected.0,
            expected.1,
            dest.rows(),
            dest.columns()
        )));
    }
    Ok(())
}

/// Fold every element of `a`, column by column.
pub fn reduce_full<O>(a: &MatrixView, op: &O) -> f64
where
    O: ReductionOperator + ?Sized,
{
    if let Some(kernel) = op.kernel() {
        if a.is_dense(Layout::ColumnMajor) {
            log::trace!("reduce_full {:?}: kernel", a.shape());
            return kernel.reduce_scalar(flat(a));
        }
    }
    log::trace!("reduce_full {:?}: strided loop", a.shape());
    let mut acc = 0.0;
    for j in 0..a.columns() {
        for i in 0..a.rows() {
            acc = op.apply(acc, a.load(i, j));
        }
    }
    acc
}

/// `dest[i, 0]` = fold of row `i` of `a`.
///
/// # Errors
/// `InvalidArgument` unless `dest` is `a.rows() x 1`.
pub fn reduce_rows<O>(a: &MatrixView, dest: &MatrixView, op: &O) -> Result<()>
where
    O: ReductionOperator + ?Sized,
{
    check_reduction_target(dest, (a.rows(), 1), "row reduction")?;
    if let Some(kernel) = op.kernel() {
        if a.is_dense(Layout::RowMajor) && dest.is_dense(Layout::ColumnMajor) {
            log::trace!("reduce_rows {:?}: kernel", a.shape());
            kernel.reduce_vector(flat(a), flat(dest), a.columns());
            return Ok(());
        }
    }
    log::trace!("reduce_rows {:?}: strided loop", a.shape());
    for i in 0..a.rows() {
        let mut acc = 0.0;
        for j in 0..a.columns() {
            acc = op.apply(acc, a.load(i, j));
        }
        dest.store(i, 0, acc);
    }
    Ok(())
}

/// `dest[0, j]` = fold of column `j` of `a`.
///
/// # Errors
/// `InvalidArgument` unless `dest` is `1 x a.columns()`.
pub fn reduce_columns<O>(a: &MatrixView, dest: &MatrixView, op: &O) -> Result<()>
where
    O: ReductionOperator + ?Sized,
{
    check_reduction_target(dest, (1, a.columns()), "column reduction")?;
    if let Some(kernel) = op.kernel() {
        if a.is_dense(Layout::ColumnMajor) && dest.is_dense(Layout::RowMajor) {
            log::trace!("reduce_columns {:?}: kernel", a.shape());
            kernel.reduce_vector(flat(a), flat(dest), a.rows());
            return Ok(());
        }
    }
    log::trace!("reduce_columns {:?}: strided loop", a.shape());
    for j in 0..a.columns() {
        let mut acc = 0.0;
        for i in 0..a.rows() {
            acc = op.apply(acc, a.load(i, j));
        }
        dest.store(0, j, acc);
    }
    Ok(())
}

/// Column reduction with a per-column accumulator of any type.
///
/// For each column `j`: `seed(j)` creates the state, `accumulate` folds the
/// column top to bottom, and `finish` turns the state into `dest[0, j]`.
///
/// # Errors
/// `InvalidArgument` unless `dest` is `1 x a.columns()`.
pub fn reduce_columns_staged<S, Seed, Acc, Fin>(
    a: &MatrixView,
    dest: &MatrixView,
    mut seed: Seed,
    mut accumulate: Acc,
    mut finish: Fin,
) -> Result<()>
where
    Seed: FnMut(usize) -> S,
    Acc: FnMut(S, f64) -> S,
    Fin: FnMut(S) -> f64,
{
    check_reduction_target(dest, (1, a.columns()), "column reduction")?;
    for j in 0..a.columns() {
        let mut state = seed(j);
        for i in 0..a.rows() {
            state = accumulate(state, a.load(i, j));
        }
        dest.store(0, j, finish(state));
    }
    Ok(())
}

/// Sum of all elements.
pub fn sum(a: &MatrixView) -> f64 {
    reduce_full(a, &ReductionKernel::new(|acc, x| acc + x))
}

/// Arithmetic mean of all elements.
pub fn mean(a: &MatrixView) -> f64 {
    sum(a) / a.len() as f64
}

/// Per-column means into the `1 x columns` row `dest`.
pub fn column_means(a: &MatrixView, dest: &MatrixView) -> Result<()> {
    reduce_columns(a, dest, &ReductionKernel::new(|acc, x| acc + x))?;
    let rows = a.rows() as f64;
    map_inplace(dest, &|s: f64| s / rows)
}

/// Per-column standard deviation around the given column `means`.
///
/// With `bias_corrected` the squared deviations are divided by `rows - 1`,
/// otherwise by `rows`. A single-row matrix with `bias_corrected` yields NaN.
///
/// # Errors
/// `InvalidArgument` unless `means` and `dest` are both `1 x a.columns()`.
pub fn column_std(
    a: &MatrixView,
    means: &MatrixView,
    dest: &MatrixView,
    bias_corrected: bool,
) -> Result<()> {
    check_reduction_target(means, (1, a.columns()), "column means")?;
    let denominator = if bias_corrected {
        a.rows() as f64 - 1.0
    } else {
        a.rows() as f64
    };
    reduce_columns_staged(
        a,
        dest,
        |j| (means.load(0, j), 0.0),
        |(m, squares): (f64, f64), x: f64| (m, squares + (x - m) * (x - m)),
        |(_, squares): (f64, f64)| (squares / denominator).sqrt(),
    )
}

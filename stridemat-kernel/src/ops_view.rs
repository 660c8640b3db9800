//! Copying, transposition, concatenation and element visitors on views.

use stridemat_view::{Allocator, MatrixError, MatrixView, Result};

use crate::broadcast::{map_inplace, map_into, zip_map2_inplace};
use crate::kernel::{BinaryKernel, UnaryKernel};

/// Lowest and highest buffer index a view touches.
fn address_span(view: &MatrixView) -> (usize, usize) {
    let (last_row, last_column) = (view.rows() - 1, view.columns() - 1);
    let corners = [
        view.linear_index(0, 0),
        view.linear_index(last_row, 0),
        view.linear_index(0, last_column),
        view.linear_index(last_row, last_column),
    ];
    let min = corners.iter().copied().min().unwrap_or(0);
    let max = corners.iter().copied().max().unwrap_or(0);
    (min, max)
}

/// Whether two views may share buffer elements. Interleaved but disjoint
/// regions of one buffer count as overlapping.
fn may_overlap(a: &MatrixView, b: &MatrixView) -> bool {
    if !a.buffer().ptr_eq(b.buffer()) {
        return false;
    }
    let (a_min, a_max) = address_span(a);
    let (b_min, b_max) = address_span(b);
    a_min <= b_max && b_min <= a_max
}

/// Element-by-element copy of `src` into `dest`, each through its own strides.
///
/// # Errors
/// `ShapeMismatch` unless the shapes are identical.
pub fn copy_into(src: &MatrixView, dest: &MatrixView) -> Result<()> {
    if src.shape() != dest.shape() {
        return Err(MatrixError::ShapeMismatch {
            left: src.shape(),
            right: dest.shape(),
        });
    }
    map_into(dest, src, &UnaryKernel::new(|x| x))
}

/// `dest[j, i] = src[i, j]`.
///
/// # Errors
/// `ShapeMismatch` unless `dest` is `src.columns() x src.rows()`;
/// `InvalidArgument` when `dest` shares storage with `src`.
pub fn transpose_into(src: &MatrixView, dest: &MatrixView) -> Result<()> {
    let expected = (src.columns(), src.rows());
    if dest.shape() != expected {
        return Err(MatrixError::ShapeMismatch {
            left: expected,
            right: dest.shape(),
        });
    }
    if may_overlap(src, dest) {
        return Err(MatrixError::InvalidArgument(
            "transpose destination overlaps its source".into(),
        ));
    }
    for j in 0..src.columns() {
        for i in 0..src.rows() {
            dest.store(j, i, src.load(i, j));
        }
    }
    Ok(())
}

/// Transpose of `src` in fresh column-major storage from `alloc`.
pub fn transpose(src: &MatrixView, alloc: &dyn Allocator) -> Result<MatrixView> {
    let dest = MatrixView::new(alloc, src.columns(), src.rows())?;
    transpose_into(src, &dest)?;
    Ok(dest)
}

/// Stack `a` on top of `b` into the top rows of `dest`.
///
/// # Errors
/// `ShapeMismatch` when `a` and `b` differ in column count, or `dest` does
/// not have the same column count and at least `a.rows() + b.rows()` rows.
pub fn concat_vertically(a: &MatrixView, b: &MatrixView, dest: &MatrixView) -> Result<()> {
    if a.columns() != b.columns() {
        return Err(MatrixError::ShapeMismatch {
            left: a.shape(),
            right: b.shape(),
        });
    }
    let needed = (a.rows() + b.rows(), a.columns());
    if dest.columns() != needed.1 || dest.rows() < needed.0 {
        return Err(MatrixError::ShapeMismatch {
            left: needed,
            right: dest.shape(),
        });
    }
    copy_into(a, &dest.sub_view(0, 0, a.rows(), a.columns())?)?;
    copy_into(b, &dest.sub_view(a.rows(), 0, b.rows(), b.columns())?)
}

/// Place `a` left of `b` in the leading columns of `dest`.
///
/// # Errors
/// `ShapeMismatch` when `a` and `b` differ in row count, or `dest` does not
/// have the same row count and at least `a.columns() + b.columns()` columns.
pub fn concat_horizontally(a: &MatrixView, b: &MatrixView, dest: &MatrixView) -> Result<()> {
    if a.rows() != b.rows() {
        return Err(MatrixError::ShapeMismatch {
            left: a.shape(),
            right: b.shape(),
        });
    }
    let needed = (a.rows(), a.columns() + b.columns());
    if dest.rows() != needed.0 || dest.columns() < needed.1 {
        return Err(MatrixError::ShapeMismatch {
            left: needed,
            right: dest.shape(),
        });
    }
    copy_into(a, &dest.sub_view(0, 0, a.rows(), a.columns())?)?;
    copy_into(b, &dest.sub_view(0, a.columns(), b.rows(), b.columns())?)
}

/// Call `f(i, j, a[i, j])` for every element, column by column.
pub fn for_each<F>(a: &MatrixView, mut f: F)
where
    F: FnMut(usize, usize, f64),
{
    for j in 0..a.columns() {
        for i in 0..a.rows() {
            f(i, j, a.load(i, j));
        }
    }
}

/// `a[i, j] = f(i, j, a[i, j])` for every element, column by column.
pub fn set_each<F>(a: &MatrixView, mut f: F)
where
    F: FnMut(usize, usize, f64) -> f64,
{
    for j in 0..a.columns() {
        for i in 0..a.rows() {
            a.store(i, j, f(i, j, a.load(i, j)));
        }
    }
}

/// Copy column `column` of `a` into `out[offset..offset + a.rows()]`.
///
/// # Errors
/// `IndexOutOfRange` for a column past the end; `InvalidArgument` when `out`
/// cannot hold the column at `offset`.
pub fn extract_column_into(
    a: &MatrixView,
    column: usize,
    out: &mut [f64],
    offset: usize,
) -> Result<()> {
    if column >= a.columns() {
        return Err(MatrixError::IndexOutOfRange {
            row: 0,
            column,
            rows: a.rows(),
            columns: a.columns(),
        });
    }
    let out_len = out.len();
    let target = offset
        .checked_add(a.rows())
        .and_then(|end| out.get_mut(offset..end))
        .ok_or_else(|| {
            MatrixError::InvalidArgument(format!(
                "{} elements at offset {offset} exceed output of length {out_len}",
                a.rows()
            ))
        })?;
    for (i, slot) in target.iter_mut().enumerate() {
        *slot = a.load(i, column);
    }
    Ok(())
}

/// `a += b` with `b` broadcast against `a`.
pub fn add_assign(a: &MatrixView, b: &MatrixView) -> Result<()> {
    zip_map2_inplace(a, b, &BinaryKernel::new(|x, y| x + y))
}

/// Set every element of `a` to `value`.
pub fn fill(a: &MatrixView, value: f64) -> Result<()> {
    map_inplace(a, &UnaryKernel::new(move |_| value))
}

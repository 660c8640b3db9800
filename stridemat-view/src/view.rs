//! Strided 2-D views over a shared [`Buffer`].
//!
//! An element `(i, j)` of a view lives at buffer index
//! `(row_offset + i) * row_stride + (column_offset + j) * column_stride`.
//! Sub-views keep the parent's strides and shift the offsets, so a view of a
//! view is described exactly like a view of the whole buffer.

use std::fmt;

use crate::buffer::{Allocator, Buffer};
use crate::metadata::{Conj, Diag, Metadata, Structure, Trans, Uplo};
use crate::{MatrixError, Result};

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that every address of a `rows x columns` window stays in `[0, len)`.
///
/// The address is affine in `(i, j)`, so its extremes sit on the corners.
fn validate_bounds(
    len: usize,
    rows: usize,
    columns: usize,
    offsets: (usize, usize),
    strides: (isize, isize),
) -> Result<()> {
    if rows == 0 || columns == 0 {
        return Ok(());
    }
    let row_term = |i: usize| -> Result<isize> {
        let i = isize::try_from(offsets.0 + i).map_err(|_| MatrixError::OffsetOverflow)?;
        i.checked_mul(strides.0).ok_or(MatrixError::OffsetOverflow)
    };
    let column_term = |j: usize| -> Result<isize> {
        let j = isize::try_from(offsets.1 + j).map_err(|_| MatrixError::OffsetOverflow)?;
        j.checked_mul(strides.1).ok_or(MatrixError::OffsetOverflow)
    };

    let (r0, r1) = (row_term(0)?, row_term(rows - 1)?);
    let (c0, c1) = (column_term(0)?, column_term(columns - 1)?);
    let min = r0
        .min(r1)
        .checked_add(c0.min(c1))
        .ok_or(MatrixError::OffsetOverflow)?;
    let max = r0
        .max(r1)
        .checked_add(c0.max(c1))
        .ok_or(MatrixError::OffsetOverflow)?;

    if min < 0 {
        return Err(MatrixError::BufferTooSmall { required: min, len });
    }
    if max as usize >= len {
        return Err(MatrixError::BufferTooSmall { required: max, len });
    }
    Ok(())
}

fn ensure_nonempty(rows: usize, columns: usize) -> Result<()> {
    if rows == 0 || columns == 0 {
        return Err(MatrixError::InvalidArgument(format!(
            "matrix dimensions must be positive, got {rows}x{columns}"
        )));
    }
    Ok(())
}

fn check_value_count(rows: usize, columns: usize, values: &[f64]) -> Result<()> {
    if values.len() != element_count(rows, columns)? {
        return Err(MatrixError::InvalidArgument(format!(
            "expected {} values for a {rows}x{columns} matrix, got {}",
            rows * columns,
            values.len()
        )));
    }
    Ok(())
}

fn element_count(rows: usize, columns: usize) -> Result<usize> {
    rows.checked_mul(columns).ok_or(MatrixError::OffsetOverflow)
}

/// Contiguous element order of a dense view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// First index varies fastest: `row_stride == 1`, `column_stride == rows`.
    ColumnMajor,
    /// Last index varies fastest: `column_stride == 1`, `row_stride == columns`.
    RowMajor,
}

impl Layout {
    /// `(row_stride, column_stride)` of a dense `rows x columns` matrix.
    #[inline]
    pub fn strides(self, rows: usize, columns: usize) -> (isize, isize) {
        match self {
            Layout::ColumnMajor => (1, rows as isize),
            Layout::RowMajor => (columns as isize, 1),
        }
    }
}

// ============================================================================
// MatrixView
// ============================================================================

/// Rectangular strided window into a shared [`Buffer`].
///
/// Shape and strides never change after construction; transformations return
/// new views over the same buffer. Cloning a view is cheap and shares the
/// buffer.
#[derive(Clone)]
pub struct MatrixView {
    buffer: Buffer,
    rows: usize,
    columns: usize,
    row_offset: usize,
    column_offset: usize,
    row_stride: isize,
    column_stride: isize,
    meta: Metadata,
}

impl fmt::Debug for MatrixView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixView")
            .field("shape", &self.shape())
            .field("offsets", &(self.row_offset, self.column_offset))
            .field("strides", &(self.row_stride, self.column_stride))
            .field("trans", &self.meta.trans)
            .finish()
    }
}

impl MatrixView {
    /// Allocate a zero-filled column-major `rows x columns` matrix.
    pub fn new(alloc: &dyn Allocator, rows: usize, columns: usize) -> Result<Self> {
        Self::with_layout(alloc, rows, columns, Layout::ColumnMajor)
    }

    /// Allocate a zero-filled `rows x columns` matrix with the given layout.
    pub fn with_layout(
        alloc: &dyn Allocator,
        rows: usize,
        columns: usize,
        layout: Layout,
    ) -> Result<Self> {
        ensure_nonempty(rows, columns)?;
        let buffer = alloc.allocate(element_count(rows, columns)?);
        let (row_stride, column_stride) = layout.strides(rows, columns);
        Self::from_parts(buffer, rows, columns, row_stride, column_stride)
    }

    /// Column-major matrix whose storage is a copy of `values` (already
    /// in column-major order).
    pub fn from_column_major(
        alloc: &dyn Allocator,
        rows: usize,
        columns: usize,
        values: &[f64],
    ) -> Result<Self> {
        check_value_count(rows, columns, values)?;
        let view = Self::new(alloc, rows, columns)?;
        for (cell, &v) in view.buffer.cells().iter().zip(values) {
            cell.set(v);
        }
        Ok(view)
    }

    /// Column-major matrix filled from `values` given in row-major order.
    pub fn from_row_major(
        alloc: &dyn Allocator,
        rows: usize,
        columns: usize,
        values: &[f64],
    ) -> Result<Self> {
        check_value_count(rows, columns, values)?;
        let view = Self::new(alloc, rows, columns)?;
        for i in 0..rows {
            for j in 0..columns {
                view.store(i, j, values[i * columns + j]);
            }
        }
        Ok(view)
    }

    /// Wrap an existing buffer with explicit strides and zero offsets.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero dimension, `BufferTooSmall` when some
    /// element would be addressed outside the buffer.
    pub fn from_parts(
        buffer: Buffer,
        rows: usize,
        columns: usize,
        row_stride: isize,
        column_stride: isize,
    ) -> Result<Self> {
        ensure_nonempty(rows, columns)?;
        validate_bounds(
            buffer.len(),
            rows,
            columns,
            (0, 0),
            (row_stride, column_stride),
        )?;
        Ok(Self {
            buffer,
            rows,
            columns,
            row_offset: 0,
            column_offset: 0,
            row_stride,
            column_stride,
            meta: Metadata::default(),
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// `(rows, columns)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    /// Number of elements in the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.columns
    }

    /// Views always have at least one element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn row_offset(&self) -> usize {
        self.row_offset
    }

    #[inline]
    pub fn column_offset(&self) -> usize {
        self.column_offset
    }

    #[inline]
    pub fn row_stride(&self) -> isize {
        self.row_stride
    }

    #[inline]
    pub fn column_stride(&self) -> isize {
        self.column_stride
    }

    /// The shared buffer this view addresses.
    #[inline]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    #[inline]
    pub fn is_zero_offset(&self) -> bool {
        self.row_offset == 0 && self.column_offset == 0
    }

    /// Buffer index of element `(i, j)`. Callers guarantee `i < rows`, `j < columns`.
    #[inline]
    pub fn linear_index(&self, i: usize, j: usize) -> usize {
        let index = (self.row_offset + i) as isize * self.row_stride
            + (self.column_offset + j) as isize * self.column_stride;
        index as usize
    }

    /// Dense layout of a zero-offset view whose elements fill
    /// `buffer[0..rows * columns]` without gaps.
    ///
    /// Column-major is reported first when both apply (single row or column).
    pub fn dense_layout(&self) -> Option<Layout> {
        [Layout::ColumnMajor, Layout::RowMajor]
            .into_iter()
            .find(|&layout| self.is_dense(layout))
    }

    /// Whether the view is zero-offset and fills `buffer[0..rows * columns]`
    /// in `layout` order. Strides along a unit dimension are ignored.
    pub fn is_dense(&self, layout: Layout) -> bool {
        let (row_stride, column_stride) = layout.strides(self.rows, self.columns);
        self.is_zero_offset()
            && (self.rows == 1 || self.row_stride == row_stride)
            && (self.columns == 1 || self.column_stride == column_stride)
    }

    /// Whether `other` addresses exactly the same elements in the same order.
    pub fn same_region(&self, other: &MatrixView) -> bool {
        self.buffer.ptr_eq(&other.buffer)
            && self.shape() == other.shape()
            && self.row_offset == other.row_offset
            && self.column_offset == other.column_offset
            && self.row_stride == other.row_stride
            && self.column_stride == other.column_stride
    }

    fn check_index(&self, i: usize, j: usize) -> Result<()> {
        if i >= self.rows || j >= self.columns {
            return Err(MatrixError::IndexOutOfRange {
                row: i,
                column: j,
                rows: self.rows,
                columns: self.columns,
            });
        }
        Ok(())
    }

    /// Bounds-checked element read.
    pub fn get(&self, i: usize, j: usize) -> Result<f64> {
        self.check_index(i, j)?;
        Ok(self.load(i, j))
    }

    /// Bounds-checked element write.
    pub fn set(&self, i: usize, j: usize, value: f64) -> Result<()> {
        self.check_index(i, j)?;
        self.store(i, j, value);
        Ok(())
    }

    /// Unchecked (by index) element read; the buffer access itself is still
    /// bounds-checked.
    #[inline]
    pub fn load(&self, i: usize, j: usize) -> f64 {
        self.buffer.load(self.linear_index(i, j))
    }

    #[inline]
    pub fn store(&self, i: usize, j: usize, value: f64) {
        self.buffer.store(self.linear_index(i, j), value)
    }

    /// View of the `rows x columns` region starting at `(i, j)`.
    ///
    /// The result shares this view's buffer and strides.
    ///
    /// # Errors
    /// `InvalidArgument` when the region has a zero dimension or does not fit
    /// inside this view.
    pub fn sub_view(&self, i: usize, j: usize, rows: usize, columns: usize) -> Result<Self> {
        ensure_nonempty(rows, columns)?;
        let fits_rows = i.checked_add(rows).is_some_and(|end| end <= self.rows);
        let fits_columns = j.checked_add(columns).is_some_and(|end| end <= self.columns);
        if !fits_rows || !fits_columns {
            return Err(MatrixError::InvalidArgument(format!(
                "region ({i}, {j}) + {rows}x{columns} exceeds {}x{} matrix",
                self.rows, self.columns
            )));
        }
        Ok(Self {
            buffer: self.buffer.clone(),
            rows,
            columns,
            row_offset: self.row_offset + i,
            column_offset: self.column_offset + j,
            row_stride: self.row_stride,
            column_stride: self.column_stride,
            meta: self.meta,
        })
    }

    /// Copy the elements out in column-major order.
    pub fn to_vec_column_major(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        for j in 0..self.columns {
            for i in 0..self.rows {
                out.push(self.load(i, j));
            }
        }
        out
    }

    /// Copy the elements out in row-major order.
    pub fn to_vec_row_major(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len());
        for i in 0..self.rows {
            for j in 0..self.columns {
                out.push(self.load(i, j));
            }
        }
        out
    }

    /// Rows as nested vectors, mostly for assertions and debugging.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows)
            .map(|i| (0..self.columns).map(|j| self.load(i, j)).collect())
            .collect()
    }

    /// Same shape and every pair of elements within `epsilon` of each other.
    pub fn equals_within(&self, other: &MatrixView, epsilon: f64) -> bool {
        self.elementwise_all(other, |x, y| (x - y).abs() <= epsilon)
    }

    fn elementwise_all(&self, other: &MatrixView, pred: impl Fn(f64, f64) -> bool) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        (0..self.columns)
            .all(|j| (0..self.rows).all(|i| pred(self.load(i, j), other.load(i, j))))
    }
}

/// Element equality: same shape and every pair of elements `==` as `f64`.
/// Strides, offsets and metadata are not compared.
impl PartialEq for MatrixView {
    fn eq(&self, other: &Self) -> bool {
        self.elementwise_all(other, |x, y| x == y)
    }
}

// Metadata accessors. Each `with_*` returns a new view over the same region.
impl MatrixView {
    #[inline]
    pub fn trans(&self) -> Trans {
        self.meta.trans
    }

    /// Transpose bit only, conjugation dropped.
    #[inline]
    pub fn trans_only(&self) -> Trans {
        if self.meta.trans.is_transposed() {
            Trans::Transpose
        } else {
            Trans::NoTranspose
        }
    }

    #[inline]
    pub fn conj(&self) -> Conj {
        if self.meta.trans.is_conjugated() {
            Conj::Conjugate
        } else {
            Conj::NoConjugate
        }
    }

    #[inline]
    pub fn structure(&self) -> Structure {
        self.meta.structure
    }

    #[inline]
    pub fn uplo(&self) -> Uplo {
        self.meta.uplo
    }

    #[inline]
    pub fn diag(&self) -> Diag {
        self.meta.diag
    }

    #[inline]
    pub fn diag_offset(&self) -> isize {
        self.meta.diag_offset
    }

    pub fn with_trans(&self, trans: Trans) -> Self {
        let mut view = self.clone();
        view.meta.trans = trans;
        view
    }

    /// Replace the transpose bit, keeping the conjugation.
    pub fn with_trans_only(&self, trans: Trans) -> Self {
        let mut view = self.clone();
        view.meta.trans = self.meta.trans.with_transpose(trans.is_transposed());
        view
    }

    pub fn with_structure(&self, structure: Structure) -> Self {
        let mut view = self.clone();
        view.meta.structure = structure;
        view
    }

    pub fn with_uplo(&self, uplo: Uplo) -> Self {
        let mut view = self.clone();
        view.meta.uplo = uplo;
        view
    }

    pub fn with_diag(&self, diag: Diag) -> Self {
        let mut view = self.clone();
        view.meta.diag = diag;
        view
    }

    pub fn with_diag_offset(&self, diag_offset: isize) -> Self {
        let mut view = self.clone();
        view.meta.diag_offset = diag_offset;
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Heap;

    fn iota(rows: usize, columns: usize) -> MatrixView {
        let values: Vec<f64> = (0..rows * columns).map(|v| v as f64).collect();
        MatrixView::from_row_major(&Heap, rows, columns, &values).unwrap()
    }

    #[test]
    fn test_new_is_column_major() {
        let m = MatrixView::new(&Heap, 10, 4).unwrap();
        assert_eq!(m.row_stride(), 1);
        assert_eq!(m.column_stride(), 10);
        assert_eq!(m.buffer().len(), 40);
        assert_eq!(m.linear_index(2, 2), 22);
        assert_eq!(m.dense_layout(), Some(Layout::ColumnMajor));
    }

    #[test]
    fn test_row_major_layout() {
        let m = MatrixView::with_layout(&Heap, 3, 5, Layout::RowMajor).unwrap();
        assert_eq!((m.row_stride(), m.column_stride()), (5, 1));
        assert_eq!(m.linear_index(1, 2), 7);
        assert_eq!(m.dense_layout(), Some(Layout::RowMajor));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = MatrixView::new(&Heap, 0, 3).unwrap_err();
        assert!(matches!(err, MatrixError::InvalidArgument(_)));
    }

    #[test]
    fn test_get_set_bounds() {
        let m = iota(2, 3);
        assert_eq!(m.get(1, 2).unwrap(), 5.0);
        m.set(0, 1, -1.0).unwrap();
        assert_eq!(m.get(0, 1).unwrap(), -1.0);
        assert_eq!(
            m.get(2, 0).unwrap_err(),
            MatrixError::IndexOutOfRange {
                row: 2,
                column: 0,
                rows: 2,
                columns: 3
            }
        );
        assert!(m.set(0, 3, 0.0).is_err());
    }

    #[test]
    fn test_sub_view_shares_buffer() {
        let m = iota(4, 4);
        let s = m.sub_view(1, 2, 3, 2).unwrap();
        assert_eq!(s.shape(), (3, 2));
        assert_eq!((s.row_offset(), s.column_offset()), (1, 2));
        assert!(!s.is_zero_offset());
        assert_eq!(s.dense_layout(), None);
        assert_eq!(s.get(0, 0).unwrap(), m.get(1, 2).unwrap());
        s.set(2, 1, 99.0).unwrap();
        assert_eq!(m.get(3, 3).unwrap(), 99.0);
    }

    #[test]
    fn test_sub_view_of_sub_view() {
        let m = iota(5, 5);
        let s = m.sub_view(1, 1, 4, 4).unwrap();
        let t = s.sub_view(1, 2, 2, 2).unwrap();
        assert_eq!(t.get(0, 0).unwrap(), m.get(2, 3).unwrap());
        assert_eq!(t.get(1, 1).unwrap(), m.get(3, 4).unwrap());
    }

    #[test]
    fn test_sub_view_out_of_bounds() {
        let m = iota(3, 3);
        assert!(matches!(
            m.sub_view(2, 0, 2, 1),
            Err(MatrixError::InvalidArgument(_))
        ));
        assert!(matches!(
            m.sub_view(0, 0, 0, 1),
            Err(MatrixError::InvalidArgument(_))
        ));
        assert!(m.sub_view(0, 0, 3, 3).unwrap().is_zero_offset());
    }

    #[test]
    fn test_from_parts_validates_bounds() {
        let buffer = Buffer::zeros(6);
        assert!(MatrixView::from_parts(buffer.clone(), 2, 3, 1, 2).is_ok());
        assert!(matches!(
            MatrixView::from_parts(buffer.clone(), 3, 3, 1, 3),
            Err(MatrixError::BufferTooSmall { .. })
        ));
        assert!(matches!(
            MatrixView::from_parts(buffer, 2, 2, -1, 2),
            Err(MatrixError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_from_column_major_values() {
        let m = MatrixView::from_column_major(&Heap, 2, 2, &[1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!(m.to_rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert!(MatrixView::from_column_major(&Heap, 2, 2, &[1.0]).is_err());
    }

    #[test]
    fn test_vectors_report_column_major() {
        let row = MatrixView::new(&Heap, 1, 4).unwrap();
        assert_eq!(row.dense_layout(), Some(Layout::ColumnMajor));
        assert!(row.is_dense(Layout::RowMajor));
        let strided_row = MatrixView::from_parts(Buffer::zeros(8), 1, 4, 1, 2).unwrap();
        assert_eq!(strided_row.dense_layout(), None);
    }

    #[test]
    fn test_same_region() {
        let m = iota(3, 3);
        assert!(m.same_region(&m.clone()));
        assert!(m.same_region(&m.sub_view(0, 0, 3, 3).unwrap()));
        assert!(!m.same_region(&m.sub_view(0, 0, 2, 3).unwrap()));
        assert!(!m.same_region(&iota(3, 3)));
    }

    #[test]
    fn test_equality_ignores_layout() {
        let a = iota(2, 3);
        let b = MatrixView::from_column_major(&Heap, 2, 3, &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0])
            .unwrap();
        assert_eq!(a, b);
        b.set(1, 1, 4.0 + 1e-9).unwrap();
        assert_ne!(a, b);
        assert!(a.equals_within(&b, 1e-6));
        assert!(!a.equals_within(&b, 1e-12));
        assert_ne!(a, iota(3, 2));
        assert!(!a.equals_within(&iota(3, 2), 1.0));
    }

    #[test]
    fn test_metadata_builders_produce_new_views() {
        let m = iota(2, 2);
        let t = m.with_trans(Trans::ConjNoTranspose).with_trans_only(Trans::Transpose);
        assert_eq!(t.trans(), Trans::ConjTranspose);
        assert_eq!(t.conj(), Conj::Conjugate);
        assert_eq!(m.trans(), Trans::NoTranspose);
        let u = m
            .with_structure(Structure::Triangular)
            .with_uplo(Uplo::Lower)
            .with_diag(Diag::Unit)
            .with_diag_offset(-1);
        assert_eq!(u.structure(), Structure::Triangular);
        assert_eq!(u.uplo(), Uplo::Lower);
        assert_eq!(u.diag(), Diag::Unit);
        assert_eq!(u.diag_offset(), -1);
        assert!(u.buffer().ptr_eq(m.buffer()));
    }
}

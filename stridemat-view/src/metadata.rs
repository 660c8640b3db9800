//! Descriptive flags carried by a view.
//!
//! None of these change how elements are addressed. They tell a
//! linear-algebra backend how to interpret an operand (transposed,
//! triangular, unit diagonal, ...).

/// Transpose/conjugate treatment of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Trans {
    #[default]
    NoTranspose,
    Transpose,
    ConjNoTranspose,
    ConjTranspose,
}

impl Trans {
    /// Whether rows and columns are swapped.
    #[inline]
    pub fn is_transposed(self) -> bool {
        matches!(self, Trans::Transpose | Trans::ConjTranspose)
    }

    /// Whether elements are conjugated.
    #[inline]
    pub fn is_conjugated(self) -> bool {
        matches!(self, Trans::ConjNoTranspose | Trans::ConjTranspose)
    }

    /// Keep the conjugation, replace the transpose bit.
    pub fn with_transpose(self, transpose: bool) -> Trans {
        match (self.is_conjugated(), transpose) {
            (false, false) => Trans::NoTranspose,
            (false, true) => Trans::Transpose,
            (true, false) => Trans::ConjNoTranspose,
            (true, true) => Trans::ConjTranspose,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Conj {
    #[default]
    NoConjugate,
    Conjugate,
}

/// Matrix structure hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Structure {
    #[default]
    General,
    Hermitian,
    Symmetric,
    Triangular,
}

/// Which part of a structured matrix is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Uplo {
    Zeros,
    Lower,
    Upper,
    #[default]
    Dense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Diag {
    #[default]
    NonUnit,
    Unit,
}

/// All metadata flags of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Metadata {
    pub(crate) trans: Trans,
    pub(crate) structure: Structure,
    pub(crate) uplo: Uplo,
    pub(crate) diag: Diag,
    pub(crate) diag_offset: isize,
}

//! Block-partitioned symmetric matrix.
//!
//! Storage is one dense square matrix. Diagonal blocks are kept in full, off-diagonal
//! blocks only above the diagonal; the lower triangle of the off-diagonal region is never
//! read. Updates addressed below the diagonal are transposed into the upper triangle.

use crate::error::{SmartFactorError, SmartFactorResult};
use nalgebra::{DMatrix, Dim, Matrix, Storage};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricBlockMatrix {
    dims: Vec<usize>,
    offsets: Vec<usize>,
    matrix: DMatrix<f64>,
}

impl SymmetricBlockMatrix {
    /// Zero matrix with the given block dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        let offsets = Self::offsets_of(&dims);
        let size = offsets[dims.len()];
        SymmetricBlockMatrix {
            dims,
            offsets,
            matrix: DMatrix::zeros(size, size),
        }
    }

    /// Wrap a dense symmetric matrix. Only its upper triangle is used.
    pub fn from_dense(dims: Vec<usize>, matrix: DMatrix<f64>) -> SmartFactorResult<Self> {
        let offsets = Self::offsets_of(&dims);
        let size = offsets[dims.len()];
        if matrix.nrows() != size || matrix.ncols() != size {
            return Err(SmartFactorError::size_mismatch(
                "symmetric block matrix rows",
                size,
                matrix.nrows().max(matrix.ncols()),
            ));
        }
        Ok(SymmetricBlockMatrix {
            dims,
            offsets,
            matrix,
        })
    }

    fn offsets_of(dims: &[usize]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(dims.len() + 1);
        offsets.push(0);
        for dim in dims {
            offsets.push(offsets[offsets.len() - 1] + dim);
        }
        offsets
    }

    pub fn n_blocks(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of scalar rows (and columns).
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn offset(&self, block: usize) -> usize {
        self.offsets[block]
    }

    fn check_block(&self, block: usize) -> SmartFactorResult<()> {
        if block < self.dims.len() {
            Ok(())
        } else {
            Err(SmartFactorError::LinearAlgebra(format!(
                "block index {} out of range for {} blocks",
                block,
                self.dims.len()
            )))
        }
    }

    fn check_shape<R: Dim, C: Dim, S: Storage<f64, R, C>>(
        &self,
        i: usize,
        j: usize,
        block: &Matrix<f64, R, C, S>,
    ) -> SmartFactorResult<()> {
        self.check_block(i)?;
        self.check_block(j)?;
        if block.nrows() != self.dims[i] {
            return Err(SmartFactorError::size_mismatch(
                "block rows",
                self.dims[i],
                block.nrows(),
            ));
        }
        if block.ncols() != self.dims[j] {
            return Err(SmartFactorError::size_mismatch(
                "block columns",
                self.dims[j],
                block.ncols(),
            ));
        }
        Ok(())
    }

    /// Diagonal block (i, i), symmetrized from its upper triangle.
    pub fn diagonal_block(&self, i: usize) -> DMatrix<f64> {
        let (offset, dim) = (self.offsets[i], self.dims[i]);
        let mut block = self
            .matrix
            .view((offset, offset), (dim, dim))
            .upper_triangle();
        block.fill_lower_triangle_with_upper_triangle();
        block
    }

    /// Stored block (i, j) with i < j.
    pub fn above_diagonal_block(&self, i: usize, j: usize) -> DMatrix<f64> {
        self.matrix
            .view((self.offsets[i], self.offsets[j]), (self.dims[i], self.dims[j]))
            .into_owned()
    }

    /// Block (i, j) of the full symmetric matrix, for any i and j.
    pub fn block(&self, i: usize, j: usize) -> DMatrix<f64> {
        match i.cmp(&j) {
            std::cmp::Ordering::Equal => self.diagonal_block(i),
            std::cmp::Ordering::Less => self.above_diagonal_block(i, j),
            std::cmp::Ordering::Greater => self.above_diagonal_block(j, i).transpose(),
        }
    }

    /// Add `block` to diagonal block (i, i).
    pub fn update_diagonal_block<R: Dim, C: Dim, S: Storage<f64, R, C>>(
        &mut self,
        i: usize,
        block: &Matrix<f64, R, C, S>,
    ) -> SmartFactorResult<()> {
        self.check_shape(i, i, block)?;
        let offset = self.offsets[i];
        for c in 0..block.ncols() {
            for r in 0..block.nrows() {
                self.matrix[(offset + r, offset + c)] += block[(r, c)];
            }
        }
        Ok(())
    }

    /// Add `block` to off-diagonal block (i, j); when i > j its transpose goes to (j, i).
    pub fn update_off_diagonal_block<R: Dim, C: Dim, S: Storage<f64, R, C>>(
        &mut self,
        i: usize,
        j: usize,
        block: &Matrix<f64, R, C, S>,
    ) -> SmartFactorResult<()> {
        if i == j {
            return Err(SmartFactorError::LinearAlgebra(format!(
                "off-diagonal update addressed diagonal block {i}"
            )));
        }
        self.check_shape(i, j, block)?;

        let (row_offset, col_offset) = (self.offsets[i], self.offsets[j]);
        for c in 0..block.ncols() {
            for r in 0..block.nrows() {
                if i < j {
                    self.matrix[(row_offset + r, col_offset + c)] += block[(r, c)];
                } else {
                    self.matrix[(col_offset + c, row_offset + r)] += block[(r, c)];
                }
            }
        }
        Ok(())
    }

    /// Full dense symmetric matrix.
    pub fn selfadjoint_view(&self) -> DMatrix<f64> {
        let mut full = self.matrix.upper_triangle();
        full.fill_lower_triangle_with_upper_triangle();
        full
    }

    pub fn set_zero(&mut self) {
        self.matrix.fill(0.0);
    }

    /// True if every entry of the upper triangle is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.matrix.upper_triangle().iter().all(|&x| x == 0.0)
    }

    /// Same block layout and symmetric contents within `tolerance` (max abs difference).
    pub fn equals(&self, other: &Self, tolerance: f64) -> bool {
        self.dims == other.dims
            && (self.selfadjoint_view() - other.selfadjoint_view()).amax() <= tolerance
    }
}

impl fmt::Display for SymmetricBlockMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SymmetricBlockMatrix(dims: {:?})", self.dims)?;
        write!(f, "{}", self.selfadjoint_view())
    }
}

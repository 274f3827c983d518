//! Quadratic factor in information form.
//!
//! A Hessian factor over keys `k₁ … kₙ` stores the augmented symmetric matrix
//!
//! ```text
//! [ G   g ]
//! [ gᵀ  f ]
//! ```
//!
//! with block dimensions `[6, …, 6, 1]`, and represents the error
//!
//! ```text
//! E(δ) = ½ δᵀ G δ - δᵀ g + ½ f
//! ```
//!
//! for a stacked tangent update `δ` of the n poses.

use crate::core::key::Key;
use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::POSE_DIM;
use crate::linalg::sparse::{dense_to_sparse, SparseMatrix};
use crate::linalg::symmetric_block::SymmetricBlockMatrix;
use nalgebra::{DMatrix, DVector};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct HessianFactor {
    keys: Vec<Key>,
    augmented: SymmetricBlockMatrix,
}

impl HessianFactor {
    /// Package keys and an augmented matrix laid out as `[6; keys.len()] + [1]`.
    pub fn new(keys: Vec<Key>, augmented: SymmetricBlockMatrix) -> SmartFactorResult<Self> {
        if augmented.n_blocks() != keys.len() + 1 {
            return Err(SmartFactorError::size_mismatch(
                "hessian blocks",
                keys.len() + 1,
                augmented.n_blocks(),
            ));
        }
        let (pose_dims, last) = augmented.dims().split_at(keys.len());
        if let Some(&dim) = pose_dims.iter().find(|&&dim| dim != POSE_DIM) {
            return Err(SmartFactorError::size_mismatch("pose block dimension", POSE_DIM, dim));
        }
        if last[0] != 1 {
            return Err(SmartFactorError::size_mismatch("augmented block dimension", 1, last[0]));
        }

        Ok(HessianFactor { keys, augmented })
    }

    /// All-zero factor over `keys`.
    pub fn zero(keys: Vec<Key>) -> Self {
        let mut dims = vec![POSE_DIM; keys.len()];
        dims.push(1);
        HessianFactor {
            keys,
            augmented: SymmetricBlockMatrix::new(dims),
        }
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn augmented(&self) -> &SymmetricBlockMatrix {
        &self.augmented
    }

    fn pose_dim(&self) -> usize {
        POSE_DIM * self.keys.len()
    }

    /// Information matrix G (6n × 6n).
    pub fn information(&self) -> DMatrix<f64> {
        let n = self.pose_dim();
        self.augmented
            .selfadjoint_view()
            .view((0, 0), (n, n))
            .into_owned()
    }

    /// Linear term g (6n).
    pub fn linear_term(&self) -> DVector<f64> {
        let n = self.pose_dim();
        self.augmented
            .selfadjoint_view()
            .view((0, n), (n, 1))
            .column(0)
            .into_owned()
    }

    /// Constant term f.
    pub fn constant_term(&self) -> f64 {
        let n = self.pose_dim();
        self.augmented.selfadjoint_view()[(n, n)]
    }

    /// Block (i, j) of the information matrix.
    pub fn information_block(&self, i: usize, j: usize) -> DMatrix<f64> {
        self.augmented.block(i, j)
    }

    /// Error `½ δᵀGδ - δᵀg + ½f` at the stacked tangent update `delta`.
    pub fn error(&self, delta: &DVector<f64>) -> SmartFactorResult<f64> {
        let n = self.pose_dim();
        if delta.nrows() != n {
            return Err(SmartFactorError::size_mismatch("tangent update", n, delta.nrows()));
        }
        let quadratic = delta.dot(&(self.information() * delta));
        Ok(0.5 * quadratic - delta.dot(&self.linear_term()) + 0.5 * self.constant_term())
    }

    pub fn is_zero(&self) -> bool {
        self.augmented.is_zero()
    }

    /// Full symmetric augmented matrix as a faer sparse matrix.
    pub fn to_sparse(&self) -> SmartFactorResult<SparseMatrix> {
        dense_to_sparse(&self.augmented.selfadjoint_view(), 0.0)
    }

    /// Same keys and augmented matrix within `tolerance`.
    pub fn equals(&self, other: &Self, tolerance: f64) -> bool {
        self.keys == other.keys && self.augmented.equals(&other.augmented, tolerance)
    }
}

impl fmt::Display for HessianFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys.iter().map(Key::to_string).collect();
        writeln!(f, "HessianFactor(keys: [{}])", keys.join(", "))?;
        write!(f, "{}", self.augmented)
    }
}

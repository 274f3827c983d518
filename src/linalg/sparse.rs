//! Export of dense symmetric blocks to faer sparse matrices.

use crate::error::{SmartFactorError, SmartFactorResult};
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::DMatrix;

/// Type alias for sparse matrices using faer
pub type SparseMatrix = SparseColMat<usize, f64>;

/// Create sparse matrix from triplets using faer
pub fn triplets_to_sparse(
    rows: usize,
    cols: usize,
    triplets: &[Triplet<usize, usize, f64>],
) -> SmartFactorResult<SparseMatrix> {
    SparseColMat::try_new_from_triplets(rows, cols, triplets).map_err(|e| {
        SmartFactorError::LinearAlgebra(format!("Failed to create sparse matrix: {:?}", e))
    })
}

/// Sparse copy of a dense matrix, keeping entries whose magnitude exceeds `drop_tolerance`.
///
/// Both triangles are exported, so a symmetric input gives a symmetric sparse matrix.
pub fn dense_to_sparse(matrix: &DMatrix<f64>, drop_tolerance: f64) -> SmartFactorResult<SparseMatrix> {
    let mut triplets = Vec::new();
    for col in 0..matrix.ncols() {
        for row in 0..matrix.nrows() {
            let value = matrix[(row, col)];
            if value.abs() > drop_tolerance {
                triplets.push(Triplet::new(row, col, value));
            }
        }
    }
    triplets_to_sparse(matrix.nrows(), matrix.ncols(), &triplets)
}

/// Dense copy of a sparse matrix.
pub fn sparse_to_dense(sparse: &SparseMatrix) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(sparse.nrows(), sparse.ncols());
    let symbolic = sparse.symbolic();
    for col in 0..sparse.ncols() {
        let row_indices = symbolic.row_idx_of_col_raw(col);
        let values = sparse.val_of_col(col);
        for (&row, &value) in row_indices.iter().zip(values) {
            dense[(row, col)] += value;
        }
    }
    dense
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_creation() {
        let triplets = vec![
            Triplet::new(0, 0, 1.0),
            Triplet::new(1, 1, 2.0),
            Triplet::new(2, 2, 3.0),
        ];
        let sparse = triplets_to_sparse(3, 3, &triplets).unwrap();
        assert_eq!(sparse.nrows(), 3);
        assert_eq!(sparse.ncols(), 3);
    }

    #[test]
    fn test_out_of_bounds_triplet_fails() {
        let triplets = vec![Triplet::new(5, 0, 1.0)];
        assert!(matches!(
            triplets_to_sparse(3, 3, &triplets),
            Err(SmartFactorError::LinearAlgebra(_))
        ));
    }

    #[test]
    fn test_dense_roundtrip_drops_zeros() {
        let dense = DMatrix::from_row_slice(3, 3, &[4.0, 0.0, 1.0, 0.0, 2.0, 0.0, 1.0, 0.0, 3.0]);
        let sparse = dense_to_sparse(&dense, 0.0).unwrap();

        let nnz: usize = (0..3).map(|col| sparse.val_of_col(col).len()).sum();
        assert_eq!(nnz, 5);
        assert_eq!(sparse_to_dense(&sparse), dense);
    }
}

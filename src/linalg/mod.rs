//! Linear algebra for landmark marginalization.
//!
//! - `symmetric_block`: block-partitioned symmetric storage ([`SymmetricBlockMatrix`])
//! - `schur`: landmark covariance and streamed Schur complement
//! - `sparse`: export to faer sparse matrices

pub mod schur;
pub mod sparse;
pub mod symmetric_block;

pub use schur::{compute_point_covariance, schur_complement, SchurAccumulator};
pub use sparse::SparseMatrix;
pub use symmetric_block::SymmetricBlockMatrix;

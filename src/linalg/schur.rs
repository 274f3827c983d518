//! Landmark elimination by Schur complement.
//!
//! Given per-view blocks of a whitened linear system in camera parameters `x` and one
//! landmark `p`,
//!
//! ```text
//! Fᵢ x_i + Eᵢ p = bᵢ        (Fᵢ: 3×D, Eᵢ: 3×3, bᵢ: 3)
//! ```
//!
//! the landmark is eliminated through its (optionally damped) covariance
//! `P = (EᵀE + damping)⁻¹`. With `Gᵢ = EᵢᵀFᵢ` and `Eᵀb = Σ Eᵢᵀbᵢ`, the reduced system is
//!
//! ```text
//! block(i, j) = δᵢⱼ FᵢᵀFᵢ - Gᵢᵀ P Gⱼ
//! linear(i)   = Fᵢᵀbᵢ - Gᵢᵀ P Eᵀb
//! constant    = bᵀb - (Eᵀb)ᵀ P Eᵀb
//! ```
//!
//! Views are independent given the landmark, so the cross terms `FᵢᵀFⱼ` vanish for i ≠ j.
//! The result is streamed pair by pair into a [`SchurAccumulator`] so the full
//! `(D·m)²` matrix never has to exist.

use crate::error::SmartFactorResult;
use crate::linalg::symmetric_block::SymmetricBlockMatrix;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// Receives the blocks of a reduced (landmark-free) system.
pub trait SchurAccumulator<const D: usize> {
    /// Add block (i, j), i ≤ j, of the reduced information matrix.
    fn add_pair(&mut self, i: usize, j: usize, block: &SMatrix<f64, D, D>) -> SmartFactorResult<()>;

    /// Add the linear term of view i.
    fn add_linear(&mut self, i: usize, term: &SVector<f64, D>) -> SmartFactorResult<()>;

    /// Add the scalar constant term.
    fn add_constant(&mut self, constant: f64) -> SmartFactorResult<()>;
}

/// Landmark covariance `(EᵀE + damping)⁻¹`.
///
/// Damping is `λI`, or `λ diag(EᵀE)` when `diagonal_damping` is set. Returns `None` when
/// the damped matrix is not invertible.
pub fn compute_point_covariance(
    e_blocks: &[Matrix3<f64>],
    lambda: f64,
    diagonal_damping: bool,
) -> Option<Matrix3<f64>> {
    let mut ete: Matrix3<f64> = e_blocks.iter().map(|e| e.transpose() * e).sum();

    if diagonal_damping {
        let diagonal = ete.diagonal();
        for k in 0..3 {
            ete[(k, k)] += lambda * diagonal[k];
        }
    } else {
        for k in 0..3 {
            ete[(k, k)] += lambda;
        }
    }

    ete.try_inverse()
        .filter(|p| p.iter().all(|x| x.is_finite()))
}

/// Stream the Schur complement of the landmark into `accumulator`.
///
/// `f_blocks`, `e_blocks` and `b_blocks` must have the same length (one entry per view).
pub fn schur_complement<const D: usize, A: SchurAccumulator<D>>(
    f_blocks: &[SMatrix<f64, 3, D>],
    e_blocks: &[Matrix3<f64>],
    b_blocks: &[Vector3<f64>],
    point_covariance: &Matrix3<f64>,
    accumulator: &mut A,
) -> SmartFactorResult<()> {
    let g_blocks: Vec<SMatrix<f64, 3, D>> = e_blocks
        .iter()
        .zip(f_blocks)
        .map(|(e, f)| e.transpose() * f)
        .collect();
    let etb: Vector3<f64> = e_blocks
        .iter()
        .zip(b_blocks)
        .map(|(e, b)| e.transpose() * b)
        .sum();
    let p_etb = point_covariance * etb;

    for (i, (f_i, g_i)) in f_blocks.iter().zip(&g_blocks).enumerate() {
        let pg_i_t = g_i.transpose() * point_covariance;

        let diagonal = f_i.transpose() * f_i - pg_i_t * g_i;
        accumulator.add_pair(i, i, &diagonal)?;

        for (j, g_j) in g_blocks.iter().enumerate().skip(i + 1) {
            let off_diagonal = -(pg_i_t * g_j);
            accumulator.add_pair(i, j, &off_diagonal)?;
        }

        let linear = f_i.transpose() * b_blocks[i] - g_i.transpose() * p_etb;
        accumulator.add_linear(i, &linear)?;
    }

    let btb: f64 = b_blocks.iter().map(|b| b.norm_squared()).sum();
    accumulator.add_constant(btb - etb.dot(&p_etb))
}

/// Accumulates into a block matrix laid out as `[D; m] + [1]`, one block per view.
impl<const D: usize> SchurAccumulator<D> for SymmetricBlockMatrix {
    fn add_pair(&mut self, i: usize, j: usize, block: &SMatrix<f64, D, D>) -> SmartFactorResult<()> {
        if i == j {
            self.update_diagonal_block(i, block)
        } else {
            self.update_off_diagonal_block(i, j, block)
        }
    }

    fn add_linear(&mut self, i: usize, term: &SVector<f64, D>) -> SmartFactorResult<()> {
        let last = self.n_blocks() - 1;
        self.update_off_diagonal_block(i, last, term)
    }

    fn add_constant(&mut self, constant: f64) -> SmartFactorResult<()> {
        let last = self.n_blocks() - 1;
        self.update_diagonal_block(last, &nalgebra::Matrix1::new(constant))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector, SMatrix};

    type F2 = SMatrix<f64, 3, 2>;

    fn sample_system() -> (Vec<F2>, Vec<Matrix3<f64>>, Vec<Vector3<f64>>) {
        let f_blocks = vec![
            F2::new(1.0, 0.5, -0.3, 2.0, 0.7, 0.1),
            F2::new(0.2, -1.0, 1.5, 0.4, -0.6, 0.9),
        ];
        let e_blocks = vec![
            Matrix3::new(1.0, 0.2, 0.0, 0.1, 1.5, 0.3, -0.2, 0.0, 0.8),
            Matrix3::new(0.9, -0.1, 0.4, 0.0, 1.2, 0.2, 0.3, 0.1, 1.1),
        ];
        let b_blocks = vec![Vector3::new(0.5, -0.2, 0.1), Vector3::new(-0.3, 0.4, 0.2)];
        (f_blocks, e_blocks, b_blocks)
    }

    #[test]
    fn test_point_covariance_damping() {
        let e = vec![Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0))];

        let plain = compute_point_covariance(&e, 0.0, false).unwrap();
        assert!((plain[(2, 2)] - 1.0 / 9.0).abs() < 1e-12);

        let isotropic = compute_point_covariance(&e, 1.0, false).unwrap();
        assert!((isotropic[(1, 1)] - 1.0 / 5.0).abs() < 1e-12);

        let diagonal = compute_point_covariance(&e, 1.0, true).unwrap();
        assert!((diagonal[(1, 1)] - 1.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_covariance_singular() {
        let e = vec![Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0))];
        assert!(compute_point_covariance(&e, 0.0, false).is_none());
    }

    #[test]
    fn test_schur_matches_dense_elimination() {
        let (f_blocks, e_blocks, b_blocks) = sample_system();
        let p = compute_point_covariance(&e_blocks, 0.0, false).unwrap();

        let mut reduced = SymmetricBlockMatrix::new(vec![2, 2, 1]);
        schur_complement(&f_blocks, &e_blocks, &b_blocks, &p, &mut reduced).unwrap();

        // Dense augmented system [F E b], landmark columns eliminated last.
        let mut jacobian = DMatrix::zeros(6, 7);
        let mut rhs = DVector::zeros(6);
        for i in 0..2 {
            jacobian.view_mut((3 * i, 2 * i), (3, 2)).copy_from(&f_blocks[i]);
            jacobian.view_mut((3 * i, 4), (3, 3)).copy_from(&e_blocks[i]);
            rhs.rows_mut(3 * i, 3).copy_from(&b_blocks[i]);
        }
        let mut augmented = DMatrix::zeros(5, 5);
        let mut full = DMatrix::zeros(6, 8);
        full.view_mut((0, 0), (6, 7)).copy_from(&jacobian);
        full.column_mut(7).copy_from(&rhs);
        let hessian = full.transpose() * &full;

        // Reorder to [x (4), b (1)] after eliminating p (columns 4..7).
        let keep = [0usize, 1, 2, 3, 7];
        let h_pp = hessian.view((4, 4), (3, 3)).into_owned();
        let h_pp_inv = h_pp.try_inverse().unwrap();
        for (r, &kr) in keep.iter().enumerate() {
            for (c, &kc) in keep.iter().enumerate() {
                let h_xp = hessian.view((kr, 4), (1, 3)).into_owned();
                let h_px = hessian.view((4, kc), (3, 1)).into_owned();
                augmented[(r, c)] = hessian[(kr, kc)] - (h_xp * &h_pp_inv * h_px)[(0, 0)];
            }
        }

        let result = reduced.selfadjoint_view();
        assert!((result - augmented).amax() < 1e-10);
    }
}

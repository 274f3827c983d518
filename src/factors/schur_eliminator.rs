//! Whitening and landmark elimination.

use crate::core::noise::NoiseModel;
use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::linearization::LinearizedViews;
use crate::factors::{MEASUREMENT_DIM, VIEW_DIM};
use crate::linalg::schur::{compute_point_covariance, schur_complement, SchurAccumulator};
use nalgebra::Matrix3;
use tracing::warn;

/// Eliminates the landmark from a set of linearized views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchurEliminator {
    lambda: f64,
    diagonal_damping: bool,
}

impl SchurEliminator {
    pub fn new(lambda: f64, diagonal_damping: bool) -> Self {
        Self {
            lambda,
            diagonal_damping,
        }
    }

    /// Square-root information of a per-view noise model as a fixed 3×3 block.
    pub fn sqrt_information(noise: &dyn NoiseModel) -> SmartFactorResult<Matrix3<f64>> {
        if noise.dim() != MEASUREMENT_DIM {
            return Err(SmartFactorError::size_mismatch(
                "noise model dimension",
                MEASUREMENT_DIM,
                noise.dim(),
            ));
        }
        let sqrt_info = noise.sqrt_information();
        Ok(Matrix3::from_fn(|r, c| sqrt_info[(r, c)]))
    }

    /// Whiten every view block in place with the same noise model.
    pub fn whiten(views: &mut LinearizedViews, noise: &dyn NoiseModel) -> SmartFactorResult<()> {
        let sqrt_info = Self::sqrt_information(noise)?;
        for f in views.f_blocks.iter_mut() {
            *f = sqrt_info * *f;
        }
        for e in views.e_blocks.iter_mut() {
            *e = sqrt_info * *e;
        }
        for b in views.b_blocks.iter_mut() {
            *b = sqrt_info * *b;
        }
        Ok(())
    }

    /// Whiten `views`, then stream the landmark's Schur complement into `accumulator`.
    ///
    /// Returns `false`, leaving `accumulator` untouched, when `EᵀE + damping` is not
    /// invertible.
    pub fn eliminate<A: SchurAccumulator<VIEW_DIM>>(
        &self,
        mut views: LinearizedViews,
        noise: &dyn NoiseModel,
        accumulator: &mut A,
    ) -> SmartFactorResult<bool> {
        Self::whiten(&mut views, noise)?;

        let Some(point_covariance) =
            compute_point_covariance(&views.e_blocks, self.lambda, self.diagonal_damping)
        else {
            warn!(
                "Landmark information is not invertible (lambda = {}); treating landmark as degenerate",
                self.lambda
            );
            return Ok(false);
        };

        schur_complement(
            &views.f_blocks,
            &views.e_blocks,
            &views.b_blocks,
            &point_covariance,
            accumulator,
        )?;
        Ok(true)
    }
}

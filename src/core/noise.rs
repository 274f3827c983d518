//! Gaussian noise models used to whiten residuals and Jacobians.
//!
//! A noise model with covariance Σ is represented by its square-root information matrix
//! R (RᵀR = Σ⁻¹). Whitening maps a residual `e` to `R e` and a Jacobian `J` to `R J`, so
//! that the whitened least-squares cost is `‖R e‖²`.
//!
//! Stacked systems (several measurements of the model's dimension on top of each other)
//! are whitened block by block.
//!
//! # Available Noise Models
//!
//! - [`UnitNoise`]: Identity covariance
//! - [`IsotropicNoise`]: One sigma for every component
//! - [`DiagonalNoise`]: One sigma per component
//! - [`GaussianNoise`]: Full covariance, factored with Cholesky
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use smart_stereo::core::noise::{IsotropicNoise, NoiseModel};
//!
//! let noise = IsotropicNoise::new(3, 0.5).unwrap();
//! let whitened = noise.whiten_vector(&DVector::from_vec(vec![1.0, 2.0, 3.0])).unwrap();
//! assert!((whitened[2] - 6.0).abs() < 1e-12);
//! ```

use crate::error::{SmartFactorError, SmartFactorResult};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Trait for Gaussian noise models.
pub trait NoiseModel: fmt::Debug + Send + Sync {
    /// Dimension of one measurement.
    fn dim(&self) -> usize;

    /// Square-root information matrix R (dim × dim).
    fn sqrt_information(&self) -> DMatrix<f64>;

    /// Whiten a stacked vector whose length is a multiple of [`NoiseModel::dim`].
    fn whiten_vector(&self, vector: &DVector<f64>) -> SmartFactorResult<DVector<f64>> {
        let dim = self.dim();
        check_rows(dim, vector.nrows())?;
        let sqrt_info = self.sqrt_information();

        let mut whitened = vector.clone();
        for start in (0..vector.nrows()).step_by(dim) {
            let block = &sqrt_info * vector.rows(start, dim);
            whitened.rows_mut(start, dim).copy_from(&block);
        }
        Ok(whitened)
    }

    /// Whiten a stacked matrix whose row count is a multiple of [`NoiseModel::dim`].
    fn whiten_matrix(&self, matrix: &DMatrix<f64>) -> SmartFactorResult<DMatrix<f64>> {
        let dim = self.dim();
        check_rows(dim, matrix.nrows())?;
        let sqrt_info = self.sqrt_information();

        let mut whitened = matrix.clone();
        for start in (0..matrix.nrows()).step_by(dim) {
            let block = &sqrt_info * matrix.rows(start, dim);
            whitened.rows_mut(start, dim).copy_from(&block);
        }
        Ok(whitened)
    }

    /// Whiten a linear system `(A, b)` in place.
    fn whiten_system(
        &self,
        matrix: &mut DMatrix<f64>,
        vector: &mut DVector<f64>,
    ) -> SmartFactorResult<()> {
        if matrix.nrows() != vector.nrows() {
            return Err(SmartFactorError::size_mismatch(
                "whitened system rows",
                matrix.nrows(),
                vector.nrows(),
            ));
        }
        *matrix = self.whiten_matrix(matrix)?;
        *vector = self.whiten_vector(vector)?;
        Ok(())
    }
}

fn check_rows(dim: usize, rows: usize) -> SmartFactorResult<()> {
    if dim == 0 || rows % dim != 0 {
        return Err(SmartFactorError::size_mismatch(
            "whitened rows (multiple of noise dimension)",
            rows.div_ceil(dim.max(1)) * dim,
            rows,
        ));
    }
    Ok(())
}

fn check_sigma(sigma: f64) -> SmartFactorResult<()> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(())
    } else {
        Err(SmartFactorError::InvalidNoiseModel(format!(
            "sigma must be positive and finite, got {sigma}"
        )))
    }
}

/// Unit noise: whitening is the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitNoise {
    dim: usize,
}

impl UnitNoise {
    pub fn new(dim: usize) -> Self {
        UnitNoise { dim }
    }
}

impl NoiseModel for UnitNoise {
    fn dim(&self) -> usize {
        self.dim
    }

    fn sqrt_information(&self) -> DMatrix<f64> {
        DMatrix::identity(self.dim, self.dim)
    }

    fn whiten_vector(&self, vector: &DVector<f64>) -> SmartFactorResult<DVector<f64>> {
        check_rows(self.dim, vector.nrows())?;
        Ok(vector.clone())
    }

    fn whiten_matrix(&self, matrix: &DMatrix<f64>) -> SmartFactorResult<DMatrix<f64>> {
        check_rows(self.dim, matrix.nrows())?;
        Ok(matrix.clone())
    }
}

/// Isotropic noise: Σ = σ² I.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicNoise {
    dim: usize,
    sigma: f64,
}

impl IsotropicNoise {
    /// Create an isotropic model; `sigma` must be positive.
    pub fn new(dim: usize, sigma: f64) -> SmartFactorResult<Self> {
        check_sigma(sigma)?;
        Ok(IsotropicNoise { dim, sigma })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl NoiseModel for IsotropicNoise {
    fn dim(&self) -> usize {
        self.dim
    }

    fn sqrt_information(&self) -> DMatrix<f64> {
        DMatrix::identity(self.dim, self.dim) / self.sigma
    }

    fn whiten_vector(&self, vector: &DVector<f64>) -> SmartFactorResult<DVector<f64>> {
        check_rows(self.dim, vector.nrows())?;
        Ok(vector / self.sigma)
    }

    fn whiten_matrix(&self, matrix: &DMatrix<f64>) -> SmartFactorResult<DMatrix<f64>> {
        check_rows(self.dim, matrix.nrows())?;
        Ok(matrix / self.sigma)
    }
}

/// Diagonal noise: Σ = diag(σ₁², …, σₙ²).
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalNoise {
    sigmas: DVector<f64>,
}

impl DiagonalNoise {
    /// Create a diagonal model from per-component sigmas; each must be positive.
    pub fn from_sigmas(sigmas: DVector<f64>) -> SmartFactorResult<Self> {
        for &sigma in sigmas.iter() {
            check_sigma(sigma)?;
        }
        Ok(DiagonalNoise { sigmas })
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }
}

impl NoiseModel for DiagonalNoise {
    fn dim(&self) -> usize {
        self.sigmas.nrows()
    }

    fn sqrt_information(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&self.sigmas.map(|sigma| 1.0 / sigma))
    }
}

/// Full-covariance Gaussian noise.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianNoise {
    sqrt_information: DMatrix<f64>,
}

impl GaussianNoise {
    /// Build from a covariance matrix, which must be symmetric positive definite.
    ///
    /// With Σ⁻¹ = LLᵀ (Cholesky), the square-root information is R = Lᵀ.
    pub fn from_covariance(covariance: DMatrix<f64>) -> SmartFactorResult<Self> {
        if !covariance.is_square() {
            return Err(SmartFactorError::InvalidNoiseModel(format!(
                "covariance must be square, got {}x{}",
                covariance.nrows(),
                covariance.ncols()
            )));
        }
        let information = covariance.try_inverse().ok_or_else(|| {
            SmartFactorError::InvalidNoiseModel("covariance is singular".to_string())
        })?;
        let cholesky = information.cholesky().ok_or_else(|| {
            SmartFactorError::InvalidNoiseModel(
                "covariance is not positive definite".to_string(),
            )
        })?;

        Ok(GaussianNoise {
            sqrt_information: cholesky.l().transpose(),
        })
    }
}

impl NoiseModel for GaussianNoise {
    fn dim(&self) -> usize {
        self.sqrt_information.nrows()
    }

    fn sqrt_information(&self) -> DMatrix<f64> {
        self.sqrt_information.clone()
    }
}

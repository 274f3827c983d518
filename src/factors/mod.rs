//! Smart stereo projection factor
//!
//! A smart factor holds every stereo observation of one landmark but never exposes the
//! landmark as a variable. On linearization it triangulates the landmark from the current
//! pose estimates, linearizes all views about it and eliminates it with a Schur complement,
//! leaving a quadratic factor on the body poses and body-to-camera extrinsics alone.
//!
//! # Module Structure
//!
//! The linearization pipeline, leaves first:
//!
//! - `measurement_set`: per-view records (measurement, body pose key, extrinsic key, calibration)
//! - `camera_views`: resolves pose estimates into cameras and triangulates
//! - `linearization`: per-view 3×12 pose blocks, 3×3 landmark blocks and residuals
//! - `schur_eliminator`: whitening and landmark elimination
//! - `key_collapser`: folds repeated keys into a unique-key Hessian
//! - `hessian_factor`: the resulting quadratic factor
//! - `smart_stereo_factor`: the factor tying the stages together

use crate::core::values::EstimateStore;
use crate::error::SmartFactorResult;
use crate::triangulation::TriangulationParams;
use nalgebra::SMatrix;
use rayon::prelude::*;
use std::fmt;

pub mod camera_views;
pub mod hessian_factor;
pub mod key_collapser;
pub mod linearization;
pub mod measurement_set;
pub mod schur_eliminator;
pub mod smart_stereo_factor;

pub use camera_views::{CameraViewBuilder, CameraViews};
pub use hessian_factor::HessianFactor;
pub use key_collapser::KeyCollapser;
pub use linearization::{LinearizationEngine, LinearizedViews};
pub use measurement_set::MeasurementSet;
pub use schur_eliminator::SchurEliminator;
pub use smart_stereo_factor::SmartStereoFactor;

/// Tangent dimension of one pose variable.
pub const POSE_DIM: usize = 6;

/// Dimension of one stereo measurement `(u_l, u_r, v)`.
pub const MEASUREMENT_DIM: usize = 3;

/// Parameters of one view: body pose followed by extrinsic pose.
pub const VIEW_DIM: usize = 2 * POSE_DIM;

/// Jacobian of one view's measurement wrt `[body pose | extrinsic pose]`.
pub type ViewJacobian = SMatrix<f64, MEASUREMENT_DIM, VIEW_DIM>;

/// Shape of the linear factor produced by linearization
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinearizationMode {
    /// Dense Hessian over the unique pose keys (the only supported mode)
    #[default]
    Hessian,
    /// Implicit Schur complement factor
    ImplicitSchur,
    /// Jacobian factor projected on the landmark null space
    JacobianQ,
    /// Jacobian factor from an SVD of the landmark Jacobian
    JacobianSvd,
}

impl fmt::Display for LinearizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearizationMode::Hessian => write!(f, "Hessian"),
            LinearizationMode::ImplicitSchur => write!(f, "Implicit-Schur"),
            LinearizationMode::JacobianQ => write!(f, "Jacobian-Q"),
            LinearizationMode::JacobianSvd => write!(f, "Jacobian-SVD"),
        }
    }
}

/// Configuration of a [`SmartStereoFactor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartStereoParams {
    /// Linear factor to produce
    pub linearization_mode: LinearizationMode,
    /// Landmark damping used by [`SmartStereoFactor::linearize`]
    pub lambda: f64,
    /// Damp with `λ diag(EᵀE)` instead of `λI`
    pub diagonal_damping: bool,
    /// Landmark triangulation settings
    pub triangulation: TriangulationParams,
    /// Log a warning whenever the landmark lands behind a camera
    pub verbose_cheirality: bool,
}

impl Default for SmartStereoParams {
    fn default() -> Self {
        Self {
            linearization_mode: LinearizationMode::Hessian,
            lambda: 0.0,
            diagonal_damping: false,
            triangulation: TriangulationParams::default(),
            verbose_cheirality: false,
        }
    }
}

impl SmartStereoParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linearization_mode(mut self, mode: LinearizationMode) -> Self {
        self.linearization_mode = mode;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_diagonal_damping(mut self, diagonal_damping: bool) -> Self {
        self.diagonal_damping = diagonal_damping;
        self
    }

    pub fn with_triangulation(mut self, triangulation: TriangulationParams) -> Self {
        self.triangulation = triangulation;
        self
    }

    pub fn with_verbose_cheirality(mut self, verbose: bool) -> Self {
        self.verbose_cheirality = verbose;
        self
    }
}

/// Linearize independent factors in parallel with damping `lambda`.
///
/// The output keeps the order of `factors`. The first error aborts the batch.
pub fn linearize_all<V: EstimateStore + ?Sized>(
    factors: &[SmartStereoFactor],
    values: &V,
    lambda: f64,
) -> SmartFactorResult<Vec<HessianFactor>> {
    factors
        .par_iter()
        .map(|factor| factor.linearize_damped(values, lambda))
        .collect()
}

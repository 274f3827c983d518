//! Manifold representations for the pose variables of the smart factor.
//!
//! Body poses, extrinsics and camera poses are all SE(3); SO(3) carries their rotation part.
//!
//! Group  | DOF | Element          | Tangent        | Composition | Action
//! ------ | --- | ---------------- | -------------- | ----------- | ------
//! SO(3)  | 3   | R                | θ ∈ R³         | R₁R₂        | Rx
//! SE(3)  | 6   | [R t; 0 1]       | [ρ, θ] ∈ R⁶    | M₁M₂        | Rx + t
//!
//! Conventions follow the [manif](https://github.com/artivis/manif) C++ library:
//! - Closed-form Jacobians, no automatic differentiation
//! - Right perturbation model (`X ⊕ τ = X ∘ Exp(τ)`)
//! - SE(3) tangent ordering `[ρ (translation), θ (rotation)]`
//!
//! # Example
//!
//! ```
//! use nalgebra::Vector3;
//! use smart_stereo::manifold::{LieGroup, se3::{SE3, SE3Tangent}};
//!
//! let pose = SE3::from_translation_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.3);
//! let step = SE3Tangent::new(Vector3::new(0.05, 0.0, 0.0), Vector3::new(0.0, 0.02, 0.0));
//!
//! let mut jacobian = nalgebra::Matrix6::zeros();
//! let perturbed = pose.plus(&step, None, Some(&mut jacobian));
//! assert!(perturbed.is_valid(1e-9));
//! ```

use nalgebra::Vector3;
use std::fmt::Debug;

pub mod se3;
pub mod so3;

/// Squared-angle threshold below which Taylor expansions replace closed forms.
pub const SMALL_ANGLE_THRESHOLD: f64 = 1e-10;

/// Failure to build a group element or tangent from raw input.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifoldError {
    /// Slice length does not match the tangent dimension
    InvalidTangentDimension { expected: usize, actual: usize },
    /// Matrix is not a valid group element
    InvalidElement(String),
}

impl std::fmt::Display for ManifoldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifoldError::InvalidTangentDimension { expected, actual } => {
                write!(
                    f,
                    "Invalid tangent dimension: expected {expected}, got {actual}"
                )
            }
            ManifoldError::InvalidElement(msg) => {
                write!(f, "Invalid manifold element: {msg}")
            }
        }
    }
}

impl std::error::Error for ManifoldError {}

/// Result alias for fallible manifold constructors.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Lie group with analytic Jacobians under the right perturbation `X ⊕ τ = X ∘ Exp(τ)`.
///
/// Every Jacobian argument is optional; passing `None` skips its computation.
pub trait LieGroup: Clone + Debug + PartialEq {
    type TangentVector: Tangent<Self>;

    /// DOF × DOF
    type JacobianMatrix: Clone + Debug + PartialEq;

    /// 3 × DOF, derivative of `X ⊙ v` wrt X
    type ActionJacobian: Clone + Debug + PartialEq;

    /// Matrix form of a tangent vector
    type LieAlgebra: Clone + Debug + PartialEq;

    /// Tangent space dimension
    const DOF: usize;

    fn identity() -> Self;

    /// `X⁻¹`, with `∂X⁻¹/∂X = -Ad(X)`.
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self;

    /// `X ∘ Y`, with `∂/∂X = Ad(Y⁻¹)` and `∂/∂Y = I`.
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// `Log(X)`, with `∂/∂X = Jr⁻¹(Log(X))`.
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector;

    /// `X ∘ Exp(τ)`, with `∂/∂X = Ad(Exp(τ)⁻¹)` and `∂/∂τ = Jr(τ)`.
    fn right_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// `Log(Y⁻¹ ∘ X)` for `X = self`, `Y = other`, with `∂/∂X = Jr⁻¹` and `∂/∂Y = -Jl⁻¹`.
    fn right_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector;

    /// Alias of [`LieGroup::right_plus`].
    fn plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        self.right_plus(tangent, jacobian_self, jacobian_tangent)
    }

    /// Alias of [`LieGroup::right_minus`].
    fn minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        self.right_minus(other, jacobian_self, jacobian_other)
    }

    /// `X⁻¹ ∘ Y`, with `∂/∂X = -Ad((X⁻¹ ∘ Y)⁻¹)` and `∂/∂Y = I`.
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// `X ⊙ v`: the element applied to a point.
    fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Self::ActionJacobian>,
        jacobian_vector: Option<&mut nalgebra::Matrix3<f64>>,
    ) -> Vector3<f64>;

    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Uniformly sampled element for tests and benchmarks.
    fn random() -> Self;

    /// Project back onto the group after accumulated round-off.
    fn normalize(&mut self);

    fn is_valid(&self, tolerance: f64) -> bool;

    /// `‖Log(other⁻¹ ∘ self)‖ < tolerance`
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other, None, None).is_zero(tolerance)
    }
}

/// Tangent vector of a [`LieGroup`].
pub trait Tangent<G: LieGroup>: Clone + Debug + PartialEq {
    /// `Exp(τ)`, with `∂/∂τ = Jr(τ)`.
    fn exp(&self, jacobian: Option<&mut G::JacobianMatrix>) -> G;

    /// Jr with `Exp(τ + δ) ≈ Exp(τ) ∘ Exp(Jr δ)`
    fn right_jacobian(&self) -> G::JacobianMatrix;

    /// Jl with `Exp(τ + δ) ≈ Exp(Jl δ) ∘ Exp(τ)`
    fn left_jacobian(&self) -> G::JacobianMatrix;

    fn right_jacobian_inv(&self) -> G::JacobianMatrix;

    fn left_jacobian_inv(&self) -> G::JacobianMatrix;

    /// `τ^`
    fn hat(&self) -> G::LieAlgebra;

    fn zero() -> Self;

    fn is_zero(&self, tolerance: f64) -> bool;
}

/// Skew-symmetric matrix [v]× such that [v]× w = v × w.
pub fn skew(v: &Vector3<f64>) -> nalgebra::Matrix3<f64> {
    nalgebra::Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

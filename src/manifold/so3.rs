//! Rotations in 3D.
//!
//! Stored as a unit quaternion; tangent vectors are axis-angle `θ ∈ R³`.
//!
//! Jr⁻¹ and Jl⁻¹ contain `(1 + cos θ) / (2θ sin θ)`, which is 0/0 at θ = 0. Below
//! [`SMALL_ANGLE_THRESHOLD`] first-order expansions take over.

use crate::manifold::{skew, LieGroup, Tangent, SMALL_ANGLE_THRESHOLD};
use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis_angle = self.quaternion.scaled_axis();
        write!(
            f,
            "SO3(axis-angle: [{:.4}, {:.4}, {:.4}])",
            axis_angle.x, axis_angle.y, axis_angle.z
        )
    }
}

impl SO3 {
    #[inline]
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Roll about x, then pitch about y, then yaw about z.
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    /// Nearest rotation to `matrix`; the input need not be exactly orthonormal.
    pub fn from_rotation_matrix(matrix: &Matrix3<f64>) -> Self {
        let rotation = Rotation3::from_matrix(matrix);
        SO3::new(UnitQuaternion::from_rotation_matrix(&rotation))
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type ActionJacobian = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;

    const DOF: usize = 3;

    fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    /// ∂R⁻¹/∂R = -R
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }

        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    /// ∂(QR)/∂Q = Rᵀ, ∂(QR)/∂R = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.rotation_matrix().transpose();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }

        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    /// Log(q) = 2 atan2(‖v‖, w) v / ‖v‖ for q = (w, v)
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let q = self.quaternion.quaternion();
        let sin_angle_squared = q.i * q.i + q.j * q.j + q.k * q.k;

        let log_coeff = if sin_angle_squared > SMALL_ANGLE_THRESHOLD {
            let sin_angle = sin_angle_squared.sqrt();
            let cos_angle = q.w;

            // Keep the angle in [-π, π] when w < 0 (double cover).
            let two_angle = 2.0
                * if cos_angle < 0.0 {
                    f64::atan2(-sin_angle, -cos_angle)
                } else {
                    f64::atan2(sin_angle, cos_angle)
                };

            two_angle / sin_angle
        } else {
            2.0 / q.w
        };

        let tangent = SO3Tangent::new(Vector3::new(
            q.i * log_coeff,
            q.j * log_coeff,
            q.k * log_coeff,
        ));

        if let Some(jac) = jacobian {
            *jac = tangent.right_jacobian_inv();
        }

        tangent
    }

    fn right_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let exp_tangent = tangent.exp(None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = exp_tangent.rotation_matrix().transpose();
        }
        if let Some(jac_tangent) = jacobian_tangent {
            *jac_tangent = tangent.right_jacobian();
        }

        self.compose(&exp_tangent, None, None)
    }

    fn right_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        let result = other.inverse(None).compose(self, None, None).log(None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = result.right_jacobian_inv();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = -result.left_jacobian_inv();
        }

        result
    }

    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = self.inverse(None).compose(other, None, None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = -result.rotation_matrix().transpose();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }

        result
    }

    fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Self::ActionJacobian>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        if let Some(jac_self) = jacobian_self {
            *jac_self = -self.rotation_matrix() * skew(vector);
        }
        if let Some(jac_vector) = jacobian_vector {
            *jac_vector = self.rotation_matrix();
        }

        self.quaternion * vector
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        self.rotation_matrix()
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SO3::from_scaled_axis(Vector3::from_fn(|_, _| rng.random_range(-1.0..1.0)))
    }

    fn normalize(&mut self) {
        let q = self.quaternion.into_inner().normalize();
        self.quaternion = UnitQuaternion::from_quaternion(q);
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.quaternion.norm() - 1.0).abs() < tolerance
    }
}

/// Axis-angle vector `θ = angle · axis`.
#[derive(Clone, Debug, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl fmt::Display for SO3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "so3({:.4}, {:.4}, {:.4})", self.data.x, self.data.y, self.data.z)
    }
}

impl SO3Tangent {
    #[inline]
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    #[inline]
    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }
}

impl Tangent<SO3> for SO3Tangent {
    /// q = Exp(θu) = cos(θ/2) + u sin(θ/2)
    fn exp(&self, jacobian: Option<&mut Matrix3<f64>>) -> SO3 {
        let theta_squared = self.data.norm_squared();

        let quaternion = if theta_squared > SMALL_ANGLE_THRESHOLD {
            UnitQuaternion::from_scaled_axis(self.data)
        } else {
            UnitQuaternion::from_quaternion(Quaternion::new(
                1.0,
                self.data.x / 2.0,
                self.data.y / 2.0,
                self.data.z / 2.0,
            ))
        };

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SO3 { quaternion }
    }

    /// J_R(θ) = J_L(θ)ᵀ = J_L(-θ)
    fn right_jacobian(&self) -> Matrix3<f64> {
        self.left_jacobian().transpose()
    }

    /// J_L(θ) = I + (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
    fn left_jacobian(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let tangent_skew = self.hat();

        if theta_squared <= SMALL_ANGLE_THRESHOLD {
            Matrix3::identity() + 0.5 * tangent_skew
        } else {
            let theta = theta_squared.sqrt();
            Matrix3::identity()
                + (1.0 - theta.cos()) / theta_squared * tangent_skew
                + (theta - theta.sin()) / (theta_squared * theta) * tangent_skew * tangent_skew
        }
    }

    fn right_jacobian_inv(&self) -> Matrix3<f64> {
        self.left_jacobian_inv().transpose()
    }

    /// J_L⁻¹(θ) = I - ½[θ]ₓ + (1/θ² - (1 + cos θ)/(2θ sin θ)) [θ]ₓ²
    fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let tangent_skew = self.hat();

        if theta_squared <= SMALL_ANGLE_THRESHOLD {
            Matrix3::identity() - 0.5 * tangent_skew
        } else {
            let theta = theta_squared.sqrt();
            Matrix3::identity() - 0.5 * tangent_skew
                + (1.0 / theta_squared - (1.0 + theta.cos()) / (2.0 * theta * theta.sin()))
                    * tangent_skew
                    * tangent_skew
        }
    }

    fn hat(&self) -> Matrix3<f64> {
        skew(&self.data)
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }
}

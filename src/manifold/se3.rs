//! Rigid transforms in 3D.
//!
//! Body poses, body-to-camera extrinsics and camera poses are all `SE3`. The tangent is
//! `[ρ, θ]`: translational part first, rotational part second.

use crate::manifold::so3::{SO3Tangent, SO3};
use crate::manifold::{
    skew, LieGroup, ManifoldError, ManifoldResult, Tangent, SMALL_ANGLE_THRESHOLD,
};
use nalgebra::{
    Isometry3, Matrix3, Matrix3x6, Matrix4, Matrix6, Translation3, UnitQuaternion, Vector3,
    Vector6,
};
use std::fmt;

/// `[R t; 0 1]`, mapping points of its own frame into the parent frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: Vector3<f64>,
}

impl fmt::Display for SE3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        write!(f, "SE3(t: [{:.4}, {:.4}, {:.4}], R: {})", t.x, t.y, t.z, self.rotation)
    }
}

impl SE3 {
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        SE3 {
            rotation: SO3::new(rotation),
            translation,
        }
    }

    /// Translation `(x, y, z)` and rotation from roll, pitch, yaw.
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Create SE3 from a 4×4 homogeneous matrix, e.g. an extrinsic read from a calibration file.
    ///
    /// # Errors
    /// [`ManifoldError::InvalidElement`] if the last row is not `[0, 0, 0, 1]` or the upper-left
    /// block is not a proper rotation within `tolerance`.
    pub fn try_from_matrix(matrix: &Matrix4<f64>, tolerance: f64) -> ManifoldResult<Self> {
        let last_row = matrix.fixed_view::<1, 4>(3, 0);
        if (last_row - nalgebra::RowVector4::new(0.0, 0.0, 0.0, 1.0)).amax() > tolerance {
            return Err(ManifoldError::InvalidElement(format!(
                "homogeneous row is {last_row}"
            )));
        }

        let rotation = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let orthogonality = (rotation.transpose() * rotation - Matrix3::identity()).amax();
        if orthogonality > tolerance || rotation.determinant() <= 0.0 {
            return Err(ManifoldError::InvalidElement(format!(
                "rotation block is not in SO(3) (orthogonality error {orthogonality:.3e})"
            )));
        }

        Ok(SE3 {
            rotation: SO3::from_rotation_matrix(&rotation),
            translation: matrix.fixed_view::<3, 1>(0, 3).into_owned(),
        })
    }

    pub fn from_translation_so3(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            self.rotation.quaternion(),
        )
    }

    /// 4×4 homogeneous matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Express a world point in this frame: Rᵀ(p - t).
    pub fn transform_to(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation_matrix().transpose() * (point - self.translation)
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;
    type JacobianMatrix = Matrix6<f64>;
    type ActionJacobian = Matrix3x6<f64>;
    type LieAlgebra = Matrix4<f64>;

    const DOF: usize = 6;

    fn identity() -> Self {
        SE3 {
            rotation: SO3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// M⁻¹ = [Rᵀ, -Rᵀt], with ∂M⁻¹/∂M = -Ad(M)
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        let rotation_inv = self.rotation.inverse(None);
        let translation_inv = -(rotation_inv.act(&self.translation, None, None));

        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }

        SE3 {
            rotation: rotation_inv,
            translation: translation_inv,
        }
    }

    /// M₁M₂ = [R₁R₂, R₁t₂ + t₁], with ∂/∂M₁ = Ad(M₂⁻¹) and ∂/∂M₂ = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix6::identity();
        }

        SE3 {
            rotation: self.rotation.compose(&other.rotation, None, None),
            translation: self.rotation.act(&other.translation, None, None) + self.translation,
        }
    }

    /// τ = log(M) = [V⁻¹(θ) t, Log(R)]
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let theta = self.rotation.log(None);
        let rho = theta.left_jacobian_inv() * self.translation;
        let result = SE3Tangent::new(rho, theta.coeffs());

        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }

        result
    }

    fn right_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let exp_tangent = tangent.exp(None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = exp_tangent.inverse(None).adjoint();
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
            *jac_self = -result.inverse(None).adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix6::identity();
        }

        result
    }

    /// M ⊙ v = Rv + t, with ∂/∂M = [R, -R[v]ₓ] and ∂/∂v = R
    fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Self::ActionJacobian>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let rotation_matrix = self.rotation.rotation_matrix();

        if let Some(jac_self) = jacobian_self {
            jac_self
                .fixed_view_mut::<3, 3>(0, 0)
                .copy_from(&rotation_matrix);
            jac_self
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&(-rotation_matrix * skew(vector)));
        }
        if let Some(jac_vector) = jacobian_vector {
            *jac_vector = rotation_matrix;
        }

        rotation_matrix * vector + self.translation
    }

    /// Ad(M) = [R, [t]ₓR; 0, R]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let rotation_matrix = self.rotation.rotation_matrix();
        let mut adjoint_matrix = Matrix6::zeros();

        adjoint_matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_matrix);
        adjoint_matrix
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_matrix);
        adjoint_matrix
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(skew(&self.translation) * rotation_matrix));

        adjoint_matrix
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();

        let translation = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );

        SE3::from_translation_so3(translation, SO3::random())
    }

    fn normalize(&mut self) {
        self.rotation.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance)
    }
}

/// `[ρ, θ]` tangent vector.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3Tangent {
    data: Vector6<f64>,
}

impl fmt::Display for SE3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rho = self.rho();
        let theta = self.theta();
        write!(
            f,
            "se3(rho: [{:.4}, {:.4}, {:.4}], theta: [{:.4}, {:.4}, {:.4}])",
            rho.x, rho.y, rho.z, theta.x, theta.y, theta.z
        )
    }
}

impl SE3Tangent {
    pub fn new(rho: Vector3<f64>, theta: Vector3<f64>) -> Self {
        let mut data = Vector6::zeros();
        data.fixed_rows_mut::<3>(0).copy_from(&rho);
        data.fixed_rows_mut::<3>(3).copy_from(&theta);
        SE3Tangent { data }
    }

    /// Wrap a 6-vector in [rho, theta] order.
    pub fn from_vector(data: Vector6<f64>) -> Self {
        SE3Tangent { data }
    }

    /// Build from a `[rho, theta]` slice of length 6.
    pub fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        if data.len() != 6 {
            return Err(ManifoldError::InvalidTangentDimension {
                expected: 6,
                actual: data.len(),
            });
        }
        Ok(SE3Tangent {
            data: Vector6::from_column_slice(data),
        })
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        self.data
    }

    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// Q(ρ, θ) block coupling translation and rotation in the SE(3) left Jacobian.
    ///
    /// Q = ½ρₓ + a (θₓρₓ + ρₓθₓ + θₓρₓθₓ)
    ///       + b (θₓ²ρₓ + ρₓθₓ² - 3θₓρₓθₓ)
    ///       + c (θₓρₓθₓ² + θₓ²ρₓθₓ)
    ///
    /// with a = (θ - sin θ)/θ³, b = (θ² + 2cos θ - 2)/(2θ⁴), c = (2θ - 3sin θ + θcos θ)/(2θ⁵).
    fn q_block(rho: &Vector3<f64>, theta: &Vector3<f64>) -> Matrix3<f64> {
        let rho_skew = skew(rho);
        let theta_skew = skew(theta);
        let theta_squared = theta.norm_squared();

        let (a, b, c) = if theta_squared > SMALL_ANGLE_THRESHOLD {
            let angle = theta_squared.sqrt();
            let (sin, cos) = angle.sin_cos();
            let angle_3 = angle * theta_squared;
            let angle_4 = theta_squared * theta_squared;
            let angle_5 = angle_4 * angle;
            (
                (angle - sin) / angle_3,
                (theta_squared + 2.0 * cos - 2.0) / (2.0 * angle_4),
                (2.0 * angle - 3.0 * sin + angle * cos) / (2.0 * angle_5),
            )
        } else {
            (1.0 / 6.0, 1.0 / 24.0, 1.0 / 120.0)
        };

        let theta_rho = theta_skew * rho_skew;
        let rho_theta = rho_skew * theta_skew;
        let theta_rho_theta = theta_rho * theta_skew;
        let theta_theta = theta_skew * theta_skew;

        0.5 * rho_skew
            + a * (theta_rho + rho_theta + theta_rho_theta)
            + b * (theta_theta * rho_skew + rho_skew * theta_theta - 3.0 * theta_rho_theta)
            + c * (theta_rho_theta * theta_skew + theta_theta * rho_theta)
    }

    fn negated(&self) -> Self {
        SE3Tangent { data: -self.data }
    }
}

impl Tangent<SE3> for SE3Tangent {
    /// exp(τ) = [Exp(θ), V(θ)ρ]
    fn exp(&self, jacobian: Option<&mut Matrix6<f64>>) -> SE3 {
        let theta = SO3Tangent::new(self.theta());
        let translation = theta.left_jacobian() * self.rho();

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SE3::from_translation_so3(translation, theta.exp(None))
    }

    /// J_R(τ) = J_L(-τ)
    fn right_jacobian(&self) -> Matrix6<f64> {
        self.negated().left_jacobian()
    }

    /// J_L(τ) = [J_L(θ), Q(ρ, θ); 0, J_L(θ)]
    fn left_jacobian(&self) -> Matrix6<f64> {
        let rotation_jacobian = SO3Tangent::new(self.theta()).left_jacobian();
        let mut jac = Matrix6::zeros();

        jac.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_jacobian);
        jac.fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_jacobian);
        jac.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&Self::q_block(&self.rho(), &self.theta()));

        jac
    }

    fn right_jacobian_inv(&self) -> Matrix6<f64> {
        self.negated().left_jacobian_inv()
    }

    /// J_L⁻¹(τ) = [J_L⁻¹(θ), -J_L⁻¹(θ) Q J_L⁻¹(θ); 0, J_L⁻¹(θ)]
    fn left_jacobian_inv(&self) -> Matrix6<f64> {
        let rotation_jacobian_inv = SO3Tangent::new(self.theta()).left_jacobian_inv();
        let q = Self::q_block(&self.rho(), &self.theta());
        let mut jac = Matrix6::zeros();

        jac.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_jacobian_inv);
        jac.fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_jacobian_inv);
        jac.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(-rotation_jacobian_inv * q * rotation_jacobian_inv));

        jac
    }

    /// τ^ = [θₓ, ρ; 0, 0]
    fn hat(&self) -> Matrix4<f64> {
        let mut lie_alg = Matrix4::zeros();
        lie_alg
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&skew(&self.theta()));
        lie_alg.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.rho());
        lie_alg
    }

    fn zero() -> Self {
        SE3Tangent {
            data: Vector6::zeros(),
        }
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }
}

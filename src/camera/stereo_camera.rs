//! Posed stereo camera with analytic projection Jacobians.

use crate::camera::calibration::StereoCalibration;
use crate::camera::measurement::StereoMeasurement;
use crate::error::{SmartFactorError, SmartFactorResult};
use crate::manifold::se3::SE3;
use crate::manifold::{skew, LieGroup};
use nalgebra::{Matrix3, Matrix3x6, Vector3};
use std::sync::Arc;

/// A rectified stereo rig placed in the world.
///
/// `pose` is the left camera's pose in the world frame (world_P_cam). The right-perturbation
/// convention of [`SE3`] applies to the pose Jacobian.
#[derive(Debug, Clone)]
pub struct StereoCamera {
    pose: SE3,
    calibration: Arc<StereoCalibration>,
}

impl StereoCamera {
    pub fn new(pose: SE3, calibration: Arc<StereoCalibration>) -> Self {
        StereoCamera { pose, calibration }
    }

    pub fn pose(&self) -> &SE3 {
        &self.pose
    }

    pub fn calibration(&self) -> &StereoCalibration {
        &self.calibration
    }

    /// Project a world point to `(u_l, u_r, v)`.
    ///
    /// # Arguments
    /// * `point` - Landmark in the world frame
    /// * `jacobian_pose` - Optional ∂π/∂pose (3×6)
    /// * `jacobian_point` - Optional ∂π/∂point (3×3)
    ///
    /// # Errors
    /// [`SmartFactorError::Cheirality`] if the point is not in front of the left camera.
    pub fn project(
        &self,
        point: &Vector3<f64>,
        jacobian_pose: Option<&mut Matrix3x6<f64>>,
        jacobian_point: Option<&mut Matrix3<f64>>,
    ) -> SmartFactorResult<Vector3<f64>> {
        let p_cam = self.pose.transform_to(point);
        if p_cam.z <= 0.0 {
            return Err(SmartFactorError::Cheirality { depth: p_cam.z });
        }

        let k = &self.calibration;
        let inv_z = 1.0 / p_cam.z;
        let left_x = k.fx * p_cam.x + k.skew * p_cam.y;
        let right_x = k.fx * (p_cam.x - k.baseline) + k.skew * p_cam.y;

        let pixels = Vector3::new(
            k.u0 + left_x * inv_z,
            k.u0 + right_x * inv_z,
            k.v0 + k.fy * p_cam.y * inv_z,
        );

        if jacobian_pose.is_none() && jacobian_point.is_none() {
            return Ok(pixels);
        }

        let inv_z2 = inv_z * inv_z;
        let d_pixels_d_cam = Matrix3::new(
            k.fx * inv_z,
            k.skew * inv_z,
            -left_x * inv_z2,
            k.fx * inv_z,
            k.skew * inv_z,
            -right_x * inv_z2,
            0.0,
            k.fy * inv_z,
            -k.fy * p_cam.y * inv_z2,
        );

        if let Some(jac_pose) = jacobian_pose {
            // ∂p_cam/∂pose = [-I | [p_cam]ₓ]
            jac_pose
                .fixed_view_mut::<3, 3>(0, 0)
                .copy_from(&(-d_pixels_d_cam));
            jac_pose
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&(d_pixels_d_cam * skew(&p_cam)));
        }
        if let Some(jac_point) = jacobian_point {
            *jac_point = d_pixels_d_cam * self.pose.rotation_matrix().transpose();
        }

        Ok(pixels)
    }

    /// Left-camera pixel `(u_l, v)` of a world point, or `None` if it is behind the camera.
    pub fn project_left(&self, point: &Vector3<f64>) -> Option<(f64, f64)> {
        self.project(point, None, None)
            .ok()
            .map(|pixels| (pixels.x, pixels.z))
    }

    /// Recover the world point seen by a full stereo measurement.
    ///
    /// Returns `None` for a `Mono` measurement or a non-positive disparity.
    pub fn backproject(&self, measurement: &StereoMeasurement) -> Option<Vector3<f64>> {
        let u_r = measurement.u_r()?;
        let disparity = measurement.u_l() - u_r;
        if disparity <= 0.0 {
            return None;
        }

        let k = &self.calibration;
        let z = k.fx * k.baseline / disparity;
        let y = (measurement.v() - k.v0) * z / k.fy;
        let x = ((measurement.u_l() - k.u0) * z - k.skew * y) / k.fx;

        Some(self.pose.act(&Vector3::new(x, y, z), None, None))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::manifold::se3::SE3Tangent;
    use nalgebra::Vector6;

    fn camera() -> StereoCamera {
        StereoCamera::new(
            SE3::from_translation_euler(0.3, -0.2, 0.1, 0.05, -0.1, 0.2),
            Arc::new(StereoCalibration::new(1500.0, 1200.0, 0.5, 640.0, 480.0, 0.5)),
        )
    }

    #[test]
    fn test_project_identity_pose() {
        let camera = StereoCamera::new(
            SE3::identity(),
            Arc::new(StereoCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0, 0.5)),
        );
        let pixels = camera.project(&Vector3::new(1.0, 0.5, 5.0), None, None).unwrap();

        assert!((pixels.x - 420.0).abs() < 1e-10);
        assert!((pixels.y - 370.0).abs() < 1e-10);
        assert!((pixels.z - 290.0).abs() < 1e-10);
    }

    #[test]
    fn test_project_behind_camera() {
        let camera = StereoCamera::new(
            SE3::identity(),
            Arc::new(StereoCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0, 0.5)),
        );
        let result = camera.project(&Vector3::new(0.0, 0.0, -1.0), None, None);
        assert!(matches!(result, Err(SmartFactorError::Cheirality { .. })));
    }

    #[test]
    fn test_backproject_inverts_project() {
        let camera = camera();
        let point = Vector3::new(1.0, 1.0, 5.0);
        let pixels = camera.project(&point, None, None).unwrap();
        let measurement = StereoMeasurement::stereo(pixels.x, pixels.y, pixels.z);

        let recovered = camera.backproject(&measurement).unwrap();
        assert!((recovered - point).norm() < 1e-9);
    }

    #[test]
    fn test_project_jacobians_numerical() {
        let camera = camera();
        let point = Vector3::new(1.0, 1.0, 5.0);
        let mut jac_pose = Matrix3x6::zeros();
        let mut jac_point = Matrix3::zeros();
        let base = camera
            .project(&point, Some(&mut jac_pose), Some(&mut jac_point))
            .unwrap();
        let eps = 1e-6;

        for k in 0..6 {
            let mut delta = Vector6::zeros();
            delta[k] = eps;
            let perturbed = StereoCamera::new(
                camera.pose().plus(&SE3Tangent::from_vector(delta), None, None),
                Arc::new(*camera.calibration()),
            );
            let numerical = (perturbed.project(&point, None, None).unwrap() - base) / eps;
            assert!((numerical - jac_pose.column(k)).norm() < 1e-3);
        }

        for k in 0..3 {
            let mut delta = Vector3::zeros();
            delta[k] = eps;
            let numerical = (camera.project(&(point + delta), None, None).unwrap() - base) / eps;
            assert!((numerical - jac_point.column(k)).norm() < 1e-3);
        }
    }
}

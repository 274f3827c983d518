//! Per-view linearization about the triangulated landmark.

use crate::camera::StereoMeasurement;
use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::camera_views::CameraViews;
use crate::factors::{ViewJacobian, POSE_DIM};
use nalgebra::{Matrix3, Matrix3x6, Vector3};

/// Row of the right pixel `u_r` in a stereo measurement.
const RIGHT_PIXEL_ROW: usize = 1;

/// Unwhitened linear system of every view: `Fᵢ δxᵢ + Eᵢ δp ≈ bᵢ`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearizedViews {
    /// ∂π/∂[body | extrinsic] of each view (3×12)
    pub f_blocks: Vec<ViewJacobian>,
    /// ∂π/∂landmark of each view (3×3)
    pub e_blocks: Vec<Matrix3<f64>>,
    /// Negated reprojection error `measured - predicted` of each view
    pub b_blocks: Vec<Vector3<f64>>,
}

impl LinearizedViews {
    pub fn len(&self) -> usize {
        self.f_blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f_blocks.is_empty()
    }
}

/// Computes the per-view blocks of the linearized projection model.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearizationEngine;

impl LinearizationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Linearize every view about `point`.
    ///
    /// The 3×6 projection Jacobian wrt the camera pose is chained through the composition
    /// Jacobians into `[∂/∂body | ∂/∂extrinsic]`. For a `Mono` measurement the right-pixel
    /// row of the pose block, the landmark block and the residual is zeroed.
    pub fn linearize(
        &self,
        views: &CameraViews,
        measurements: &[StereoMeasurement],
        point: &Vector3<f64>,
    ) -> SmartFactorResult<LinearizedViews> {
        if views.len() != measurements.len() {
            return Err(SmartFactorError::size_mismatch(
                "measurements",
                views.len(),
                measurements.len(),
            ));
        }

        let mut f_blocks = Vec::with_capacity(views.len());
        let mut e_blocks = Vec::with_capacity(views.len());
        let mut b_blocks = Vec::with_capacity(views.len());

        for (i, (camera, measurement)) in views.cameras.iter().zip(measurements).enumerate() {
            let mut d_project_d_pose = Matrix3x6::zeros();
            let mut e_block = Matrix3::zeros();
            let predicted =
                camera.project(point, Some(&mut d_project_d_pose), Some(&mut e_block))?;

            let mut f_block = ViewJacobian::zeros();
            f_block
                .fixed_view_mut::<3, POSE_DIM>(0, 0)
                .copy_from(&(d_project_d_pose * views.body_jacobians[i]));
            f_block
                .fixed_view_mut::<3, POSE_DIM>(0, POSE_DIM)
                .copy_from(&(d_project_d_pose * views.extrinsic_jacobians[i]));

            // error() already zeroes the right-pixel residual of a Mono measurement
            let b_block = -measurement.error(&predicted);

            if measurement.is_mono() {
                f_block.row_mut(RIGHT_PIXEL_ROW).fill(0.0);
                e_block.row_mut(RIGHT_PIXEL_ROW).fill(0.0);
            }

            f_blocks.push(f_block);
            e_blocks.push(e_block);
            b_blocks.push(b_block);
        }

        Ok(LinearizedViews {
            f_blocks,
            e_blocks,
            b_blocks,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::camera::{StereoCalibration, StereoCamera};
    use crate::manifold::se3::{SE3Tangent, SE3};
    use crate::manifold::LieGroup;
    use crate::triangulation::TriangulationResult;
    use nalgebra::{Matrix6, Vector6};
    use std::sync::Arc;

    fn views_for(bodies: &[SE3], extrinsic: &SE3, calibration: &Arc<StereoCalibration>) -> CameraViews {
        let mut cameras = Vec::new();
        let mut body_jacobians = Vec::new();
        let mut extrinsic_jacobians = Vec::new();
        for body in bodies {
            let mut jb = Matrix6::zeros();
            let mut je = Matrix6::zeros();
            let pose = body.compose(extrinsic, Some(&mut jb), Some(&mut je));
            cameras.push(StereoCamera::new(pose, calibration.clone()));
            body_jacobians.push(jb);
            extrinsic_jacobians.push(je);
        }
        CameraViews {
            cameras,
            body_jacobians,
            extrinsic_jacobians,
            landmark: TriangulationResult::Degenerate,
        }
    }

    #[test]
    fn test_view_jacobian_numerical() {
        let calibration = Arc::new(StereoCalibration::new(1500.0, 1200.0, 0.0, 640.0, 480.0, 0.5));
        let body = SE3::from_translation_euler(0.2, -0.1, 0.0, 0.05, 0.02, -0.1);
        let extrinsic = SE3::from_translation_euler(0.1, 0.05, -0.02, 0.01, -0.03, 0.02);
        let point = Vector3::new(1.0, 1.0, 5.0);
        let measurement = StereoMeasurement::stereo(900.0, 760.0, 700.0);

        let views = views_for(&[body.clone()], &extrinsic, &calibration);
        let linearized = LinearizationEngine::new()
            .linearize(&views, &[measurement], &point)
            .unwrap();
        let f = linearized.f_blocks[0];

        let residual_at = |k: usize, step: f64| -> Vector3<f64> {
            let mut delta = Vector6::zeros();
            delta[k % 6] = step;
            let tangent = SE3Tangent::from_vector(delta);
            let (perturbed_body, perturbed_extrinsic) = if k < 6 {
                (body.plus(&tangent, None, None), extrinsic.clone())
            } else {
                (body.clone(), extrinsic.plus(&tangent, None, None))
            };
            let perturbed = views_for(&[perturbed_body], &perturbed_extrinsic, &calibration);
            LinearizationEngine::new()
                .linearize(&perturbed, &[measurement], &point)
                .unwrap()
                .b_blocks[0]
        };

        let eps = 1e-6;
        for k in 0..12 {
            // b = -(π - z), so ∂π/∂x = -∂b/∂x
            let numerical = -(residual_at(k, eps) - residual_at(k, -eps)) / (2.0 * eps);
            assert!((numerical - f.column(k)).norm() < 1e-4, "column {k}");
        }
    }

    #[test]
    fn test_mono_rows_are_zeroed() {
        let calibration = Arc::new(StereoCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0, 0.2));
        let views = views_for(&[SE3::identity()], &SE3::identity(), &calibration);
        let point = Vector3::new(0.3, -0.2, 4.0);

        let linearized = LinearizationEngine::new()
            .linearize(&views, &[StereoMeasurement::mono(330.0, 230.0)], &point)
            .unwrap();

        assert_eq!(linearized.f_blocks[0].row(1).norm(), 0.0);
        assert_eq!(linearized.e_blocks[0].row(1).norm(), 0.0);
        assert_eq!(linearized.b_blocks[0][1], 0.0);
        assert!(linearized.f_blocks[0].row(0).norm() > 0.0);
    }

    #[test]
    fn test_size_mismatch() {
        let calibration = Arc::new(StereoCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0, 0.2));
        let views = views_for(&[SE3::identity()], &SE3::identity(), &calibration);
        let result = LinearizationEngine::new().linearize(&views, &[], &Vector3::new(0.0, 0.0, 1.0));
        assert!(matches!(result, Err(SmartFactorError::SizeMismatch { .. })));
    }
}

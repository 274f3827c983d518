//! Resolves pose estimates into per-view stereo cameras.

use crate::camera::StereoCamera;
use crate::core::values::EstimateStore;
use crate::error::SmartFactorResult;
use crate::factors::measurement_set::MeasurementSet;
use crate::manifold::LieGroup;
use crate::triangulation::{TriangulationResult, Triangulator};
use nalgebra::Matrix6;
use std::sync::Arc;
use tracing::trace;

/// Cameras of every view at the current estimate, with the landmark triangulated from them.
#[derive(Debug, Clone)]
pub struct CameraViews {
    /// Camera pose `world_P_body ∘ body_P_cam` and calibration of each view
    pub cameras: Vec<StereoCamera>,
    /// ∂camera_pose/∂body_pose of each view
    pub body_jacobians: Vec<Matrix6<f64>>,
    /// ∂camera_pose/∂extrinsic_pose of each view
    pub extrinsic_jacobians: Vec<Matrix6<f64>>,
    pub landmark: TriangulationResult,
}

impl CameraViews {
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

/// Builds [`CameraViews`] from an estimate store. Nothing is cached between calls.
#[derive(Debug, Clone, Copy)]
pub struct CameraViewBuilder<'a> {
    triangulator: &'a dyn Triangulator,
}

impl<'a> CameraViewBuilder<'a> {
    pub fn new(triangulator: &'a dyn Triangulator) -> Self {
        Self { triangulator }
    }

    /// Compose body and extrinsic estimates of each view, then triangulate the landmark.
    ///
    /// # Errors
    /// [`SmartFactorError::KeyNotFound`] if a body pose or extrinsic is missing from `values`.
    pub fn build<V: EstimateStore + ?Sized>(
        &self,
        values: &V,
        views: &MeasurementSet,
    ) -> SmartFactorResult<CameraViews> {
        let count = views.len();
        let mut cameras = Vec::with_capacity(count);
        let mut body_jacobians = Vec::with_capacity(count);
        let mut extrinsic_jacobians = Vec::with_capacity(count);

        for i in 0..count {
            let world_p_body = values.pose(views.world_pose_keys()[i])?;
            let body_p_cam = values.pose(views.extrinsic_keys()[i])?;

            let mut body_jacobian = Matrix6::zeros();
            let mut extrinsic_jacobian = Matrix6::zeros();
            let camera_pose = world_p_body.compose(
                body_p_cam,
                Some(&mut body_jacobian),
                Some(&mut extrinsic_jacobian),
            );

            cameras.push(StereoCamera::new(
                camera_pose,
                Arc::clone(&views.calibrations()[i]),
            ));
            body_jacobians.push(body_jacobian);
            extrinsic_jacobians.push(extrinsic_jacobian);
        }

        let landmark = self.triangulator.triangulate(&cameras, views.measurements());
        trace!("Triangulated landmark from {} views: {}", count, landmark);

        Ok(CameraViews {
            cameras,
            body_jacobians,
            extrinsic_jacobians,
            landmark,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::camera::{StereoCalibration, StereoMeasurement};
    use crate::core::key::Key;
    use crate::core::values::Values;
    use crate::error::SmartFactorError;
    use crate::manifold::se3::SE3;
    use crate::triangulation::DltTriangulator;

    #[test]
    fn test_camera_pose_is_body_compose_extrinsic() {
        let body = SE3::from_translation_euler(1.0, 2.0, 0.0, 0.0, 0.0, 0.4);
        let extrinsic = SE3::from_translation_euler(0.1, 0.0, 0.2, -0.1, 0.0, 0.0);
        let values: Values = [
            (Key::symbol('x', 0), body.clone()),
            (Key::symbol('e', 0), extrinsic.clone()),
        ]
        .into_iter()
        .collect();

        let mut views = MeasurementSet::new();
        views.add(
            StereoMeasurement::stereo(300.0, 280.0, 200.0),
            Key::symbol('x', 0),
            Key::symbol('e', 0),
            Arc::new(StereoCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0, 0.2)),
        );

        let triangulator = DltTriangulator::default();
        let built = CameraViewBuilder::new(&triangulator)
            .build(&values, &views)
            .unwrap();

        let expected = body.compose(&extrinsic, None, None);
        assert!(built.cameras[0].pose().is_approx(&expected, 1e-12));
        assert!((built.body_jacobians[0] - extrinsic.inverse(None).adjoint()).norm() < 1e-12);
        assert!((built.extrinsic_jacobians[0] - Matrix6::identity()).norm() < 1e-12);
        assert_eq!(built.landmark, TriangulationResult::Degenerate);
    }

    #[test]
    fn test_missing_extrinsic_fails() {
        let values: Values = [(Key::symbol('x', 0), SE3::identity())].into_iter().collect();
        let mut views = MeasurementSet::new();
        views.add(
            StereoMeasurement::mono(300.0, 200.0),
            Key::symbol('x', 0),
            Key::symbol('e', 3),
            Arc::new(StereoCalibration::new(500.0, 500.0, 0.0, 320.0, 240.0, 0.2)),
        );

        let triangulator = DltTriangulator::default();
        let result = CameraViewBuilder::new(&triangulator).build(&values, &views);
        assert_eq!(
            result.unwrap_err(),
            SmartFactorError::KeyNotFound(Key::symbol('e', 3))
        );
    }
}

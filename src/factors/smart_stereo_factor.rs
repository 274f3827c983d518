//! Smart stereo projection factor over body poses and body-to-camera extrinsics.
//!
//! Each view `i` observes the landmark through the camera `world_P_body[i] ∘ body_P_cam[i]`.
//! Body poses and extrinsics are both optimization variables, and several views may share
//! either one, e.g. one extrinsic for every frame of a camera or one body pose for every
//! camera of a rig.
//!
//! Linearization runs the pipeline
//!
//! ```text
//! estimates → cameras → triangulation → per-view blocks → whitening + Schur → key collapse
//! ```
//!
//! and returns a [`HessianFactor`] over [`SmartStereoFactor::keys`]. A landmark that cannot
//! be triangulated yields an all-zero factor over the same keys.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use smart_stereo::camera::{StereoCalibration, StereoCamera, StereoMeasurement};
//! use smart_stereo::core::key::Key;
//! use smart_stereo::core::noise::IsotropicNoise;
//! use smart_stereo::core::values::Values;
//! use smart_stereo::factors::{SmartStereoFactor, SmartStereoParams};
//! use smart_stereo::manifold::{LieGroup, se3::SE3};
//! use nalgebra::Vector3;
//!
//! let calibration = Arc::new(StereoCalibration::new(1500.0, 1200.0, 0.0, 640.0, 480.0, 0.5));
//! let landmark = Vector3::new(1.0, 1.0, 5.0);
//! let extrinsic = SE3::identity();
//!
//! let mut values = Values::new();
//! values.insert(Key::symbol('e', 0), extrinsic.clone());
//!
//! let noise = Arc::new(IsotropicNoise::new(3, 1.0).unwrap());
//! let mut factor = SmartStereoFactor::new(noise, SmartStereoParams::default());
//! for i in 0..3u64 {
//!     let body = SE3::from_translation_euler(i as f64, 0.0, 0.0, 0.0, 0.0, 0.0);
//!     let camera = StereoCamera::new(body.clone(), calibration.clone());
//!     let pixels = camera.project(&landmark, None, None).unwrap();
//!     values.insert(Key::symbol('x', i), body);
//!     factor.add(
//!         StereoMeasurement::stereo(pixels.x, pixels.y, pixels.z),
//!         Key::symbol('x', i),
//!         Key::symbol('e', 0),
//!         calibration.clone(),
//!     );
//! }
//!
//! let hessian = factor.linearize(&values).unwrap();
//! assert_eq!(hessian.keys().len(), 4);
//! assert!(hessian.constant_term().abs() < 1e-6);
//! ```

use crate::camera::{StereoCalibration, StereoCamera, StereoMeasurement};
use crate::core::key::Key;
use crate::core::noise::NoiseModel;
use crate::core::values::EstimateStore;
use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::camera_views::CameraViewBuilder;
use crate::factors::hessian_factor::HessianFactor;
use crate::factors::key_collapser::KeyCollapser;
use crate::factors::linearization::LinearizationEngine;
use crate::factors::measurement_set::MeasurementSet;
use crate::factors::schur_eliminator::SchurEliminator;
use crate::factors::{LinearizationMode, SmartStereoParams};
use crate::triangulation::{DltTriangulator, TriangulationResult, Triangulator};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Structureless stereo factor eliminating one landmark.
#[derive(Debug, Clone)]
pub struct SmartStereoFactor {
    noise: Arc<dyn NoiseModel>,
    params: SmartStereoParams,
    triangulator: Arc<dyn Triangulator>,
    views: MeasurementSet,
}

impl SmartStereoFactor {
    /// Empty factor with one noise model for every view.
    ///
    /// The landmark is triangulated with a [`DltTriangulator`] configured from
    /// `params.triangulation`.
    pub fn new(noise: Arc<dyn NoiseModel>, params: SmartStereoParams) -> Self {
        Self {
            noise,
            params,
            triangulator: Arc::new(DltTriangulator::new(params.triangulation)),
            views: MeasurementSet::new(),
        }
    }

    /// Replace the landmark triangulator.
    pub fn with_triangulator(mut self, triangulator: Arc<dyn Triangulator>) -> Self {
        self.triangulator = triangulator;
        self
    }

    /// Add one view observing the landmark from `world_pose_key ∘ extrinsic_key`.
    pub fn add(
        &mut self,
        measurement: StereoMeasurement,
        world_pose_key: Key,
        extrinsic_key: Key,
        calibration: Arc<StereoCalibration>,
    ) {
        self.views
            .add(measurement, world_pose_key, extrinsic_key, calibration);
    }

    /// Add several views, each with its own calibration.
    pub fn add_batch(
        &mut self,
        measurements: &[StereoMeasurement],
        world_pose_keys: &[Key],
        extrinsic_keys: &[Key],
        calibrations: &[Arc<StereoCalibration>],
    ) -> SmartFactorResult<()> {
        self.views
            .add_batch(measurements, world_pose_keys, extrinsic_keys, calibrations)
    }

    /// Add several views sharing one calibration.
    pub fn add_batch_shared(
        &mut self,
        measurements: &[StereoMeasurement],
        world_pose_keys: &[Key],
        extrinsic_keys: &[Key],
        calibration: &Arc<StereoCalibration>,
    ) -> SmartFactorResult<()> {
        self.views
            .add_batch_shared(measurements, world_pose_keys, extrinsic_keys, calibration)
    }

    /// Unique keys, in order of first appearance.
    pub fn keys(&self) -> &[Key] {
        self.views.keys()
    }

    pub fn measurements(&self) -> &[StereoMeasurement] {
        self.views.measurements()
    }

    pub fn world_pose_keys(&self) -> &[Key] {
        self.views.world_pose_keys()
    }

    pub fn extrinsic_pose_keys(&self) -> &[Key] {
        self.views.extrinsic_keys()
    }

    pub fn calibrations(&self) -> &[Arc<StereoCalibration>] {
        self.views.calibrations()
    }

    pub fn params(&self) -> &SmartStereoParams {
        &self.params
    }

    pub fn noise_model(&self) -> &dyn NoiseModel {
        self.noise.as_ref()
    }

    /// Number of views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Camera of every view at the current estimates.
    pub fn cameras<V: EstimateStore + ?Sized>(
        &self,
        values: &V,
    ) -> SmartFactorResult<Vec<StereoCamera>> {
        Ok(self.camera_builder().build(values, &self.views)?.cameras)
    }

    /// Triangulate the landmark at the current estimates.
    pub fn triangulate<V: EstimateStore + ?Sized>(
        &self,
        values: &V,
    ) -> SmartFactorResult<TriangulationResult> {
        Ok(self.camera_builder().build(values, &self.views)?.landmark)
    }

    fn camera_builder(&self) -> CameraViewBuilder<'_> {
        CameraViewBuilder::new(self.triangulator.as_ref())
    }

    fn report_degenerate(&self, landmark: &TriangulationResult) {
        if self.params.verbose_cheirality && *landmark == TriangulationResult::BehindCamera {
            warn!(
                "Landmark behind camera for factor on keys {:?}; returning zero factor",
                self.keys()
            );
        } else {
            debug!(
                "Landmark not triangulated ({}); returning zero factor over {} keys",
                landmark,
                self.keys().len()
            );
        }
    }

    /// Whitened reprojection error `½ Σ ‖R eᵢ‖²` at the triangulated landmark.
    ///
    /// A landmark that cannot be triangulated contributes zero.
    pub fn error<V: EstimateStore + ?Sized>(&self, values: &V) -> SmartFactorResult<f64> {
        let sqrt_info = SchurEliminator::sqrt_information(self.noise.as_ref())?;
        let views = self.camera_builder().build(values, &self.views)?;
        let Some(point) = views.landmark.point() else {
            self.report_degenerate(&views.landmark);
            return Ok(0.0);
        };

        let mut total = 0.0;
        for (camera, measurement) in views.cameras.iter().zip(self.views.measurements()) {
            let predicted = camera.project(point, None, None)?;
            total += (sqrt_info * measurement.error(&predicted)).norm_squared();
        }
        Ok(0.5 * total)
    }

    /// Linearize with the configured damping `params.lambda`.
    pub fn linearize<V: EstimateStore + ?Sized>(
        &self,
        values: &V,
    ) -> SmartFactorResult<HessianFactor> {
        self.linearize_damped(values, self.params.lambda)
    }

    /// Linearize with landmark damping `lambda`.
    ///
    /// # Errors
    /// - [`SmartFactorError::UnsupportedMode`] for any mode other than
    ///   [`LinearizationMode::Hessian`]
    /// - [`SmartFactorError::KeyNotFound`] if an estimate is missing
    /// - [`SmartFactorError::SizeMismatch`] if the noise model is not 3-dimensional
    pub fn linearize_damped<V: EstimateStore + ?Sized>(
        &self,
        values: &V,
        lambda: f64,
    ) -> SmartFactorResult<HessianFactor> {
        if self.params.linearization_mode != LinearizationMode::Hessian {
            return Err(SmartFactorError::UnsupportedMode(
                self.params.linearization_mode,
            ));
        }
        SchurEliminator::sqrt_information(self.noise.as_ref())?;

        let keys = self.keys().to_vec();
        let views = self.camera_builder().build(values, &self.views)?;
        let Some(point) = views.landmark.point() else {
            self.report_degenerate(&views.landmark);
            return Ok(HessianFactor::zero(keys));
        };

        let linearized =
            LinearizationEngine::new().linearize(&views, self.views.measurements(), point)?;

        let mut collapser = KeyCollapser::new(&self.views.slot_keys(), &keys)?;
        let eliminated = SchurEliminator::new(lambda, self.params.diagonal_damping).eliminate(
            linearized,
            self.noise.as_ref(),
            &mut collapser,
        )?;
        if !eliminated {
            return Ok(HessianFactor::zero(keys));
        }

        HessianFactor::new(keys, collapser.into_matrix())
    }

    /// Same views, keys, calibrations and parameters, with measurements within `tolerance`.
    pub fn equals(&self, other: &Self, tolerance: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= tolerance;
        let same_measurements = self.measurements().len() == other.measurements().len()
            && self
                .measurements()
                .iter()
                .zip(other.measurements())
                .all(|(a, b)| match (a.u_r(), b.u_r()) {
                    (Some(ra), Some(rb)) => {
                        close(a.u_l(), b.u_l()) && close(ra, rb) && close(a.v(), b.v())
                    }
                    (None, None) => close(a.u_l(), b.u_l()) && close(a.v(), b.v()),
                    _ => false,
                });
        let same_calibrations = self.calibrations().len() == other.calibrations().len()
            && self
                .calibrations()
                .iter()
                .zip(other.calibrations())
                .all(|(a, b)| a.equals(b, tolerance));

        same_measurements
            && same_calibrations
            && self.world_pose_keys() == other.world_pose_keys()
            && self.extrinsic_pose_keys() == other.extrinsic_pose_keys()
            && self.params == other.params
    }
}

impl fmt::Display for SmartStereoFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SmartStereoFactor({} views, mode: {})",
            self.len(),
            self.params.linearization_mode
        )?;
        for i in 0..self.len() {
            writeln!(
                f,
                "  {} ∘ {}: {} {}",
                self.world_pose_keys()[i],
                self.extrinsic_pose_keys()[i],
                self.measurements()[i],
                self.calibrations()[i]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::core::noise::UnitNoise;
    use crate::core::values::Values;
    use crate::manifold::se3::SE3;
    use crate::manifold::LieGroup;
    use nalgebra::Vector3;

    fn calibration() -> Arc<StereoCalibration> {
        Arc::new(StereoCalibration::new(1500.0, 1200.0, 0.0, 640.0, 480.0, 0.5))
    }

    fn observed_factor(params: SmartStereoParams) -> (SmartStereoFactor, Values) {
        let landmark = Vector3::new(1.0, 1.0, 5.0);
        let extrinsic = SE3::from_translation_euler(0.1, 0.0, 0.05, 0.0, 0.02, 0.0);
        let mut values = Values::new();
        values.insert(Key::symbol('e', 0), extrinsic.clone());

        let mut factor = SmartStereoFactor::new(Arc::new(UnitNoise::new(3)), params);
        for i in 0..3u64 {
            let body = SE3::from_translation_euler(i as f64, 0.0, 0.0, 0.0, 0.0, 0.0);
            let camera = StereoCamera::new(body.compose(&extrinsic, None, None), calibration());
            let pixels = camera.project(&landmark, None, None).unwrap();
            values.insert(Key::symbol('x', i), body);
            factor.add(
                StereoMeasurement::stereo(pixels.x, pixels.y, pixels.z),
                Key::symbol('x', i),
                Key::symbol('e', 0),
                calibration(),
            );
        }
        (factor, values)
    }

    #[test]
    fn test_unsupported_mode_rejected_first() {
        let params =
            SmartStereoParams::new().with_linearization_mode(LinearizationMode::JacobianSvd);
        let (factor, _) = observed_factor(params);
        let empty = Values::new();

        assert_eq!(
            factor.linearize(&empty).unwrap_err(),
            SmartFactorError::UnsupportedMode(LinearizationMode::JacobianSvd)
        );
    }

    #[test]
    fn test_missing_key_reported() {
        let (factor, mut values) = observed_factor(SmartStereoParams::default());
        let mut partial = Values::new();
        for key in [Key::symbol('x', 0), Key::symbol('x', 1), Key::symbol('e', 0)] {
            partial.insert(key, values.get(key).unwrap().clone());
        }
        assert_eq!(
            factor.linearize(&partial).unwrap_err(),
            SmartFactorError::KeyNotFound(Key::symbol('x', 2))
        );
        values.insert(Key::symbol('x', 2), SE3::identity());
        assert!(factor.linearize(&values).is_ok());
    }

    #[test]
    fn test_error_zero_at_ground_truth() {
        let (factor, values) = observed_factor(SmartStereoParams::default());
        assert!(factor.error(&values).unwrap() < 1e-10);
        assert!(factor.triangulate(&values).unwrap().is_valid());
    }

    #[test]
    fn test_equals() {
        let (a, _) = observed_factor(SmartStereoParams::default());
        let (b, _) = observed_factor(SmartStereoParams::default());
        let (c, _) = observed_factor(SmartStereoParams::new().with_diagonal_damping(true));
        assert!(a.equals(&b, 1e-9));
        assert!(!a.equals(&c, 1e-9));
    }

    #[test]
    fn test_display_lists_views() {
        let (factor, _) = observed_factor(SmartStereoParams::default());
        let text = factor.to_string();
        assert!(text.starts_with("SmartStereoFactor(3 views, mode: Hessian)"));
        assert!(text.contains("x2 ∘ e0"));
    }
}

//! Shared utilities for smart stereo factor integration tests
//!
//! Builds small stereo rigs with known ground truth, generates their observations and
//! provides the dense reference computations the tests compare against.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use nalgebra::{DMatrix, Vector3, Vector6};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smart_stereo::camera::{StereoCalibration, StereoCamera, StereoMeasurement};
use smart_stereo::core::key::Key;
use smart_stereo::core::noise::NoiseModel;
use smart_stereo::core::values::Values;
use smart_stereo::factors::{SmartStereoFactor, SmartStereoParams};
use smart_stereo::manifold::se3::{SE3Tangent, SE3};
use smart_stereo::manifold::LieGroup;
use std::sync::Arc;

/// Rectified stereo rig used throughout the tests (fx, fy, skew, u0, v0, baseline)
pub fn stereo_calibration() -> Arc<StereoCalibration> {
    Arc::new(StereoCalibration::new(1500.0, 1200.0, 0.0, 640.0, 480.0, 0.5))
}

/// Landmark shared by the single-landmark scenarios
pub fn default_landmark() -> Vector3<f64> {
    Vector3::new(1.0, 1.0, 5.0)
}

/// Body-to-camera extrinsic with a small offset and tilt
pub fn default_extrinsic() -> SE3 {
    SE3::from_translation_euler(0.1, -0.05, 0.05, 0.01, 0.02, -0.01)
}

/// Second camera of a two-camera rig, looking slightly to the side
pub fn second_extrinsic() -> SE3 {
    SE3::from_translation_euler(0.6, 0.0, 0.0, 0.0, -0.03, 0.0)
}

/// Body pose translated along x with identity rotation
pub fn body_at(x: f64) -> SE3 {
    SE3::from_translation_euler(x, 0.0, 0.0, 0.0, 0.0, 0.0)
}

/// Stereo observation of `landmark` from `world_p_body ∘ body_p_cam`, plus uniform pixel noise
///
/// # Arguments
/// * `pixel_noise` - Half-width of the uniform noise added to every coordinate (0 for exact)
/// * `rng` - Random source, ignored when `pixel_noise` is 0
pub fn observe(
    world_p_body: &SE3,
    body_p_cam: &SE3,
    calibration: &Arc<StereoCalibration>,
    landmark: &Vector3<f64>,
    pixel_noise: f64,
    rng: &mut StdRng,
) -> StereoMeasurement {
    let camera = StereoCamera::new(world_p_body.compose(body_p_cam, None, None), calibration.clone());
    let pixels = camera.project(landmark, None, None).unwrap();
    let mut noise = || {
        if pixel_noise > 0.0 {
            rng.random_range(-pixel_noise..pixel_noise)
        } else {
            0.0
        }
    };
    StereoMeasurement::stereo(pixels.x + noise(), pixels.y + noise(), pixels.z + noise())
}

/// Factor observing `landmark` once per `(body key, extrinsic key)` pair
///
/// Every key must already be present in `values`.
pub fn build_factor(
    noise: Arc<dyn NoiseModel>,
    params: SmartStereoParams,
    views: &[(Key, Key)],
    values: &Values,
    landmark: &Vector3<f64>,
    pixel_noise: f64,
    seed: u64,
) -> SmartStereoFactor {
    let calibration = stereo_calibration();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut factor = SmartStereoFactor::new(noise, params);
    for &(body_key, extrinsic_key) in views {
        let measurement = observe(
            values.get(body_key).unwrap(),
            values.get(extrinsic_key).unwrap(),
            &calibration,
            landmark,
            pixel_noise,
            &mut rng,
        );
        factor.add(measurement, body_key, extrinsic_key, calibration.clone());
    }
    factor
}

/// Three body poses at x = 0, 1, 2 sharing one extrinsic
pub fn three_view_scenario() -> (Values, Vec<(Key, Key)>) {
    let e0 = Key::symbol('e', 0);
    let mut values = Values::new();
    values.insert(e0, default_extrinsic());
    let mut views = Vec::new();
    for i in 0..3u64 {
        values.insert(Key::symbol('x', i), body_at(i as f64));
        views.push((Key::symbol('x', i), e0));
    }
    (values, views)
}

/// Two body poses carrying a two-camera rig: four views over four keys
pub fn rig_scenario() -> (Values, Vec<(Key, Key)>) {
    let (x0, x1) = (Key::symbol('x', 0), Key::symbol('x', 1));
    let (e0, e1) = (Key::symbol('e', 0), Key::symbol('e', 1));
    let mut values = Values::new();
    values.insert(x0, body_at(0.0));
    values.insert(x1, SE3::from_translation_euler(1.0, 0.2, 0.0, 0.0, 0.0, 0.05));
    values.insert(e0, default_extrinsic());
    values.insert(e1, second_extrinsic());
    (values, vec![(x0, e0), (x0, e1), (x1, e0), (x1, e1)])
}

/// Perturb a pose by a uniform tangent step of half-width `scale`
pub fn perturb_pose(pose: &SE3, scale: f64, rng: &mut StdRng) -> SE3 {
    let delta = Vector6::from_fn(|_, _| rng.random_range(-scale..scale));
    pose.plus(&SE3Tangent::from_vector(delta), None, None)
}

/// Expand a per-slot augmented matrix onto unique keys: `Sᵀ H_slots S`
///
/// Slot `s` owns rows `6s..6s+6`; the trailing row and column carry the linear term and
/// the constant.
pub fn expand_slots(slot_keys: &[Key], unique_keys: &[Key], slot_matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let n_slots = slot_keys.len();
    let n = unique_keys.len();
    let mut selection = DMatrix::zeros(6 * n_slots + 1, 6 * n + 1);
    for (slot, key) in slot_keys.iter().enumerate() {
        let unique = unique_keys.iter().position(|k| k == key).unwrap();
        for d in 0..6 {
            selection[(6 * slot + d, 6 * unique + d)] = 1.0;
        }
    }
    selection[(6 * n_slots, 6 * n)] = 1.0;
    selection.transpose() * slot_matrix * selection
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
    matrix.clone().symmetric_eigen().eigenvalues.min()
}

/// Largest absolute entry relative difference between two matrices
pub fn relative_difference(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    (a - b).amax() / a.amax().max(b.amax()).max(1.0)
}

//! Per-view observation records of one landmark.

use crate::camera::{StereoCalibration, StereoMeasurement};
use crate::core::key::Key;
use crate::error::{SmartFactorError, SmartFactorResult};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Parallel, append-only view records in observation order.
///
/// Keys may repeat across views: several views can share one body pose (a multi-camera rig)
/// or one extrinsic (a camera seen at several times). [`MeasurementSet::keys`] lists every
/// key once, in order of first appearance, body pose key before extrinsic key per view.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSet {
    measurements: Vec<StereoMeasurement>,
    world_pose_keys: Vec<Key>,
    extrinsic_keys: Vec<Key>,
    calibrations: Vec<Arc<StereoCalibration>>,
    keys: Vec<Key>,
    seen: BTreeSet<Key>,
}

impl MeasurementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one view.
    pub fn add(
        &mut self,
        measurement: StereoMeasurement,
        world_pose_key: Key,
        extrinsic_key: Key,
        calibration: Arc<StereoCalibration>,
    ) {
        self.measurements.push(measurement);
        self.world_pose_keys.push(world_pose_key);
        self.extrinsic_keys.push(extrinsic_key);
        self.calibrations.push(calibration);
        self.register_key(world_pose_key);
        self.register_key(extrinsic_key);
    }

    /// Append several views with one calibration each.
    ///
    /// Nothing is appended if the input lengths disagree.
    pub fn add_batch(
        &mut self,
        measurements: &[StereoMeasurement],
        world_pose_keys: &[Key],
        extrinsic_keys: &[Key],
        calibrations: &[Arc<StereoCalibration>],
    ) -> SmartFactorResult<()> {
        let count = measurements.len();
        Self::check_len("world pose keys", count, world_pose_keys.len())?;
        Self::check_len("extrinsic keys", count, extrinsic_keys.len())?;
        Self::check_len("calibrations", count, calibrations.len())?;

        for i in 0..count {
            self.add(
                measurements[i],
                world_pose_keys[i],
                extrinsic_keys[i],
                Arc::clone(&calibrations[i]),
            );
        }
        Ok(())
    }

    /// Append several views sharing one calibration.
    ///
    /// Nothing is appended if the input lengths disagree.
    pub fn add_batch_shared(
        &mut self,
        measurements: &[StereoMeasurement],
        world_pose_keys: &[Key],
        extrinsic_keys: &[Key],
        calibration: &Arc<StereoCalibration>,
    ) -> SmartFactorResult<()> {
        let count = measurements.len();
        Self::check_len("world pose keys", count, world_pose_keys.len())?;
        Self::check_len("extrinsic keys", count, extrinsic_keys.len())?;

        for i in 0..count {
            self.add(
                measurements[i],
                world_pose_keys[i],
                extrinsic_keys[i],
                Arc::clone(calibration),
            );
        }
        Ok(())
    }

    fn check_len(what: &'static str, expected: usize, actual: usize) -> SmartFactorResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(SmartFactorError::size_mismatch(what, expected, actual))
        }
    }

    fn register_key(&mut self, key: Key) {
        if self.seen.insert(key) {
            self.keys.push(key);
        }
    }

    pub fn measurements(&self) -> &[StereoMeasurement] {
        &self.measurements
    }

    pub fn world_pose_keys(&self) -> &[Key] {
        &self.world_pose_keys
    }

    pub fn extrinsic_keys(&self) -> &[Key] {
        &self.extrinsic_keys
    }

    pub fn calibrations(&self) -> &[Arc<StereoCalibration>] {
        &self.calibrations
    }

    /// Unique keys in order of first appearance.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Keys of every parameter slot: `[body₀, ext₀, body₁, ext₁, …]`, repeats included.
    pub fn slot_keys(&self) -> Vec<Key> {
        self.world_pose_keys
            .iter()
            .zip(&self.extrinsic_keys)
            .flat_map(|(&body, &extrinsic)| [body, extrinsic])
            .collect()
    }

    /// Number of views.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

//! Stereo pixel observations.

use nalgebra::Vector3;
use std::fmt;

/// One stereo observation of a landmark.
///
/// `Mono` marks a view whose right pixel is missing (occluded or failed matching). Its
/// right-pixel row carries no information in the linearized system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StereoMeasurement {
    Stereo { u_l: f64, u_r: f64, v: f64 },
    Mono { u_l: f64, v: f64 },
}

impl StereoMeasurement {
    pub const fn stereo(u_l: f64, u_r: f64, v: f64) -> Self {
        StereoMeasurement::Stereo { u_l, u_r, v }
    }

    pub const fn mono(u_l: f64, v: f64) -> Self {
        StereoMeasurement::Mono { u_l, v }
    }

    pub fn u_l(&self) -> f64 {
        match *self {
            StereoMeasurement::Stereo { u_l, .. } | StereoMeasurement::Mono { u_l, .. } => u_l,
        }
    }

    pub fn u_r(&self) -> Option<f64> {
        match *self {
            StereoMeasurement::Stereo { u_r, .. } => Some(u_r),
            StereoMeasurement::Mono { .. } => None,
        }
    }

    pub fn v(&self) -> f64 {
        match *self {
            StereoMeasurement::Stereo { v, .. } | StereoMeasurement::Mono { v, .. } => v,
        }
    }

    pub fn is_mono(&self) -> bool {
        matches!(self, StereoMeasurement::Mono { .. })
    }

    /// Reprojection error `predicted - measured` in `(u_l, u_r, v)` order.
    ///
    /// The right-pixel component is zero for a `Mono` observation.
    pub fn error(&self, predicted: &Vector3<f64>) -> Vector3<f64> {
        let u_r_error = self.u_r().map_or(0.0, |u_r| predicted.y - u_r);
        Vector3::new(predicted.x - self.u_l(), u_r_error, predicted.z - self.v())
    }
}

impl fmt::Display for StereoMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StereoMeasurement::Stereo { u_l, u_r, v } => {
                write!(f, "(uL: {u_l:.3}, uR: {u_r:.3}, v: {v:.3})")
            }
            StereoMeasurement::Mono { u_l, v } => write!(f, "(uL: {u_l:.3}, uR: -, v: {v:.3})"),
        }
    }
}

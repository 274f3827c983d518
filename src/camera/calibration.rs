//! Rectified stereo rig intrinsics.

use nalgebra::Matrix3;
use std::fmt;

/// Intrinsics of a rectified stereo pair.
///
/// Both cameras share `fx, fy, skew, u0, v0`; the right camera sits `baseline` meters
/// along the left camera's +x axis.
///
/// # Projection Model
///
/// For a point `(x, y, z)` in the left camera frame:
/// ```text
/// u_l = u0 + (fx * x + skew * y) / z
/// u_r = u0 + (fx * (x - baseline) + skew * y) / z
/// v   = v0 + fy * y / z
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoCalibration {
    /// Focal length in x direction (pixels)
    pub fx: f64,
    /// Focal length in y direction (pixels)
    pub fy: f64,
    /// Skew between the image axes
    pub skew: f64,
    /// Principal point x coordinate (pixels)
    pub u0: f64,
    /// Principal point y coordinate (pixels)
    pub v0: f64,
    /// Distance between the two optical centers (meters)
    pub baseline: f64,
}

impl StereoCalibration {
    pub const fn new(fx: f64, fy: f64, skew: f64, u0: f64, v0: f64, baseline: f64) -> Self {
        StereoCalibration {
            fx,
            fy,
            skew,
            u0,
            v0,
            baseline,
        }
    }

    /// Upper-triangular intrinsic matrix K of the left camera.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, self.skew, self.u0, 0.0, self.fy, self.v0, 0.0, 0.0, 1.0,
        )
    }

    /// Component-wise comparison within `tolerance`.
    pub fn equals(&self, other: &Self, tolerance: f64) -> bool {
        (self.fx - other.fx).abs() <= tolerance
            && (self.fy - other.fy).abs() <= tolerance
            && (self.skew - other.skew).abs() <= tolerance
            && (self.u0 - other.u0).abs() <= tolerance
            && (self.v0 - other.v0).abs() <= tolerance
            && (self.baseline - other.baseline).abs() <= tolerance
    }
}

impl fmt::Display for StereoCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StereoCalibration(fx: {:.3}, fy: {:.3}, s: {:.3}, u0: {:.3}, v0: {:.3}, b: {:.4})",
            self.fx, self.fy, self.skew, self.u0, self.v0, self.baseline
        )
    }
}

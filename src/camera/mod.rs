//! Stereo camera model
//!
//! - `calibration`: intrinsics of a rectified stereo rig ([`StereoCalibration`])
//! - `measurement`: left/right pixel observations ([`StereoMeasurement`])
//! - `stereo_camera`: a posed rig that projects points with analytic Jacobians

pub mod calibration;
pub mod measurement;
pub mod stereo_camera;

pub use calibration::StereoCalibration;
pub use measurement::StereoMeasurement;
pub use stereo_camera::StereoCamera;

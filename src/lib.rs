//! Smart stereo projection factor with extrinsic calibration.
//!
//! Linearizes every stereo observation of one landmark about its triangulated position and
//! eliminates the landmark, producing a dense Hessian factor over the body poses and
//! body-to-camera extrinsics that observed it.

pub mod camera;
pub mod core;
pub mod error;
pub mod factors;
pub mod linalg;
pub mod logger;
pub mod manifold;
pub mod triangulation;

pub use camera::{StereoCalibration, StereoCamera, StereoMeasurement};
pub use core::key::Key;
pub use core::values::{EstimateStore, Values};
pub use error::{SmartFactorError, SmartFactorResult};
pub use factors::{
    linearize_all, HessianFactor, LinearizationMode, SmartStereoFactor, SmartStereoParams,
};
pub use logger::{init_logger, init_logger_with_level, init_test_logger};
pub use triangulation::{DltTriangulator, TriangulationParams, TriangulationResult, Triangulator};

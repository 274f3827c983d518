//! Error types for the smart-stereo library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.
//!
//! A degenerate landmark is not an error: it produces a zero-information factor.

use crate::core::key::Key;
use crate::factors::LinearizationMode;
use crate::manifold::ManifoldError;
use thiserror::Error;

/// Main result type used throughout the smart-stereo library
pub type SmartFactorResult<T> = Result<T, SmartFactorError>;

/// Main error type for the smart-stereo library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmartFactorError {
    /// Per-view arrays (measurements, keys, calibrations, cameras) disagree in length
    #[error("Size mismatch in {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Requested linearization mode is not implemented by this factor
    #[error("Unsupported linearization mode: {0}")]
    UnsupportedMode(LinearizationMode),

    /// Estimate store has no value for the requested key
    #[error("Key {0} not found in values")]
    KeyNotFound(Key),

    /// Point projects behind (or onto) the camera plane
    #[error("Cheirality violation: point depth {depth:.6} is not positive")]
    Cheirality { depth: f64 },

    /// Noise model could not be constructed from the given parameters
    #[error("Invalid noise model: {0}")]
    InvalidNoiseModel(String),

    /// Manifold operations errors
    #[error("Manifold error: {0}")]
    Manifold(String),

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),
}

impl SmartFactorError {
    /// Shorthand for a [`SmartFactorError::SizeMismatch`].
    pub fn size_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        SmartFactorError::SizeMismatch {
            what,
            expected,
            actual,
        }
    }
}

impl From<ManifoldError> for SmartFactorError {
    fn from(err: ManifoldError) -> Self {
        SmartFactorError::Manifold(err.to_string())
    }
}

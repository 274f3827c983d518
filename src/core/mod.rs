//! Core collaborators of the smart factor
//!
//! This module contains the small building blocks the linearization pipeline consumes:
//! - Variable keys
//! - The estimate store the factor linearizes against
//! - Noise models for whitening residuals and Jacobians

pub mod key;
pub mod noise;
pub mod values;

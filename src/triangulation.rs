//! Landmark triangulation from stereo views.
//!
//! The landmark is recovered from the left-camera pixels `(u_l, v)` of every view with the
//! direct linear transform (DLT): each view contributes the two rows
//!
//! ```text
//! u P₃ - P₁
//! v P₃ - P₂
//! ```
//!
//! of a homogeneous system `A X = 0`, where `Pₖ` is the k-th row of the left camera's
//! projection matrix `K [Rᵀ | -Rᵀt]`. The solution is the right singular vector of `A`
//! with the smallest singular value. An optional Gauss-Newton pass then refines the point
//! on the left-pixel reprojection error.
//!
//! The result is checked for rank, distance, cheirality and reprojection error, in that
//! order; any failed check yields a non-valid [`TriangulationResult`].

use crate::camera::{StereoCamera, StereoMeasurement};
use nalgebra::{DMatrix, Matrix3, Matrix3x4, Vector3};
use std::fmt;
use tracing::trace;

/// Maximum number of Gauss-Newton iterations in the refinement pass.
const MAX_REFINEMENT_ITERATIONS: usize = 10;

/// Refinement stops once the update norm falls below this value.
const REFINEMENT_STEP_TOLERANCE: f64 = 1e-10;

/// Outcome of triangulating one landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriangulationResult {
    /// Well-constrained point in the world frame
    Valid(Vector3<f64>),
    /// Fewer than two views, or the views do not constrain the point
    Degenerate,
    /// Point farther than the configured landmark distance threshold
    FarPoint,
    /// Point behind one of the cameras
    BehindCamera,
    /// Reprojection error above the configured outlier threshold
    Outlier,
}

impl TriangulationResult {
    pub fn point(&self) -> Option<&Vector3<f64>> {
        match self {
            TriangulationResult::Valid(point) => Some(point),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TriangulationResult::Valid(_))
    }
}

impl fmt::Display for TriangulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriangulationResult::Valid(p) => write!(f, "Valid([{:.4}, {:.4}, {:.4}])", p.x, p.y, p.z),
            TriangulationResult::Degenerate => write!(f, "Degenerate"),
            TriangulationResult::FarPoint => write!(f, "FarPoint"),
            TriangulationResult::BehindCamera => write!(f, "BehindCamera"),
            TriangulationResult::Outlier => write!(f, "Outlier"),
        }
    }
}

/// Triangulation settings.
///
/// Negative thresholds disable the corresponding check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangulationParams {
    /// Singular values at or below this count as zero in the DLT rank test
    pub rank_tolerance: f64,
    /// Maximum distance between the point and any camera center
    pub landmark_distance_threshold: f64,
    /// Maximum left-pixel reprojection error of any view
    pub dynamic_outlier_rejection_threshold: f64,
    /// Run Gauss-Newton on the DLT estimate
    pub enable_refinement: bool,
}

impl Default for TriangulationParams {
    fn default() -> Self {
        Self {
            rank_tolerance: 1.0,
            landmark_distance_threshold: -1.0,
            dynamic_outlier_rejection_threshold: -1.0,
            enable_refinement: false,
        }
    }
}

impl TriangulationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rank_tolerance(mut self, rank_tolerance: f64) -> Self {
        self.rank_tolerance = rank_tolerance;
        self
    }

    pub fn with_landmark_distance_threshold(mut self, threshold: f64) -> Self {
        self.landmark_distance_threshold = threshold;
        self
    }

    pub fn with_dynamic_outlier_rejection_threshold(mut self, threshold: f64) -> Self {
        self.dynamic_outlier_rejection_threshold = threshold;
        self
    }

    pub fn with_refinement(mut self, enable: bool) -> Self {
        self.enable_refinement = enable;
        self
    }
}

/// Estimates a landmark from posed stereo cameras and their measurements.
pub trait Triangulator: fmt::Debug + Send + Sync {
    fn triangulate(
        &self,
        cameras: &[StereoCamera],
        measurements: &[StereoMeasurement],
    ) -> TriangulationResult;
}

/// DLT triangulator with optional Gauss-Newton refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DltTriangulator {
    params: TriangulationParams,
}

impl DltTriangulator {
    pub fn new(params: TriangulationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TriangulationParams {
        &self.params
    }

    fn projection_matrix(camera: &StereoCamera) -> Matrix3x4<f64> {
        let rotation_t = camera.pose().rotation_matrix().transpose();
        let mut extrinsic = Matrix3x4::zeros();
        extrinsic.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation_t);
        extrinsic
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&(-rotation_t * camera.pose().translation()));
        camera.calibration().k_matrix() * extrinsic
    }

    fn dlt(
        &self,
        cameras: &[StereoCamera],
        measurements: &[StereoMeasurement],
    ) -> Option<Vector3<f64>> {
        let mut system = DMatrix::zeros(2 * cameras.len(), 4);
        for (i, (camera, measurement)) in cameras.iter().zip(measurements).enumerate() {
            let projection = Self::projection_matrix(camera);
            let row_u = measurement.u_l() * projection.row(2) - projection.row(0);
            let row_v = measurement.v() * projection.row(2) - projection.row(1);
            system.row_mut(2 * i).copy_from(&row_u);
            system.row_mut(2 * i + 1).copy_from(&row_v);
        }

        let svd = system.svd(false, true);
        let v_t = svd.v_t?;
        let rank = svd
            .singular_values
            .iter()
            .filter(|&&s| s > self.params.rank_tolerance)
            .count();
        if rank < 3 {
            trace!("DLT rank {} below 3", rank);
            return None;
        }

        let (min_index, _) = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))?;
        let homogeneous = v_t.row(min_index);
        if homogeneous[3].abs() < f64::EPSILON {
            return None;
        }

        Some(Vector3::new(
            homogeneous[0] / homogeneous[3],
            homogeneous[1] / homogeneous[3],
            homogeneous[2] / homogeneous[3],
        ))
    }

    /// Gauss-Newton on the left-pixel reprojection error.
    fn refine(
        cameras: &[StereoCamera],
        measurements: &[StereoMeasurement],
        initial: Vector3<f64>,
    ) -> Vector3<f64> {
        let mut point = initial;

        for _ in 0..MAX_REFINEMENT_ITERATIONS {
            let mut hessian = Matrix3::zeros();
            let mut gradient = Vector3::zeros();

            for (camera, measurement) in cameras.iter().zip(measurements) {
                let mut jacobian = Matrix3::zeros();
                let Ok(pixels) = camera.project(&point, None, Some(&mut jacobian)) else {
                    return point;
                };
                let residual = [pixels.x - measurement.u_l(), pixels.z - measurement.v()];
                for (row, r) in [0, 2].into_iter().zip(residual) {
                    let j = jacobian.row(row).transpose();
                    hessian += j * j.transpose();
                    gradient += j * r;
                }
            }

            let Some(step) = hessian.cholesky().map(|c| c.solve(&(-gradient))) else {
                break;
            };
            point += step;
            if step.norm() < REFINEMENT_STEP_TOLERANCE {
                break;
            }
        }

        point
    }
}

impl Triangulator for DltTriangulator {
    fn triangulate(
        &self,
        cameras: &[StereoCamera],
        measurements: &[StereoMeasurement],
    ) -> TriangulationResult {
        if cameras.len() < 2 || cameras.len() != measurements.len() {
            return TriangulationResult::Degenerate;
        }

        let Some(mut point) = self.dlt(cameras, measurements) else {
            return TriangulationResult::Degenerate;
        };
        if self.params.enable_refinement {
            point = Self::refine(cameras, measurements, point);
        }

        let mut max_reprojection_error: f64 = 0.0;
        for (camera, measurement) in cameras.iter().zip(measurements) {
            if self.params.landmark_distance_threshold > 0.0
                && (camera.pose().translation() - point).norm()
                    > self.params.landmark_distance_threshold
            {
                return TriangulationResult::FarPoint;
            }

            let Some((u_l, v)) = camera.project_left(&point) else {
                return TriangulationResult::BehindCamera;
            };
            let error = ((u_l - measurement.u_l()).powi(2) + (v - measurement.v()).powi(2)).sqrt();
            max_reprojection_error = max_reprojection_error.max(error);
        }

        if self.params.dynamic_outlier_rejection_threshold > 0.0
            && max_reprojection_error > self.params.dynamic_outlier_rejection_threshold
        {
            trace!(
                "Max reprojection error {:.3} above threshold",
                max_reprojection_error
            );
            return TriangulationResult::Outlier;
        }

        TriangulationResult::Valid(point)
    }
}

//! Normal estimation and orientation for point clouds.
//!
//! Normals come from PCA over a hybrid neighbourhood: the nearest
//! `max_neighbors` points, kept only if they lie within `radius`. They are
//! then flipped to face a viewpoint, which for a back-projected cloud is the
//! camera at the origin.
//!
//! # Example
//!
//! ```
//! use mesh_scan::pointcloud::PointCloud;
//! use mesh_scan::pointcloud::normals::NormalEstimationParams;
//! use nalgebra::Point3;
//!
//! // Planar patch at z = 2 seen from the origin
//! let positions: Vec<_> = (0..20)
//!     .flat_map(|i| (0..20).map(move |j| Point3::new(i as f64 * 0.01, j as f64 * 0.01, 2.0)))
//!     .collect();
//! let mut cloud = PointCloud::from_positions(&positions);
//!
//! cloud.estimate_normals_hybrid(&NormalEstimationParams::default()).unwrap();
//! cloud.orient_normals_towards(&Point3::origin()).unwrap();
//!
//! assert!(cloud.has_normals());
//! assert!(cloud.points[0].normal.unwrap().z < 0.0);
//! ```

use kiddo::SquaredEuclidean;
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;
use tracing::debug;

use super::{CloudPoint, PointCloud, PointTree, build_kdtree};
use crate::error::{ScanError, ScanResult};

/// Parameters for normal estimation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NormalEstimationParams {
    /// Search radius for neighbours. Default: 0.05.
    pub radius: f64,

    /// Maximum number of neighbours, the query point included. Default: 30.
    pub max_neighbors: usize,
}

impl Default for NormalEstimationParams {
    fn default() -> Self {
        Self {
            radius: 0.05,
            max_neighbors: 30,
        }
    }
}

impl NormalEstimationParams {
    /// Sets the search radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Sets the neighbour cap.
    #[must_use]
    pub const fn with_max_neighbors(mut self, max_neighbors: usize) -> Self {
        self.max_neighbors = max_neighbors;
        self
    }

    fn validate(&self) -> ScanResult<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ScanError::InvalidParameter {
                reason: format!("normal radius must be positive, got {}", self.radius),
            });
        }
        if self.max_neighbors == 0 {
            return Err(ScanError::InvalidParameter {
                reason: "max_neighbors must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl PointCloud {
    /// Estimates a normal for every point with a hybrid radius/k-nearest search.
    ///
    /// Each normal is the eigenvector of the smallest eigenvalue of the
    /// neighbourhood covariance. Points with fewer than three neighbours get
    /// `+Z`. Existing normals are overwritten. The sign of each normal is
    /// arbitrary until [`orient_normals_towards`](Self::orient_normals_towards)
    /// runs.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidParameter`] for a non-positive radius or a
    /// zero neighbour cap.
    pub fn estimate_normals_hybrid(&mut self, params: &NormalEstimationParams) -> ScanResult<()> {
        params.validate()?;
        if self.points.is_empty() {
            return Ok(());
        }

        let kdtree = build_kdtree(&self.points);
        let radius_sq = params.radius * params.radius;

        let normals: Vec<Option<Vector3<f64>>> = self
            .points
            .par_iter()
            .map(|point| {
                estimate_point_normal(
                    &point.position,
                    &kdtree,
                    &self.points,
                    params.max_neighbors,
                    radius_sq,
                )
            })
            .collect();

        let fallbacks = normals.iter().filter(|n| n.is_none()).count();
        for (point, normal) in self.points.iter_mut().zip(normals) {
            point.normal = Some(normal.unwrap_or_else(Vector3::z));
        }

        debug!(
            points = self.points.len(),
            radius = params.radius,
            max_neighbors = params.max_neighbors,
            fallbacks,
            "Estimated normals"
        );
        Ok(())
    }

    /// Flips every normal so it points towards `viewpoint`.
    ///
    /// Normals already facing the viewpoint, and normals orthogonal to the
    /// line of sight, are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::MissingNormals`] if any point lacks a normal.
    pub fn orient_normals_towards(&mut self, viewpoint: &Point3<f64>) -> ScanResult<()> {
        let missing = self.missing_normals();
        if missing > 0 {
            return Err(ScanError::MissingNormals {
                missing,
                total: self.points.len(),
            });
        }

        let mut flipped = 0usize;
        for point in &mut self.points {
            if let Some(normal) = &mut point.normal {
                let to_view = viewpoint - point.position;
                if normal.dot(&to_view) < 0.0 {
                    *normal = -*normal;
                    flipped += 1;
                }
            }
        }

        debug!(flipped, "Oriented normals towards viewpoint");
        Ok(())
    }
}

/// Estimates the normal for a single point using PCA.
///
/// Returns `None` when the neighbourhood is too small to define a plane.
fn estimate_point_normal(
    point: &Point3<f64>,
    kdtree: &PointTree,
    points: &[CloudPoint],
    max_neighbors: usize,
    radius_sq: f64,
) -> Option<Vector3<f64>> {
    let query = [point.x, point.y, point.z];
    let neighbor_positions: Vec<Point3<f64>> = kdtree
        .nearest_n::<SquaredEuclidean>(&query, max_neighbors)
        .into_iter()
        .filter(|n| n.distance <= radius_sq)
        .map(|n| points[n.item as usize].position)
        .collect();

    if neighbor_positions.len() < 3 {
        return None;
    }

    let centroid: Vector3<f64> = neighbor_positions.iter().map(|p| p.coords).sum();
    #[allow(clippy::cast_precision_loss)]
    let centroid = centroid / neighbor_positions.len() as f64;

    let mut cov = Matrix3::zeros();
    for p in &neighbor_positions {
        let diff = p.coords - centroid;
        cov += diff * diff.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let eigenvalues = eigen.eigenvalues;

    let min_idx = if eigenvalues[0] <= eigenvalues[1] && eigenvalues[0] <= eigenvalues[2] {
        0
    } else if eigenvalues[1] <= eigenvalues[2] {
        1
    } else {
        2
    };

    let normal: Vector3<f64> = eigen.eigenvectors.column(min_idx).into_owned();
    normal.try_normalize(1e-10)
}

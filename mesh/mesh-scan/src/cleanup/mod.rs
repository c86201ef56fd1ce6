//! Point-cloud cleanup before surface reconstruction.
//!
//! This module provides the steps that turn a raw back-projected cloud into
//! oriented samples for Poisson reconstruction:
//! - **Voxel downsampling** - One centroid per occupied voxel
//! - **Outlier removal** - Remove statistically distant points
//! - **Normal estimation** - Hybrid radius/k-nearest PCA, oriented to the camera
//!
//! # Quick Start
//!
//! ```
//! use mesh_scan::cleanup::{clean_point_cloud, CloudCleanupParams};
//! use mesh_scan::pointcloud::PointCloud;
//! use nalgebra::Point3;
//!
//! let positions: Vec<_> = (0..30)
//!     .flat_map(|i| (0..30).map(move |j| Point3::new(i as f64 * 0.01, j as f64 * 0.01, 1.0)))
//!     .collect();
//! let cloud = PointCloud::from_positions(&positions);
//!
//! let result = clean_point_cloud(&cloud, &CloudCleanupParams::default()).unwrap();
//! assert!(result.cloud.has_normals());
//! println!("{}", result);
//! ```
//!
//! # Workflow
//!
//! The cleanup runs these steps in order:
//! 1. Voxel downsample
//! 2. Remove statistical outliers
//! 3. Estimate normals
//! 4. Orient normals towards the viewpoint

pub mod outlier;

pub use outlier::{OutlierParams, OutlierRemovalResult, remove_outliers, remove_outliers_with_result};

use nalgebra::Point3;
use tracing::info;

use crate::error::ScanResult;
use crate::pointcloud::PointCloud;
use crate::pointcloud::normals::NormalEstimationParams;

/// Parameters for the complete point-cloud cleanup.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CloudCleanupParams {
    /// Voxel edge length for downsampling. Default: 0.01.
    pub voxel_size: f64,

    /// Parameters for outlier removal.
    pub outliers: OutlierParams,

    /// Parameters for normal estimation.
    pub normals: NormalEstimationParams,

    /// Point the normals are turned towards. Default: the origin, where the
    /// camera of a back-projected cloud sits.
    pub viewpoint: [f64; 3],
}

impl Default for CloudCleanupParams {
    fn default() -> Self {
        Self {
            voxel_size: 0.01,
            outliers: OutlierParams::default(),
            normals: NormalEstimationParams::default(),
            viewpoint: [0.0; 3],
        }
    }
}

impl CloudCleanupParams {
    /// Creates new parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the voxel size.
    #[must_use]
    pub const fn with_voxel_size(mut self, voxel_size: f64) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Sets the outlier removal parameters.
    #[must_use]
    pub const fn with_outlier_params(mut self, params: OutlierParams) -> Self {
        self.outliers = params;
        self
    }

    /// Sets the normal estimation parameters.
    #[must_use]
    pub const fn with_normal_params(mut self, params: NormalEstimationParams) -> Self {
        self.normals = params;
        self
    }
}

/// Result of the point-cloud cleanup.
#[derive(Debug, Clone)]
pub struct CloudCleanupResult {
    /// The cleaned cloud. Every point has a normal.
    pub cloud: PointCloud,

    /// Points before cleanup.
    pub original_count: usize,

    /// Points left after voxel downsampling.
    pub downsampled_count: usize,

    /// Points removed as outliers.
    pub outliers_removed: usize,
}

impl std::fmt::Display for CloudCleanupResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cloud cleanup: {} -> {} points (downsampled to {}, {} outliers)",
            self.original_count,
            self.cloud.len(),
            self.downsampled_count,
            self.outliers_removed
        )
    }
}

/// Runs the full cleanup on a point cloud.
///
/// The output never has more points than the input, and every output point
/// carries a unit normal facing the viewpoint. An empty cloud gives an empty
/// result.
///
/// # Errors
///
/// Returns an error if the normal estimation parameters are invalid.
pub fn clean_point_cloud(
    cloud: &PointCloud,
    params: &CloudCleanupParams,
) -> ScanResult<CloudCleanupResult> {
    let original_count = cloud.len();

    let downsampled = cloud.voxel_downsample(params.voxel_size);
    let downsampled_count = downsampled.len();

    let filtered = remove_outliers_with_result(&downsampled, &params.outliers);
    let outliers_removed = filtered.outliers_removed;

    let mut cleaned = filtered.cloud;
    cleaned.estimate_normals_hybrid(&params.normals)?;
    let [vx, vy, vz] = params.viewpoint;
    cleaned.orient_normals_towards(&Point3::new(vx, vy, vz))?;

    info!(
        original = original_count,
        downsampled = downsampled_count,
        outliers = outliers_removed,
        remaining = cleaned.len(),
        "Cleaned point cloud"
    );

    Ok(CloudCleanupResult {
        cloud: cleaned,
        original_count,
        downsampled_count,
        outliers_removed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn dense_patch() -> PointCloud {
        (0..60)
            .flat_map(|i| {
                (0..60).map(move |j| {
                    let (x, y) = (f64::from(i) * 0.004, f64::from(j) * 0.004);
                    Point3::new(x, y, 1.0 + 0.1 * (x * 10.0).sin())
                })
            })
            .collect()
    }

    #[test]
    fn test_default_params() {
        let params = CloudCleanupParams::default();
        assert!((params.voxel_size - 0.01).abs() < f64::EPSILON);
        assert_eq!(params.outliers.k_neighbors, 20);
        assert_eq!(params.normals.max_neighbors, 30);
        assert_eq!(params.viewpoint, [0.0; 3]);
    }

    #[test]
    fn test_cleanup_never_grows_and_sets_normals() {
        let cloud = dense_patch();
        let result = clean_point_cloud(&cloud, &CloudCleanupParams::default()).unwrap();

        assert!(result.cloud.len() <= result.downsampled_count);
        assert!(result.downsampled_count < cloud.len());
        assert!(result.cloud.has_normals());
        for p in &result.cloud.points {
            let n = p.normal.unwrap();
            assert!((n.norm() - 1.0).abs() < 1e-9);
            assert!(n.dot(&(Point3::origin() - p.position)) >= 0.0);
        }
    }

    #[test]
    fn test_custom_stage_params() {
        let params = CloudCleanupParams::new()
            .with_voxel_size(0.008)
            .with_outlier_params(OutlierParams::new().with_k_neighbors(8))
            .with_normal_params(NormalEstimationParams::default().with_max_neighbors(12));
        assert_eq!(params.outliers.k_neighbors, 8);
        assert_eq!(params.normals.max_neighbors, 12);

        let result = clean_point_cloud(&dense_patch(), &params).unwrap();
        assert!(result.cloud.has_normals());
        assert!(result.cloud.len() <= result.downsampled_count);
    }

    #[test]
    fn test_cleanup_is_deterministic() {
        let cloud = dense_patch();
        let params = CloudCleanupParams::default();
        let a = clean_point_cloud(&cloud, &params).unwrap();
        let b = clean_point_cloud(&cloud, &params).unwrap();
        assert_eq!(a.cloud, b.cloud);
    }

    #[test]
    fn test_cleanup_empty_cloud() {
        let result = clean_point_cloud(&PointCloud::new(), &CloudCleanupParams::default()).unwrap();
        assert!(result.cloud.is_empty());
        assert_eq!(result.original_count, 0);
    }

    #[test]
    fn test_display() {
        let result = clean_point_cloud(&dense_patch(), &CloudCleanupParams::default()).unwrap();
        assert!(format!("{result}").starts_with("Cloud cleanup: 3600 -> "));
    }
}

//! Statistical outlier removal for point clouds.
//!
//! Points that sit statistically far from their neighbours are usually
//! depth noise, most often flying pixels along silhouette edges.
//!
//! # Algorithm
//!
//! For each point:
//! 1. Find the k nearest neighbors, excluding the point itself
//! 2. Compute the mean distance to those neighbors
//! 3. Compute the global mean and standard deviation of mean distances
//! 4. Remove points where mean distance > `global_mean + std_multiplier * std_dev`
//!
//! # Example
//!
//! ```
//! use mesh_scan::cleanup::outlier::{remove_outliers, OutlierParams};
//! use mesh_scan::pointcloud::PointCloud;
//! use nalgebra::Point3;
//!
//! let mut positions: Vec<_> = (0..100)
//!     .map(|i| Point3::new(i as f64 * 0.1, 0.0, 1.0))
//!     .collect();
//!
//! // Add an outlier
//! positions.push(Point3::new(5.0, 100.0, 1.0));
//!
//! let cloud = PointCloud::from_positions(&positions);
//! let filtered = remove_outliers(&cloud, &OutlierParams::default());
//!
//! assert_eq!(filtered.len(), cloud.len() - 1);
//! ```

use kiddo::SquaredEuclidean;
use rayon::prelude::*;

use crate::pointcloud::{CloudPoint, PointCloud, build_kdtree};

/// Parameters for statistical outlier removal.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OutlierParams {
    /// Number of neighbors to consider. Default: 20.
    pub k_neighbors: usize,

    /// Standard deviation multiplier for outlier threshold. Default: 2.0.
    /// Points with mean distance > mean + `std_multiplier` * std are removed.
    pub std_multiplier: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            k_neighbors: 20,
            std_multiplier: 2.0,
        }
    }
}

impl OutlierParams {
    /// Creates new parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of neighbors to consider.
    #[must_use]
    pub const fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    /// Sets the standard deviation multiplier.
    #[must_use]
    pub const fn with_std_multiplier(mut self, multiplier: f64) -> Self {
        self.std_multiplier = multiplier;
        self
    }
}

/// Result of outlier removal operation.
#[derive(Debug, Clone)]
pub struct OutlierRemovalResult {
    /// The filtered point cloud with outliers removed.
    pub cloud: PointCloud,

    /// Number of points in the original cloud.
    pub original_count: usize,

    /// Number of outliers removed.
    pub outliers_removed: usize,

    /// Mean distance threshold used. Zero when the cloud was too small to filter.
    pub distance_threshold: f64,
}

impl OutlierRemovalResult {
    /// Returns the percentage of points that were outliers.
    #[must_use]
    pub fn outlier_percentage(&self) -> f64 {
        if self.original_count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            100.0 * self.outliers_removed as f64 / self.original_count as f64
        }
    }
}

impl std::fmt::Display for OutlierRemovalResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Outlier removal: {} -> {} points ({} removed, {:.1}%)",
            self.original_count,
            self.cloud.len(),
            self.outliers_removed,
            self.outlier_percentage()
        )
    }
}

/// Removes statistical outliers from a point cloud.
///
/// Clouds with `k_neighbors` points or fewer are returned unchanged. Kept
/// points stay in their original order.
#[must_use]
pub fn remove_outliers(cloud: &PointCloud, params: &OutlierParams) -> PointCloud {
    remove_outliers_with_result(cloud, params).cloud
}

/// Removes statistical outliers and returns detailed results.
///
/// # Example
///
/// ```
/// use mesh_scan::cleanup::outlier::{remove_outliers_with_result, OutlierParams};
/// use mesh_scan::pointcloud::PointCloud;
/// use nalgebra::Point3;
///
/// let positions: Vec<_> = (0..100)
///     .map(|i| Point3::new(i as f64 * 0.1, 0.0, 1.0))
///     .collect();
/// let cloud = PointCloud::from_positions(&positions);
///
/// let result = remove_outliers_with_result(&cloud, &OutlierParams::default());
/// println!("{}", result);
/// ```
#[must_use]
pub fn remove_outliers_with_result(
    cloud: &PointCloud,
    params: &OutlierParams,
) -> OutlierRemovalResult {
    let original_count = cloud.points.len();

    if params.k_neighbors == 0 || original_count <= params.k_neighbors {
        return OutlierRemovalResult {
            cloud: cloud.clone(),
            original_count,
            outliers_removed: 0,
            distance_threshold: 0.0,
        };
    }

    let (keep_mask, threshold) = compute_outlier_mask(cloud, params);

    let points: Vec<CloudPoint> = cloud
        .points
        .iter()
        .zip(keep_mask.iter())
        .filter_map(|(p, &keep)| keep.then_some(*p))
        .collect();

    let outliers_removed = original_count - points.len();

    OutlierRemovalResult {
        cloud: PointCloud { points },
        original_count,
        outliers_removed,
        distance_threshold: threshold,
    }
}

/// Computes a mask indicating which points to keep.
fn compute_outlier_mask(cloud: &PointCloud, params: &OutlierParams) -> (Vec<bool>, f64) {
    let kdtree = build_kdtree(&cloud.points);

    let mean_distances: Vec<f64> = cloud
        .points
        .par_iter()
        .map(|point| {
            let query = [point.position.x, point.position.y, point.position.z];
            let neighbors = kdtree.nearest_n::<SquaredEuclidean>(&query, params.k_neighbors + 1);

            // Skip the first neighbor (self) and compute mean distance
            let sum: f64 = neighbors.iter().skip(1).map(|n| n.distance.sqrt()).sum();

            #[allow(clippy::cast_precision_loss)]
            let mean = if neighbors.len() > 1 {
                sum / (neighbors.len() - 1) as f64
            } else {
                0.0
            };

            mean
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let count = mean_distances.len() as f64;
    let global_mean = mean_distances.iter().sum::<f64>() / count;
    let variance = mean_distances
        .iter()
        .map(|d| (d - global_mean).powi(2))
        .sum::<f64>()
        / count;

    let std_dev = variance.sqrt();
    let threshold = params.std_multiplier.mul_add(std_dev, global_mean);

    let keep_mask: Vec<bool> = mean_distances.iter().map(|&d| d <= threshold).collect();

    (keep_mask, threshold)
}

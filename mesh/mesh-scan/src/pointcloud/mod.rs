//! Point cloud data structures and operations.
//!
//! This module provides the [`PointCloud`] type for camera-space points
//! produced by back-projecting a depth map.
//!
//! # Example
//!
//! ```
//! use mesh_scan::pointcloud::{PointCloud, CloudPoint};
//! use nalgebra::Point3;
//!
//! // Create a point cloud from positions
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(1.0, 0.0, 1.0),
//!     Point3::new(0.0, 1.0, 1.0),
//! ];
//! let cloud = PointCloud::from_positions(&positions);
//!
//! assert_eq!(cloud.len(), 3);
//! assert!(!cloud.is_empty());
//! ```

pub mod normals;

use hashbrown::HashMap;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use mesh_types::{Aabb, Vertex};
use nalgebra::{Point3, Vector3};

/// KD-tree over point indices.
///
/// The immutable tree tolerates any number of points sharing a coordinate
/// on one axis, which flat regions of a depth map produce in bulk.
pub(crate) type PointTree = ImmutableKdTree<f64, u64, 3, 32>;

/// Builds a KD-tree whose items are indices into `points`.
pub(crate) fn build_kdtree(points: &[CloudPoint]) -> PointTree {
    let coords: Vec<[f64; 3]> = points
        .iter()
        .map(|p| [p.position.x, p.position.y, p.position.z])
        .collect();
    ImmutableKdTree::new_from_slice(&coords)
}

/// A point in a point cloud with an optional normal.
///
/// # Example
///
/// ```
/// use mesh_scan::pointcloud::CloudPoint;
/// use nalgebra::{Point3, Vector3};
///
/// // Simple point with just position
/// let p1 = CloudPoint::new(Point3::new(1.0, 2.0, 3.0));
///
/// // Point with position and normal
/// let p2 = CloudPoint::with_normal(
///     Point3::new(1.0, 2.0, 3.0),
///     Vector3::new(0.0, 0.0, 1.0),
/// );
///
/// assert!(p1.normal.is_none());
/// assert!(p2.normal.is_some());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudPoint {
    /// The 3D position of the point.
    pub position: Point3<f64>,

    /// Optional unit normal vector at this point.
    pub normal: Option<Vector3<f64>>,
}

impl CloudPoint {
    /// Creates a new point with just a position.
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Creates a point from x, y, z coordinates.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_scan::pointcloud::CloudPoint;
    ///
    /// let point = CloudPoint::from_coords(1.0, 2.0, 3.0);
    /// assert_eq!(point.position.y, 2.0);
    /// ```
    #[must_use]
    pub const fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Creates a point with position and normal.
    #[must_use]
    pub const fn with_normal(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            position,
            normal: Some(normal),
        }
    }

    /// Converts this cloud point to a mesh vertex.
    #[must_use]
    pub const fn to_vertex(&self) -> Vertex {
        let mut vertex = Vertex::new(self.position);
        vertex.attributes.normal = self.normal;
        vertex
    }

    /// Returns true if this point has a normal.
    #[must_use]
    pub const fn has_normal(&self) -> bool {
        self.normal.is_some()
    }
}

impl Default for CloudPoint {
    fn default() -> Self {
        Self::new(Point3::origin())
    }
}

/// A collection of 3D points with optional normals.
///
/// Back-projection produces one of these per image. Cleanup stages take a
/// cloud by reference and return a new one that is never larger.
///
/// # Example
///
/// ```
/// use mesh_scan::pointcloud::PointCloud;
///
/// let mut cloud = PointCloud::new();
/// cloud.push_coords(0.0, 0.0, 1.0);
/// cloud.push_coords(1.0, 0.0, 1.0);
/// cloud.push_coords(0.0, 1.0, 1.0);
///
/// assert_eq!(cloud.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// The points in this cloud.
    pub points: Vec<CloudPoint>,
}

impl PointCloud {
    /// Creates an empty point cloud.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Creates a point cloud with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Creates a point cloud from a slice of 3D positions.
    #[must_use]
    pub fn from_positions(positions: &[Point3<f64>]) -> Self {
        let points = positions.iter().map(|p| CloudPoint::new(*p)).collect();
        Self { points }
    }

    /// Returns the number of points in the cloud.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the cloud has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns true if all points have normals.
    #[must_use]
    pub fn has_normals(&self) -> bool {
        !self.points.is_empty() && self.points.iter().all(CloudPoint::has_normal)
    }

    /// Number of points without a normal.
    #[must_use]
    pub fn missing_normals(&self) -> usize {
        self.points.iter().filter(|p| !p.has_normal()).count()
    }

    /// Adds a point to the cloud.
    pub fn push(&mut self, point: CloudPoint) {
        self.points.push(point);
    }

    /// Adds a point with the given coordinates.
    pub fn push_coords(&mut self, x: f64, y: f64, z: f64) {
        self.points.push(CloudPoint::from_coords(x, y, z));
    }

    /// Adds a point with position and normal.
    pub fn add_point_with_normal(&mut self, position: Point3<f64>, normal: Vector3<f64>) {
        self.points.push(CloudPoint::with_normal(position, normal));
    }

    /// Positions of all points, in order.
    #[must_use]
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Returns the axis-aligned bounding box of the point cloud.
    ///
    /// Returns `None` if the cloud is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_scan::pointcloud::PointCloud;
    /// use nalgebra::Point3;
    ///
    /// let positions = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(2.0, 3.0, 1.0),
    /// ];
    /// let cloud = PointCloud::from_positions(&positions);
    /// let bounds = cloud.bounds().unwrap();
    ///
    /// assert_eq!(bounds.min.x, 0.0);
    /// assert_eq!(bounds.max.x, 2.0);
    /// ```
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        if self.points.is_empty() {
            return None;
        }
        Some(Aabb::from_points(self.points.iter().map(|p| &p.position)))
    }

    /// Returns the centroid of the point cloud.
    ///
    /// Returns `None` if the cloud is empty.
    #[must_use]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }

        let sum: Vector3<f64> = self.points.iter().map(|p| p.position.coords).sum();

        #[allow(clippy::cast_precision_loss)]
        let centroid = sum / self.points.len() as f64;

        Some(Point3::from(centroid))
    }

    /// Downsamples the point cloud on a regular voxel grid.
    ///
    /// Points are grouped by `floor(p / voxel_size)` and each occupied voxel
    /// is replaced by the centroid of its points. Normals present in a voxel
    /// are averaged and renormalised. The output is ordered by voxel key, so
    /// the same input always gives the same cloud.
    ///
    /// A non-positive or non-finite voxel size returns the cloud unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_scan::pointcloud::PointCloud;
    /// use nalgebra::Point3;
    ///
    /// let positions: Vec<_> = (0..100)
    ///     .map(|i| Point3::new(i as f64 * 0.01, 0.0, 1.0))
    ///     .collect();
    /// let cloud = PointCloud::from_positions(&positions);
    ///
    /// let downsampled = cloud.voxel_downsample(0.1);
    /// assert!(downsampled.len() < cloud.len());
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn voxel_downsample(&self, voxel_size: f64) -> Self {
        if self.points.is_empty() || !(voxel_size.is_finite() && voxel_size > 0.0) {
            return self.clone();
        }

        struct Accum {
            position: Vector3<f64>,
            count: usize,
            normal: Vector3<f64>,
            normals: usize,
        }

        let mut voxels: HashMap<[i64; 3], Accum> = HashMap::new();
        for point in &self.points {
            let key = [
                (point.position.x / voxel_size).floor() as i64,
                (point.position.y / voxel_size).floor() as i64,
                (point.position.z / voxel_size).floor() as i64,
            ];
            let entry = voxels.entry(key).or_insert(Accum {
                position: Vector3::zeros(),
                count: 0,
                normal: Vector3::zeros(),
                normals: 0,
            });
            entry.position += point.position.coords;
            entry.count += 1;
            if let Some(n) = point.normal {
                entry.normal += n;
                entry.normals += 1;
            }
        }

        let mut cells: Vec<([i64; 3], Accum)> = voxels.into_iter().collect();
        cells.sort_unstable_by_key(|(key, _)| *key);

        let points = cells
            .into_iter()
            .map(|(_, acc)| {
                #[allow(clippy::cast_precision_loss)]
                let centroid = acc.position / acc.count as f64;
                let normal = if acc.normals > 0 {
                    acc.normal.try_normalize(1e-12)
                } else {
                    None
                };
                CloudPoint {
                    position: Point3::from(centroid),
                    normal,
                }
            })
            .collect();

        Self { points }
    }
}

impl FromIterator<CloudPoint> for PointCloud {
    fn from_iter<I: IntoIterator<Item = CloudPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<Point3<f64>> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().map(CloudPoint::new).collect(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kiddo::SquaredEuclidean;

    #[test]
    fn test_cloud_point_new() {
        let point = CloudPoint::new(Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(point.position.x, 1.0);
        assert_relative_eq!(point.position.y, 2.0);
        assert_relative_eq!(point.position.z, 3.0);
        assert!(point.normal.is_none());
    }

    #[test]
    fn test_cloud_point_to_vertex() {
        let point = CloudPoint::with_normal(Point3::new(1.0, 2.0, 3.0), Vector3::z());
        let vertex = point.to_vertex();
        assert_relative_eq!(vertex.position.x, 1.0);
        assert_eq!(vertex.attributes.normal, Some(Vector3::z()));
        assert!(vertex.attributes.uv.is_none());
    }

    #[test]
    fn test_point_cloud_bounds() {
        let positions = vec![Point3::new(0.0, 1.0, 2.0), Point3::new(3.0, 4.0, 5.0)];
        let cloud = PointCloud::from_positions(&positions);
        let bounds = cloud.bounds().unwrap();

        assert_relative_eq!(bounds.min.x, 0.0);
        assert_relative_eq!(bounds.min.y, 1.0);
        assert_relative_eq!(bounds.min.z, 2.0);
        assert_relative_eq!(bounds.max.x, 3.0);
        assert_relative_eq!(bounds.max.y, 4.0);
        assert_relative_eq!(bounds.max.z, 5.0);
    }

    #[test]
    fn test_point_cloud_bounds_empty() {
        assert!(PointCloud::new().bounds().is_none());
        assert!(PointCloud::new().centroid().is_none());
    }

    #[test]
    fn test_point_cloud_centroid() {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)];
        let cloud = PointCloud::from_positions(&positions);
        let centroid = cloud.centroid().unwrap();

        assert_relative_eq!(centroid.x, 1.0);
        assert_relative_eq!(centroid.y, 2.0);
        assert_relative_eq!(centroid.z, 3.0);
    }

    #[test]
    fn test_voxel_downsample_centroids() {
        let cloud = PointCloud::from_positions(&[
            Point3::new(0.01, 0.01, 0.01),
            Point3::new(0.03, 0.05, 0.07),
            Point3::new(0.25, 0.0, 0.0),
        ]);
        let down = cloud.voxel_downsample(0.1);

        assert_eq!(down.len(), 2);
        assert_relative_eq!(down.points[0].position.x, 0.02, epsilon = 1e-12);
        assert_relative_eq!(down.points[0].position.y, 0.03, epsilon = 1e-12);
        assert_relative_eq!(down.points[0].position.z, 0.04, epsilon = 1e-12);
        assert_relative_eq!(down.points[1].position.x, 0.25);
    }

    #[test]
    fn test_voxel_downsample_sorted_by_key() {
        let cloud = PointCloud::from_positions(&[
            Point3::new(0.95, 0.0, 0.0),
            Point3::new(-0.5, 0.0, 0.0),
            Point3::new(0.15, 0.0, 0.0),
        ]);
        let down = cloud.voxel_downsample(0.1);
        let xs: Vec<f64> = down.points.iter().map(|p| p.position.x).collect();
        assert_eq!(xs, vec![-0.5, 0.15, 0.95]);
    }

    #[test]
    fn test_voxel_downsample_averages_normals() {
        let mut cloud = PointCloud::new();
        cloud.add_point_with_normal(Point3::new(0.01, 0.0, 0.0), Vector3::x());
        cloud.add_point_with_normal(Point3::new(0.02, 0.0, 0.0), Vector3::y());
        let down = cloud.voxel_downsample(0.1);

        let n = down.points[0].normal.unwrap();
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(n.x, n.y, epsilon = 1e-12);
    }

    #[test]
    fn test_voxel_downsample_never_grows() {
        let positions: Vec<_> = (0..500)
            .map(|i| {
                let t = f64::from(i) * 0.013;
                Point3::new(t.sin(), t.cos(), 1.0 + 0.1 * t)
            })
            .collect();
        let cloud = PointCloud::from_positions(&positions);
        for voxel in [0.001, 0.01, 0.1, 1.0] {
            assert!(cloud.voxel_downsample(voxel).len() <= cloud.len());
        }
    }

    #[test]
    fn test_voxel_downsample_invalid_size() {
        let cloud = PointCloud::from_positions(&[Point3::origin(), Point3::new(0.001, 0.0, 0.0)]);
        assert_eq!(cloud.voxel_downsample(-1.0), cloud);
        assert_eq!(cloud.voxel_downsample(0.0), cloud);
        assert_eq!(cloud.voxel_downsample(f64::NAN), cloud);
        assert!(PointCloud::new().voxel_downsample(0.1).is_empty());
    }

    #[test]
    fn test_kdtree_handles_flat_axis() {
        // 40x40 grid on a plane of constant z: many points share each axis value
        let positions: Vec<_> = (0..40)
            .flat_map(|i| (0..40).map(move |j| Point3::new(f64::from(i), f64::from(j), 2.0)))
            .collect();
        let cloud = PointCloud::from_positions(&positions);
        let tree = build_kdtree(&cloud.points);

        let nearest = tree.nearest_n::<SquaredEuclidean>(&[10.0, 10.0, 2.0], 5);
        assert_eq!(nearest.len(), 5);
        assert_eq!(nearest[0].item as usize, 10 * 40 + 10);
        assert_relative_eq!(nearest[0].distance, 0.0);
    }

    #[test]
    fn test_point_cloud_from_iterator() {
        let cloud: PointCloud = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)]
            .into_iter()
            .collect();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.missing_normals(), 2);
        assert!(!cloud.has_normals());
    }
}

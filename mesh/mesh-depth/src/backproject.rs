//! Depth map to camera-space point cloud.

use mesh_scan::{CloudPoint, PointCloud};
use rayon::prelude::*;
use tracing::debug;

use crate::depth::DepthMap;
use crate::intrinsics::Intrinsics;

/// Parameters for [`backproject`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackprojectParams {
    /// Multiplier from normalised depth to camera-space `z`.
    pub depth_scale: f64,
    /// Pixels with `z` at or below this are dropped.
    pub min_depth: f64,
}

impl Default for BackprojectParams {
    fn default() -> Self {
        Self {
            depth_scale: 3.0,
            min_depth: 1e-3,
        }
    }
}

impl BackprojectParams {
    /// Set the depth scale.
    #[must_use]
    pub const fn with_depth_scale(mut self, scale: f64) -> Self {
        self.depth_scale = scale;
        self
    }

    /// Set the minimum kept depth.
    #[must_use]
    pub const fn with_min_depth(mut self, min_depth: f64) -> Self {
        self.min_depth = min_depth;
        self
    }
}

/// Lift every pixel with positive depth into camera space.
///
/// Points come out in row-major pixel order and carry no normal. An
/// all-zero map yields an empty cloud.
///
/// # Example
///
/// ```
/// use mesh_depth::{BackprojectParams, DepthMap, Intrinsics, backproject};
///
/// let depth = DepthMap::new(2, 2, vec![0.0, 0.5, 0.5, 1.0]).unwrap();
/// let k = Intrinsics::infer(2, 2, None);
/// let cloud = backproject(&depth, &k, &BackprojectParams::default());
/// assert_eq!(cloud.len(), 3);
/// assert_eq!(cloud.points[2].position.z, 3.0);
/// ```
#[must_use]
pub fn backproject(
    depth: &DepthMap,
    intrinsics: &Intrinsics,
    params: &BackprojectParams,
) -> PointCloud {
    let width = depth.width() as usize;

    let rows: Vec<Vec<CloudPoint>> = depth
        .values()
        .par_chunks(width)
        .enumerate()
        .map(|(v, row)| {
            #[allow(clippy::cast_precision_loss)]
            let v = v as f64;
            row.iter()
                .enumerate()
                .filter_map(|(u, &d)| {
                    let z = f64::from(d) * params.depth_scale;
                    #[allow(clippy::cast_precision_loss)]
                    let u = u as f64;
                    (z > params.min_depth).then(|| CloudPoint::new(intrinsics.unproject(u, v, z)))
                })
                .collect()
        })
        .collect();

    let mut cloud = PointCloud::with_capacity(rows.iter().map(Vec::len).sum());
    for point in rows.into_iter().flatten() {
        cloud.push(point);
    }

    debug!(
        pixels = depth.values().len(),
        points = cloud.len(),
        "Back-projected depth"
    );
    cloud
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn all_zero_is_empty() {
        let depth = DepthMap::new(16, 8, vec![0.0; 128]).unwrap();
        let cloud = backproject(&depth, &Intrinsics::infer(16, 8, None), &BackprojectParams::default());
        assert!(cloud.is_empty());
    }

    #[test]
    fn pinhole_formula() {
        let depth = DepthMap::from_fn(4, 4, |_, _| 0.5).unwrap();
        let k = Intrinsics::infer(4, 4, None);
        let cloud = backproject(&depth, &k, &BackprojectParams::default());
        assert_eq!(cloud.len(), 16);

        // Pixel (u=3, v=1) is point 1 * 4 + 3
        let p = cloud.points[7].position;
        assert_relative_eq!(p.z, 1.5);
        assert_relative_eq!(p.x, (3.0 - k.cx) * 1.5 / k.fx);
        assert_relative_eq!(p.y, (1.0 - k.cy) * 1.5 / k.fy);
        assert!(cloud.points.iter().all(|p| p.normal.is_none()));
    }

    #[test]
    fn row_major_order() {
        let depth = DepthMap::from_fn(3, 2, |x, y| (1 + x + 3 * y) as f32 / 6.0).unwrap();
        let cloud = backproject(&depth, &Intrinsics::infer(3, 2, None), &BackprojectParams::default());
        let zs: Vec<f64> = cloud.points.iter().map(|p| p.position.z).collect();
        for pair in zs.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn min_depth_threshold() {
        let depth = DepthMap::new(3, 1, vec![0.0, 0.0002, 0.5]).unwrap();
        let k = Intrinsics::infer(3, 1, None);
        let cloud = backproject(&depth, &k, &BackprojectParams::default());
        assert_eq!(cloud.len(), 1);

        let loose = BackprojectParams::default().with_min_depth(0.0);
        assert_eq!(backproject(&depth, &k, &loose).len(), 2);
    }

    #[test]
    fn depth_scale() {
        let depth = DepthMap::new(1, 1, vec![1.0]).unwrap();
        let params = BackprojectParams::default().with_depth_scale(10.0);
        let cloud = backproject(&depth, &Intrinsics::infer(1, 1, None), &params);
        assert_relative_eq!(cloud.points[0].position.z, 10.0);
    }
}

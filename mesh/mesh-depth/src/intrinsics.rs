//! Pinhole camera intrinsics inferred from the image size.
//!
//! A single photograph rarely carries usable calibration, so the principal
//! point is put at the image centre and the focal length defaults to
//! [`DEFAULT_FOCAL_FACTOR`] times the longer side. Every projection in the
//! workspace goes through [`Intrinsics::project`] and
//! [`Intrinsics::unproject`].

use mesh_types::Point3;
use nalgebra::Matrix3;

/// Focal length, in pixels, per pixel of the longer image side.
pub const DEFAULT_FOCAL_FACTOR: f64 = 1.2;

/// Added to depth before dividing, so points on the image plane stay finite.
pub const PROJECTION_EPSILON: f64 = 1e-6;

/// Pinhole intrinsics without distortion.
///
/// # Example
///
/// ```
/// use mesh_depth::Intrinsics;
///
/// let k = Intrinsics::infer(640, 480, None);
/// assert_eq!(k.cx, 320.0);
/// assert_eq!(k.cy, 240.0);
/// assert_eq!(k.fx, 768.0);
/// assert_eq!(k.fx, k.fy);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Intrinsics {
    /// Focal length in pixels (x direction).
    pub fx: f64,
    /// Focal length in pixels (y direction).
    pub fy: f64,
    /// Principal point x-coordinate in pixels.
    pub cx: f64,
    /// Principal point y-coordinate in pixels.
    pub cy: f64,
}

impl Intrinsics {
    /// Infer intrinsics for a `width x height` image.
    ///
    /// `focal_override` replaces the focal heuristic when given.
    #[must_use]
    pub fn infer(width: u32, height: u32, focal_override: Option<f64>) -> Self {
        let focal =
            focal_override.unwrap_or_else(|| DEFAULT_FOCAL_FACTOR * f64::from(width.max(height)));
        Self {
            fx: focal,
            fy: focal,
            cx: f64::from(width) / 2.0,
            cy: f64::from(height) / 2.0,
        }
    }

    /// The 3x3 camera matrix `K`.
    #[must_use]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Project a camera-space point to pixel coordinates `(u, v)`.
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> (f64, f64) {
        let z = point.z + PROJECTION_EPSILON;
        (
            self.fx * point.x / z + self.cx,
            self.fy * point.y / z + self.cy,
        )
    }

    /// Lift pixel `(u, v)` at depth `z` to a camera-space point.
    #[must_use]
    pub fn unproject(&self, u: f64, v: f64, z: f64) -> Point3<f64> {
        Point3::new((u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z)
    }

    /// Horizontal field of view in radians for an image `width` pixels wide.
    #[must_use]
    pub fn fov_x(&self, width: u32) -> f64 {
        2.0 * (f64::from(width) / (2.0 * self.fx)).atan()
    }
}

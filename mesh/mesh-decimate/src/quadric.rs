//! Quadric error metric.
//!
//! A quadric accumulates squared distances to a set of planes. For a plane
//! `n·p + d = 0` with unit normal `n` it stores
//!
//! ```text
//! A = n nᵀ,  b = d n,  c = d²
//! ```
//!
//! and the error of a point `p` is `pᵀ A p + 2 bᵀ p + c`. Quadrics add
//! component-wise, so the error of a merged vertex is the sum of both ends.

use std::ops::{Add, AddAssign};

use mesh_types::Point3;
use nalgebra::{Matrix3, Vector3};

/// Sum of squared plane distances in matrix form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    a: Matrix3<f64>,
    b: Vector3<f64>,
    c: f64,
}

impl Default for Quadric {
    fn default() -> Self {
        Self {
            a: Matrix3::zeros(),
            b: Vector3::zeros(),
            c: 0.0,
        }
    }
}

impl Quadric {
    /// Quadric of the plane through `point` with unit `normal`.
    #[must_use]
    pub fn from_plane(normal: &Vector3<f64>, point: &Point3<f64>) -> Self {
        let d = -normal.dot(&point.coords);
        Self {
            a: normal * normal.transpose(),
            b: normal * d,
            c: d * d,
        }
    }

    /// Quadric of a triangle's supporting plane, or `None` when the
    /// triangle has no well-defined normal.
    #[must_use]
    pub fn from_triangle(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<Self> {
        let normal = (p1 - p0).cross(&(p2 - p0)).try_normalize(1e-12)?;
        Some(Self::from_plane(&normal, p0))
    }

    /// Squared-distance error at `p`.
    #[must_use]
    pub fn evaluate(&self, p: &Point3<f64>) -> f64 {
        let v = p.coords;
        (v.dot(&(self.a * v)) + 2.0 * self.b.dot(&v) + self.c).max(0.0)
    }

    /// Point minimising the error, or `None` when the system is singular
    /// (flat or cylindrical neighbourhoods).
    #[must_use]
    pub fn optimal_point(&self) -> Option<Point3<f64>> {
        if self.a.determinant().abs() < 1e-10 {
            return None;
        }
        let inv = self.a.try_inverse()?;
        Some(Point3::from(-(inv * self.b)))
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, other: Self) {
        self.a += other.a;
        self.b += other.b;
        self.c += other.c;
    }
}

impl Add for Quadric {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

//! Vertex types and attributes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Texture coordinate `(u, v)`, both in `[0, 1]` for projected UVs.
pub type Uv = (f32, f32);

/// Optional attributes that can be attached to a vertex.
///
/// These attributes are filled in by later pipeline stages:
/// - `normal`: Computed from adjacent faces (area-weighted average)
/// - `uv`: Projected through the camera once the mesh topology is final
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexAttributes {
    /// Unit normal vector.
    pub normal: Option<Vector3<f64>>,

    /// Texture coordinates (U, V).
    pub uv: Option<Uv>,
}

impl VertexAttributes {
    /// Create empty attributes with no values set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            normal: None,
            uv: None,
        }
    }

    /// Check whether no attribute is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.normal.is_none() && self.uv.is_none()
    }
}

/// A vertex in 3D space with optional attributes.
///
/// # Example
///
/// ```
/// use mesh_types::{Vertex, Point3, Vector3};
///
/// let v = Vertex::with_normal(Point3::new(0.0, 0.0, 2.0), Vector3::z());
/// assert_eq!(v.normal(), Some(Vector3::z()));
/// assert!(v.uv().is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Position in camera space.
    pub position: Point3<f64>,

    /// Optional per-vertex attributes.
    pub attributes: VertexAttributes,
}

impl Vertex {
    /// Create a vertex at a position with no attributes.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            attributes: VertexAttributes::empty(),
        }
    }

    /// Create a vertex from raw coordinates.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::Vertex;
    ///
    /// let v = Vertex::from_coords(1.0, 2.0, 3.0);
    /// assert!((v.position.y - 2.0).abs() < 1e-12);
    /// ```
    #[inline]
    #[must_use]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Create a vertex with a normal.
    #[inline]
    #[must_use]
    pub const fn with_normal(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            position,
            attributes: VertexAttributes {
                normal: Some(normal),
                uv: None,
            },
        }
    }

    /// The vertex normal, if computed.
    #[inline]
    #[must_use]
    pub const fn normal(&self) -> Option<Vector3<f64>> {
        self.attributes.normal
    }

    /// The texture coordinate, if assigned.
    #[inline]
    #[must_use]
    pub const fn uv(&self) -> Option<Uv> {
        self.attributes.uv
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::from_coords(x, y, z)
    }
}

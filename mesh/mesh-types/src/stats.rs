//! Summary statistics of a finished mesh.

use std::fmt;

use crate::{IndexedMesh, MeshBounds};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned bounds as plain numeric triples.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Minimum corner `[x, y, z]`.
    pub min: [f64; 3],
    /// Maximum corner `[x, y, z]`.
    pub max: [f64; 3],
}

/// Vertex count, face count and bounding box of a mesh.
///
/// This is the `stats.json` artifact written next to every export.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, MeshStats, Point3};
///
/// let mesh = IndexedMesh::from_positions(
///     vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0), Point3::new(0.0, 2.0, 1.5)],
///     vec![[0, 1, 2]],
/// );
/// let stats = MeshStats::from_mesh(&mesh);
/// assert_eq!(stats.vertices, 3);
/// assert_eq!(stats.faces, 1);
/// assert_eq!(stats.bbox.max, [1.0, 2.0, 1.5]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshStats {
    /// Number of vertices.
    pub vertices: usize,
    /// Number of triangles.
    pub faces: usize,
    /// Bounds of all vertices.
    pub bbox: BoundingBox,
}

impl MeshStats {
    /// Compute stats for a mesh.
    ///
    /// An empty mesh reports a zero-sized box at the origin.
    #[must_use]
    pub fn from_mesh(mesh: &IndexedMesh) -> Self {
        let bbox = mesh.bounds_opt().map_or(
            BoundingBox {
                min: [0.0; 3],
                max: [0.0; 3],
            },
            |b| BoundingBox {
                min: [b.min.x, b.min.y, b.min.z],
                max: [b.max.x, b.max.y, b.max.z],
            },
        );
        Self {
            vertices: mesh.vertices.len(),
            faces: mesh.faces.len(),
            bbox,
        }
    }
}

impl fmt::Display for MeshStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vertices, {} faces, bbox [{:.3}, {:.3}, {:.3}]..[{:.3}, {:.3}, {:.3}]",
            self.vertices,
            self.faces,
            self.bbox.min[0],
            self.bbox.min[1],
            self.bbox.min[2],
            self.bbox.max[0],
            self.bbox.max[1],
            self.bbox.max[2],
        )
    }
}

//! Indexed triangle mesh.

use std::fmt;

use crate::{Aabb, MeshBounds, MeshTopology, Triangle, Uv, Vertex};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
///
/// Vertices and faces are stored separately, with faces referencing
/// vertices by index. Per-vertex attributes (normals, UVs) live on the
/// vertices, so any operation that reorders or drops vertices carries
/// them along.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex, MeshTopology};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 1.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,
}

/// A per-vertex attribute array whose length does not match the vertex count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLengthError {
    /// Number of vertices in the mesh.
    pub expected: usize,
    /// Number of attribute entries supplied.
    pub actual: usize,
}

impl fmt::Display for AttributeLengthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attribute count {} does not match vertex count {}",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for AttributeLengthError {}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Create a mesh from vertices and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Create a mesh from bare positions and faces.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{IndexedMesh, Point3, MeshTopology};
    ///
    /// let mesh = IndexedMesh::from_positions(
    ///     vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
    ///     vec![[0, 1, 2]],
    /// );
    /// assert_eq!(mesh.vertex_count(), 3);
    /// ```
    #[must_use]
    pub fn from_positions(positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices: positions.into_iter().map(Vertex::new).collect(),
            faces,
        }
    }

    /// Vertex positions in vertex order.
    #[must_use]
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Texture coordinates in vertex order.
    ///
    /// Returns `None` unless every vertex has a UV.
    #[must_use]
    pub fn uvs(&self) -> Option<Vec<Uv>> {
        self.vertices.iter().map(Vertex::uv).collect()
    }

    /// Vertex normals in vertex order.
    ///
    /// Returns `None` unless every vertex has a normal.
    #[must_use]
    pub fn normals(&self) -> Option<Vec<Vector3<f64>>> {
        self.vertices.iter().map(Vertex::normal).collect()
    }

    /// Assign one UV per vertex, positionally.
    ///
    /// Either every vertex receives its UV or none does.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeLengthError`] if `uvs.len()` differs from the
    /// vertex count.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{IndexedMesh, Vertex};
    ///
    /// let mut mesh = IndexedMesh::new();
    /// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
    /// assert!(mesh.set_uvs(&[(0.5, 0.5)]).is_ok());
    /// assert!(mesh.set_uvs(&[]).is_err());
    /// ```
    pub fn set_uvs(&mut self, uvs: &[Uv]) -> Result<(), AttributeLengthError> {
        if uvs.len() != self.vertices.len() {
            return Err(AttributeLengthError {
                expected: self.vertices.len(),
                actual: uvs.len(),
            });
        }
        for (vertex, &uv) in self.vertices.iter_mut().zip(uvs) {
            vertex.attributes.uv = Some(uv);
        }
        Ok(())
    }

    /// Check that every face references an existing vertex.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.vertices.len();
        self.faces
            .iter()
            .all(|f| f.iter().all(|&i| (i as usize) < n))
    }

    /// Total surface area.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Reverse the winding of every face and negate vertex normals.
    pub fn flip_normals(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
        for vertex in &mut self.vertices {
            if let Some(ref mut normal) = vertex.attributes.normal {
                *normal = -*normal;
            }
        }
    }
}

impl MeshTopology for IndexedMesh {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    fn face(&self, index: usize) -> Option<[u32; 3]> {
        self.faces.get(index).copied()
    }

    fn triangle(&self, face_index: usize) -> Option<Triangle> {
        let [i0, i1, i2] = *self.faces.get(face_index)?;
        Some(Triangle::new(
            self.vertices.get(i0 as usize)?.position,
            self.vertices.get(i1 as usize)?.position,
            self.vertices.get(i2 as usize)?.position,
        ))
    }

    fn triangles(&self) -> impl Iterator<Item = Triangle> {
        (0..self.faces.len()).filter_map(|i| self.triangle(i))
    }
}

impl MeshBounds for IndexedMesh {
    fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad() -> IndexedMesh {
        IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn empty_mesh() {
        let mesh = IndexedMesh::new();
        assert!(mesh.is_empty());
        assert!(mesh.bounds().is_empty());
        assert!(mesh.bounds_opt().is_none());
    }

    #[test]
    fn surface_area_of_unit_quad() {
        assert_relative_eq!(quad().surface_area(), 1.0);
    }

    #[test]
    fn set_uvs_rejects_wrong_length() {
        let mut mesh = quad();
        let err = mesh.set_uvs(&[(0.0, 0.0)]);
        assert_eq!(
            err,
            Err(AttributeLengthError {
                expected: 4,
                actual: 1
            })
        );
        assert!(mesh.uvs().is_none());
    }

    #[test]
    fn set_uvs_is_positional() {
        let mut mesh = quad();
        let uvs = [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)];
        assert!(mesh.set_uvs(&uvs).is_ok());
        assert_eq!(mesh.uvs(), Some(uvs.to_vec()));
    }

    #[test]
    fn out_of_range_face_is_detected() {
        let mut mesh = quad();
        assert!(mesh.has_valid_indices());
        mesh.faces.push([0, 1, 9]);
        assert!(!mesh.has_valid_indices());
        // Skipped rather than panicking
        assert_eq!(mesh.triangles().count(), 2);
    }

    #[test]
    fn flip_reverses_winding() {
        let mut mesh = quad();
        let before = mesh.triangle(0).and_then(|t| t.normal()).unwrap_or_default();
        mesh.flip_normals();
        let after = mesh.triangle(0).and_then(|t| t.normal()).unwrap_or_default();
        assert_relative_eq!(before.z, -after.z);
    }

    #[test]
    fn bounds_cover_vertices() {
        let b = quad().bounds();
        assert_eq!(b.min, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(b.max, Point3::new(1.0, 1.0, 1.0));
    }
}

//! Traits for mesh types.

use crate::{Aabb, Triangle, Vertex};

/// Read-only topology access shared by mesh representations.
pub trait MeshTopology {
    /// Number of vertices.
    fn vertex_count(&self) -> usize;

    /// Number of faces (triangles).
    fn face_count(&self) -> usize;

    /// A mesh with no vertices or no faces is empty.
    fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.face_count() == 0
    }

    /// Get a vertex by index.
    fn vertex(&self, index: usize) -> Option<&Vertex>;

    /// Get a face by index as vertex indices.
    fn face(&self, index: usize) -> Option<[u32; 3]>;

    /// Resolve a face into concrete positions.
    ///
    /// Returns `None` if the face or any of its vertices is out of range.
    fn triangle(&self, face_index: usize) -> Option<Triangle>;

    /// Iterate over all triangles with resolved vertex positions.
    ///
    /// Faces with out-of-range indices are skipped.
    fn triangles(&self) -> impl Iterator<Item = Triangle>;
}

/// Types that can compute a bounding box.
pub trait MeshBounds {
    /// Compute the axis-aligned bounding box.
    ///
    /// Returns an empty AABB if there are no vertices.
    fn bounds(&self) -> Aabb;

    /// Compute the bounding box, returning `None` if empty.
    fn bounds_opt(&self) -> Option<Aabb> {
        let b = self.bounds();
        if b.is_empty() { None } else { Some(b) }
    }
}

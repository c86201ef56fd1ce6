//! Per-vertex normals from face geometry.

use mesh_types::IndexedMesh;
use nalgebra::Vector3;

/// Compute area-weighted vertex normals and store them on the vertices.
///
/// Each face contributes its unnormalized cross product (twice its area
/// along the face normal) to its three vertices. Vertices whose sum is
/// zero, including unreferenced ones, get no normal.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Point3};
/// use mesh_repair::compute_vertex_normals;
///
/// let mut mesh = IndexedMesh::from_positions(
///     vec![
///         Point3::new(0.0, 0.0, 1.0),
///         Point3::new(1.0, 0.0, 1.0),
///         Point3::new(0.0, 1.0, 1.0),
///     ],
///     vec![[0, 1, 2]],
/// );
/// compute_vertex_normals(&mut mesh);
///
/// let n = mesh.vertices[0].normal().unwrap_or_default();
/// assert!((n.z - 1.0).abs() < 1e-12);
/// ```
pub fn compute_vertex_normals(mesh: &mut IndexedMesh) {
    let mut sums = vec![Vector3::<f64>::zeros(); mesh.vertices.len()];

    for &[i0, i1, i2] in &mesh.faces {
        let (Some(a), Some(b), Some(c)) = (
            mesh.vertices.get(i0 as usize),
            mesh.vertices.get(i1 as usize),
            mesh.vertices.get(i2 as usize),
        ) else {
            continue;
        };
        let n = (b.position - a.position).cross(&(c.position - a.position));
        sums[i0 as usize] += n;
        sums[i1 as usize] += n;
        sums[i2 as usize] += n;
    }

    for (vertex, sum) in mesh.vertices.iter_mut().zip(sums) {
        vertex.attributes.normal = sum.try_normalize(f64::EPSILON);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::Point3;

    #[test]
    fn tent_normals_blend_faces() {
        // Two faces folded along the y axis
        let mut mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
                Point3::new(1.0, 0.0, 2.0),
                Point3::new(-1.0, 0.0, 2.0),
            ],
            vec![[0, 2, 1], [0, 1, 3]],
        );
        compute_vertex_normals(&mut mesh);

        let shared = mesh.vertices[0].normal().unwrap_or_default();
        assert_relative_eq!(shared.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(shared.x, 0.0, epsilon = 1e-12);

        let wing = mesh.vertices[2].normal().unwrap_or_default();
        assert!(wing.x.abs() > 0.1);
    }

    #[test]
    fn unreferenced_vertex_has_no_normal() {
        let mut mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
                Point3::new(3.0, 3.0, 3.0),
            ],
            vec![[0, 1, 2]],
        );
        compute_vertex_normals(&mut mesh);
        assert!(mesh.vertices[3].normal().is_none());
        assert!(mesh.vertices[1].normal().is_some());
    }
}

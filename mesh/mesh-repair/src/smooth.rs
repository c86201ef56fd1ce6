//! Uniform neighbour-average smoothing.
//!
//! Each pass replaces every vertex with the mean of itself and its
//! one-ring:
//!
//! ```text
//! v_new = (v + sum(N(v))) / (1 + |N(v)|)
//! ```
//!
//! Positions are read from the previous pass only, so the result does not
//! depend on vertex order. Vertices with no neighbours stay put.

use mesh_types::IndexedMesh;
use nalgebra::Point3;

use crate::adjacency::vertex_neighbors;

/// Apply `iterations` passes of uniform smoothing in place.
///
/// Returns the largest single-vertex displacement over all passes.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Point3};
/// use mesh_repair::smooth_simple;
///
/// let mut mesh = IndexedMesh::from_positions(
///     vec![
///         Point3::new(0.0, 0.0, 1.0),
///         Point3::new(1.0, 0.0, 1.0),
///         Point3::new(0.0, 1.0, 1.0),
///     ],
///     vec![[0, 1, 2]],
/// );
/// smooth_simple(&mut mesh, 1);
///
/// // Every vertex of a lone triangle collapses onto the centroid
/// let c = mesh.vertices[0].position;
/// assert!((c.x - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn smooth_simple(mesh: &mut IndexedMesh, iterations: u32) -> f64 {
    if iterations == 0 || mesh.vertices.is_empty() || mesh.faces.is_empty() {
        return 0.0;
    }

    let neighbors = vertex_neighbors(mesh.vertices.len(), &mesh.faces);
    let mut max_displacement = 0.0_f64;

    for _ in 0..iterations {
        let previous: Vec<Point3<f64>> = mesh.positions();

        for (i, vertex) in mesh.vertices.iter_mut().enumerate() {
            let ring = &neighbors[i];
            if ring.is_empty() {
                continue;
            }

            let sum = ring
                .iter()
                .fold(previous[i].coords, |acc, &n| acc + previous[n as usize].coords);

            #[allow(clippy::cast_precision_loss)]
            let averaged = Point3::from(sum / (ring.len() + 1) as f64);

            max_displacement = max_displacement.max((averaged - previous[i]).norm());
            vertex.position = averaged;
        }
    }

    max_displacement
}

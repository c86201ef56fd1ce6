//! Per-vertex texture coordinates from the camera projection.

use mesh_types::{Uv, Vertex};

use crate::intrinsics::Intrinsics;

/// Project every vertex into the image and normalise to `[0, 1]`.
///
/// `u` runs left to right. `v` is flipped so that `v = 1` is the top row,
/// which is the OBJ texture convention. Vertices that project outside the
/// image are clamped to the border. The result has one entry per vertex,
/// in vertex order.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn project_uvs(vertices: &[Vertex], intrinsics: &Intrinsics, width: u32, height: u32) -> Vec<Uv> {
    let w = f64::from(width.max(1));
    let h = f64::from(height.max(1));

    vertices
        .iter()
        .map(|vertex| {
            let (u, v) = intrinsics.project(&vertex.position);
            let u = (u / w).clamp(0.0, 1.0);
            let v = 1.0 - (v / h).clamp(0.0, 1.0);
            (u as f32, v as f32)
        })
        .collect()
}

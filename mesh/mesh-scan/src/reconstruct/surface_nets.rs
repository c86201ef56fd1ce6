//! Surface nets extraction on the finest solver level.
//!
//! Cell centres are the corners of a dual grid. Every dual cube whose eight
//! corners are active and straddle the iso-value gets one vertex, the mean of
//! its edge crossings. Every sign-changing edge between two active cells
//! gets a quad over the four dual cubes around it.

use hashbrown::HashMap;
use mesh_types::{IndexedMesh, Vertex};
use nalgebra::{Point3, Vector3};

use super::grid::{Cell, Domain, Level, offset, pack};

/// The twelve edges of a dual cube, as pairs of corner offsets.
const CUBE_EDGES: [([i32; 3], [i32; 3]); 12] = [
    ([0, 0, 0], [1, 0, 0]),
    ([0, 1, 0], [1, 1, 0]),
    ([0, 0, 1], [1, 0, 1]),
    ([0, 1, 1], [1, 1, 1]),
    ([0, 0, 0], [0, 1, 0]),
    ([1, 0, 0], [1, 1, 0]),
    ([0, 0, 1], [0, 1, 1]),
    ([1, 0, 1], [1, 1, 1]),
    ([0, 0, 0], [0, 0, 1]),
    ([1, 0, 0], [1, 0, 1]),
    ([0, 1, 0], [0, 1, 1]),
    ([1, 1, 0], [1, 1, 1]),
];

/// Dual cubes around an edge from cell `c` along each axis, listed
/// counter-clockwise when seen from the positive end of the axis.
const EDGE_CUBES: [[[i32; 3]; 4]; 3] = [
    [[0, -1, -1], [0, 0, -1], [0, 0, 0], [0, -1, 0]],
    [[-1, 0, -1], [-1, 0, 0], [0, 0, 0], [0, 0, -1]],
    [[-1, -1, 0], [0, -1, 0], [0, 0, 0], [-1, 0, 0]],
];

const AXES: [[i32; 3]; 3] = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

/// Extracts the `iso` level set of `level.chi`.
///
/// Triangle normals point towards increasing values. Vertices are emitted
/// in dual-cube key order, so the output depends only on the input values.
pub(crate) fn extract(level: &Level, domain: &Domain, iso: f64) -> IndexedMesh {
    let mut mesh = IndexedMesh::new();
    let mut cube_vertex: HashMap<u64, u32> = HashMap::new();

    for &cell in &level.cells {
        if let Some(position) = cube_vertex_position(level, domain, cell, iso) {
            // Vertex count fits in u32 for any grid the solver accepts
            #[allow(clippy::cast_possible_truncation)]
            let index = mesh.vertices.len() as u32;
            cube_vertex.insert(pack(cell), index);
            mesh.vertices.push(Vertex::new(position));
        }
    }

    for (i, &cell) in level.cells.iter().enumerate() {
        let inside = level.chi[i] > iso;
        for (axis, step) in AXES.iter().enumerate() {
            let Some(j) = level.index_of(offset(cell, *step)) else {
                continue;
            };
            if (level.chi[j] > iso) == inside {
                continue;
            }

            let quad = EDGE_CUBES[axis].map(|d| {
                let cube = offset(cell, d);
                if cube.iter().any(|&v| v < 0) {
                    None
                } else {
                    cube_vertex.get(&pack(cube)).copied()
                }
            });
            let [Some(c0), Some(c1), Some(c2), Some(c3)] = quad else {
                continue;
            };

            if inside {
                mesh.faces.push([c0, c3, c2]);
                mesh.faces.push([c0, c2, c1]);
            } else {
                mesh.faces.push([c0, c1, c2]);
                mesh.faces.push([c0, c2, c3]);
            }
        }
    }

    mesh
}

/// Vertex of the dual cube with minimum corner `cell`, if the cube is
/// complete and crosses the iso-value.
fn cube_vertex_position(level: &Level, domain: &Domain, cell: Cell, iso: f64) -> Option<Point3<f64>> {
    let mut values = [0.0; 8];
    for (corner, value) in values.iter_mut().enumerate() {
        let i = level.index_of(corner_cell(cell, corner))?;
        *value = level.chi[i];
    }

    let mut sum = Vector3::zeros();
    let mut crossings = 0u32;
    for (a, b) in CUBE_EDGES {
        let va = values[corner_index(a)];
        let vb = values[corner_index(b)];
        if (va > iso) == (vb > iso) {
            continue;
        }
        let t = (iso - va) / (vb - va);
        let pa = level.cell_center(domain, offset(cell, a));
        let pb = level.cell_center(domain, offset(cell, b));
        sum += pa.coords + (pb - pa) * t;
        crossings += 1;
    }

    (crossings > 0).then(|| Point3::from(sum / f64::from(crossings)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn corner_cell(cell: Cell, corner: usize) -> Cell {
    [
        cell[0] + (corner & 1) as i32,
        cell[1] + ((corner >> 1) & 1) as i32,
        cell[2] + ((corner >> 2) & 1) as i32,
    ]
}

#[allow(clippy::cast_sign_loss)]
const fn corner_index(d: [i32; 3]) -> usize {
    (d[0] | (d[1] << 1) | (d[2] << 2)) as usize
}

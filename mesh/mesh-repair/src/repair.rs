//! Core mesh repair operations.
//!
//! Each operation mutates the mesh in place and returns how many elements
//! it removed. [`repair_mesh`] chains them in the order reconstruction
//! output needs: faces first, then vertices, then topology.

use hashbrown::{HashMap, HashSet};
use mesh_types::{Aabb, IndexedMesh, MeshTopology, Triangle};
use tracing::debug;

use crate::adjacency::MeshAdjacency;
use crate::error::{RepairError, RepairResult};

/// Configuration parameters for mesh repair.
///
/// # Example
///
/// ```
/// use mesh_repair::RepairParams;
///
/// let params = RepairParams::default()
///     .with_degenerate_area_threshold(1e-10)
///     .with_remove_non_manifold(false);
/// assert!(!params.remove_non_manifold);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RepairParams {
    /// Triangles with area at or below this are removed.
    ///
    /// Default: `1e-12`
    pub degenerate_area_threshold: f64,

    /// Whether to trim faces off edges shared by more than two triangles.
    ///
    /// Default: `true`
    pub remove_non_manifold: bool,

    /// Whether to drop vertices no face references after repair.
    ///
    /// Default: `true`
    pub remove_unreferenced: bool,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            degenerate_area_threshold: 1e-12,
            remove_non_manifold: true,
            remove_unreferenced: true,
        }
    }
}

impl RepairParams {
    /// Set the minimum triangle area threshold.
    #[must_use]
    pub const fn with_degenerate_area_threshold(mut self, threshold: f64) -> Self {
        self.degenerate_area_threshold = threshold;
        self
    }

    /// Set whether non-manifold edges are resolved.
    #[must_use]
    pub const fn with_remove_non_manifold(mut self, remove: bool) -> Self {
        self.remove_non_manifold = remove;
        self
    }

    /// Set whether unreferenced vertices are removed.
    #[must_use]
    pub const fn with_remove_unreferenced(mut self, remove: bool) -> Self {
        self.remove_unreferenced = remove;
        self
    }
}

/// Check that every face index refers to an existing vertex.
///
/// # Errors
///
/// Returns [`RepairError::InvalidIndex`] for the first bad index found.
pub fn validate_indices(mesh: &IndexedMesh) -> RepairResult<()> {
    let vertex_count = mesh.vertices.len();
    for (face, indices) in mesh.faces.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(RepairError::InvalidIndex {
                face,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

/// Keep only the part of the mesh whose vertices lie inside `aabb`.
///
/// Vertices outside the box are removed together with every face that
/// references them; the remaining vertices keep their relative order.
/// Returns the number of vertices removed.
///
/// # Example
///
/// ```
/// use mesh_types::{Aabb, IndexedMesh, Point3};
/// use mesh_repair::crop_to_aabb;
///
/// let mut mesh = IndexedMesh::from_positions(
///     vec![
///         Point3::new(0.0, 0.0, 1.0),
///         Point3::new(1.0, 0.0, 1.0),
///         Point3::new(0.0, 1.0, 1.0),
///         Point3::new(5.0, 5.0, 5.0),
///     ],
///     vec![[0, 1, 2], [1, 3, 2]],
/// );
/// let bounds = Aabb::new(Point3::new(-1.0, -1.0, 0.0), Point3::new(2.0, 2.0, 2.0));
///
/// assert_eq!(crop_to_aabb(&mut mesh, &bounds), 1);
/// assert_eq!(mesh.faces, vec![[0, 1, 2]]);
/// ```
pub fn crop_to_aabb(mesh: &mut IndexedMesh, aabb: &Aabb) -> usize {
    let inside: Vec<bool> = mesh
        .vertices
        .iter()
        .map(|v| aabb.contains(&v.position))
        .collect();

    mesh.faces
        .retain(|face| face.iter().all(|&i| inside.get(i as usize).copied().unwrap_or(false)));

    let original = mesh.vertices.len();
    let remap = compact_vertices(mesh, &inside);
    remap_faces(&mut mesh.faces, &remap);
    original - mesh.vertices.len()
}

/// Remove faces with a repeated vertex index or an area at or below
/// `area_threshold`.
///
/// Returns the number of triangles removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_degenerate_triangles;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(5.0, 0.0, 1.0)); // Collinear
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([0, 0, 1]); // Repeated index
///
/// assert_eq!(remove_degenerate_triangles(&mut mesh, 1e-12), 2);
/// ```
pub fn remove_degenerate_triangles(mesh: &mut IndexedMesh, area_threshold: f64) -> usize {
    let original_count = mesh.faces.len();
    let vertices = &mesh.vertices;

    mesh.faces.retain(|&[i0, i1, i2]| {
        if i0 == i1 || i1 == i2 || i0 == i2 {
            return false;
        }
        match (
            vertices.get(i0 as usize),
            vertices.get(i1 as usize),
            vertices.get(i2 as usize),
        ) {
            (Some(a), Some(b), Some(c)) => {
                !Triangle::new(a.position, b.position, c.position).is_degenerate(area_threshold)
            }
            _ => false,
        }
    });

    original_count - mesh.faces.len()
}

/// Remove faces that use the same three vertices as an earlier face.
///
/// Winding and starting vertex are ignored, so `[0, 1, 2]`, `[1, 2, 0]`
/// and `[0, 2, 1]` are all the same triangle. The first occurrence stays.
///
/// Returns the number of duplicate faces removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_duplicate_faces;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 1.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([2, 1, 0]); // Same triangle, flipped
///
/// assert_eq!(remove_duplicate_faces(&mut mesh), 1);
/// ```
pub fn remove_duplicate_faces(mesh: &mut IndexedMesh) -> usize {
    let original_count = mesh.faces.len();
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(original_count);

    mesh.faces.retain(|face| {
        let mut key = *face;
        key.sort_unstable();
        seen.insert(key)
    });

    original_count - mesh.faces.len()
}

/// Merge vertices whose positions are exactly equal.
///
/// The first occurrence of each position survives and vertex order is
/// otherwise preserved. Faces are remapped; faces that collapse onto a
/// repeated index are dropped. Returns the number of vertices merged away.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_duplicate_vertices;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 1.0)); // Copy of 1
/// mesh.faces.push([0, 3, 2]);
///
/// assert_eq!(remove_duplicate_vertices(&mut mesh), 1);
/// assert_eq!(mesh.faces, vec![[0, 1, 2]]);
/// ```
#[allow(clippy::cast_possible_truncation)]
// Truncation: mesh indices are u32, so vertex counts > 4B are unsupported
pub fn remove_duplicate_vertices(mesh: &mut IndexedMesh) -> usize {
    let original_count = mesh.vertices.len();
    let mut first_seen: HashMap<[u64; 3], u32> = HashMap::with_capacity(original_count);
    let mut remap: Vec<Option<u32>> = Vec::with_capacity(original_count);
    let mut kept = Vec::with_capacity(original_count);

    for vertex in &mesh.vertices {
        let p = vertex.position;
        let key = [position_bits(p.x), position_bits(p.y), position_bits(p.z)];
        let next = kept.len() as u32;
        let target = *first_seen.entry(key).or_insert_with(|| {
            kept.push(*vertex);
            next
        });
        remap.push(Some(target));
    }

    let merged = original_count - kept.len();
    if merged == 0 {
        return 0;
    }

    mesh.vertices = kept;
    remap_faces(&mut mesh.faces, &remap);
    mesh.faces
        .retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);

    merged
}

/// Bit pattern of a coordinate with `-0.0` folded onto `0.0`.
#[inline]
fn position_bits(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

/// Resolve edges shared by more than two faces.
///
/// For every such edge the smallest-area faces are removed until two
/// remain. Edges are visited in sorted order so the result does not
/// depend on hashing. Returns the number of faces removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Point3};
/// use mesh_repair::{remove_non_manifold_edges, MeshAdjacency};
///
/// // Three fins hinged on edge (0, 1); the smallest one goes.
/// let mut mesh = IndexedMesh::from_positions(
///     vec![
///         Point3::new(0.0, 0.0, 1.0),
///         Point3::new(1.0, 0.0, 1.0),
///         Point3::new(0.5, 1.0, 1.0),
///         Point3::new(0.5, -1.0, 1.0),
///         Point3::new(0.5, 0.0, 1.1),
///     ],
///     vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]],
/// );
///
/// assert_eq!(remove_non_manifold_edges(&mut mesh), 1);
/// assert!(MeshAdjacency::build(&mesh.faces).is_manifold());
/// ```
pub fn remove_non_manifold_edges(mesh: &mut IndexedMesh) -> usize {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let mut edges: Vec<((u32, u32), Vec<usize>)> = adjacency
        .non_manifold_edges()
        .map(|(edge, faces)| (edge, faces.to_vec()))
        .collect();
    if edges.is_empty() {
        return 0;
    }
    edges.sort_unstable_by_key(|(edge, _)| *edge);

    let areas: Vec<f64> = (0..mesh.faces.len())
        .map(|i| mesh.triangle(i).map_or(0.0, |t| t.area()))
        .collect();
    let mut removed = vec![false; mesh.faces.len()];

    for (_, faces) in edges {
        let mut live: Vec<usize> = faces.into_iter().filter(|&f| !removed[f]).collect();
        if live.len() <= 2 {
            continue;
        }
        live.sort_by(|&a, &b| areas[a].total_cmp(&areas[b]).then(a.cmp(&b)));
        for &f in &live[..live.len() - 2] {
            removed[f] = true;
        }
    }

    let original_count = mesh.faces.len();
    let mut idx = 0;
    mesh.faces.retain(|_| {
        let keep = !removed[idx];
        idx += 1;
        keep
    });

    original_count - mesh.faces.len()
}

/// Remove vertices no face references and compact the vertex array.
///
/// Returns the number of vertices removed.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::remove_unreferenced_vertices;
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(100.0, 100.0, 100.0)); // Unreferenced
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(remove_unreferenced_vertices(&mut mesh), 1);
/// assert_eq!(mesh.vertices.len(), 3);
/// ```
pub fn remove_unreferenced_vertices(mesh: &mut IndexedMesh) -> usize {
    let mut referenced = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &i in face {
            if let Some(slot) = referenced.get_mut(i as usize) {
                *slot = true;
            }
        }
    }

    let original = mesh.vertices.len();
    let remap = compact_vertices(mesh, &referenced);
    remap_faces(&mut mesh.faces, &remap);
    original - mesh.vertices.len()
}

/// Keep vertices whose flag is set and return the old-to-new index map.
#[allow(clippy::cast_possible_truncation)]
fn compact_vertices(mesh: &mut IndexedMesh, keep: &[bool]) -> Vec<Option<u32>> {
    let mut remap = Vec::with_capacity(mesh.vertices.len());
    let mut next = 0u32;
    for &k in keep {
        if k {
            remap.push(Some(next));
            next += 1;
        } else {
            remap.push(None);
        }
    }

    let mut idx = 0;
    mesh.vertices.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });

    remap
}

/// Rewrite face indices through `remap`, dropping faces that hit a removed vertex.
fn remap_faces(faces: &mut Vec<[u32; 3]>, remap: &[Option<u32>]) {
    faces.retain_mut(|face| {
        for i in face.iter_mut() {
            match remap.get(*i as usize).copied().flatten() {
                Some(new) => *i = new,
                None => return false,
            }
        }
        true
    });
}

/// Run the cleanup chain for a reconstructed mesh.
///
/// Order:
/// 1. Remove degenerate triangles
/// 2. Remove duplicate faces
/// 3. Merge duplicate vertices (and drop faces that became duplicates)
/// 4. Resolve non-manifold edges
/// 5. Remove unreferenced vertices
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
/// use mesh_repair::{repair_mesh, RepairParams};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 1.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 10.0, 1.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let summary = repair_mesh(&mut mesh, &RepairParams::default());
/// assert!(!summary.had_changes());
/// ```
#[must_use]
pub fn repair_mesh(mesh: &mut IndexedMesh, params: &RepairParams) -> RepairSummary {
    let initial_vertices = mesh.vertex_count();
    let initial_faces = mesh.face_count();

    let degenerates_removed = remove_degenerate_triangles(mesh, params.degenerate_area_threshold);
    let mut duplicate_faces_removed = remove_duplicate_faces(mesh);
    let vertices_merged = remove_duplicate_vertices(mesh);
    if vertices_merged > 0 {
        duplicate_faces_removed += remove_duplicate_faces(mesh);
    }
    let non_manifold_faces_removed = if params.remove_non_manifold {
        remove_non_manifold_edges(mesh)
    } else {
        0
    };
    let unreferenced_removed = if params.remove_unreferenced {
        remove_unreferenced_vertices(mesh)
    } else {
        0
    };

    let summary = RepairSummary {
        initial_vertices,
        initial_faces,
        final_vertices: mesh.vertex_count(),
        final_faces: mesh.face_count(),
        degenerates_removed,
        duplicate_faces_removed,
        vertices_merged,
        non_manifold_faces_removed,
        unreferenced_removed,
    };
    debug!(%summary, "Mesh repaired");
    summary
}

/// Result of a repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairSummary {
    /// Number of vertices before repair.
    pub initial_vertices: usize,
    /// Number of faces before repair.
    pub initial_faces: usize,
    /// Number of vertices after repair.
    pub final_vertices: usize,
    /// Number of faces after repair.
    pub final_faces: usize,
    /// Number of degenerate triangles removed.
    pub degenerates_removed: usize,
    /// Number of duplicate faces removed.
    pub duplicate_faces_removed: usize,
    /// Number of vertices merged into an identical earlier one.
    pub vertices_merged: usize,
    /// Number of faces removed to resolve non-manifold edges.
    pub non_manifold_faces_removed: usize,
    /// Number of unreferenced vertices removed.
    pub unreferenced_removed: usize,
}

impl RepairSummary {
    /// Check if any repairs were performed.
    #[must_use]
    pub const fn had_changes(&self) -> bool {
        self.degenerates_removed > 0
            || self.duplicate_faces_removed > 0
            || self.vertices_merged > 0
            || self.non_manifold_faces_removed > 0
            || self.unreferenced_removed > 0
    }
}

impl std::fmt::Display for RepairSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Repair: {} verts ({} merged, {} unreferenced), {} faces ({} degenerate, {} duplicate, {} non-manifold)",
            self.final_vertices,
            self.vertices_merged,
            self.unreferenced_removed,
            self.final_faces,
            self.degenerates_removed,
            self.duplicate_faces_removed,
            self.non_manifold_faces_removed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{Point3, Vertex};

    fn grid_mesh(n: u32) -> IndexedMesh {
        let mut positions = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                positions.push(Point3::new(f64::from(x), f64::from(y), 1.0));
            }
        }
        let mut faces = Vec::new();
        let row = n + 1;
        for y in 0..n {
            for x in 0..n {
                let i = y * row + x;
                faces.push([i, i + 1, i + row + 1]);
                faces.push([i, i + row + 1, i + row]);
            }
        }
        IndexedMesh::from_positions(positions, faces)
    }

    #[test]
    fn clean_grid_is_untouched() {
        let mut mesh = grid_mesh(4);
        let before = mesh.clone();
        let summary = repair_mesh(&mut mesh, &RepairParams::default());
        assert!(!summary.had_changes());
        assert_eq!(mesh, before);
    }

    #[test]
    fn validate_reports_bad_index() {
        let mut mesh = grid_mesh(1);
        assert!(validate_indices(&mesh).is_ok());
        mesh.faces.push([0, 1, 42]);
        assert!(matches!(
            validate_indices(&mesh),
            Err(RepairError::InvalidIndex { face: 2, index: 42, .. })
        ));
    }

    #[test]
    fn degenerate_removal_drops_out_of_range_faces() {
        let mut mesh = grid_mesh(1);
        mesh.faces.push([0, 1, 99]);
        assert_eq!(remove_degenerate_triangles(&mut mesh, 1e-12), 1);
        assert!(mesh.has_valid_indices());
    }

    #[test]
    fn duplicate_faces_ignore_rotation() {
        let mut mesh = grid_mesh(1);
        let f = mesh.faces[0];
        mesh.faces.push([f[1], f[2], f[0]]);
        assert_eq!(remove_duplicate_faces(&mut mesh), 1);
        assert_eq!(mesh.faces.len(), 2);
    }

    #[test]
    fn duplicate_vertices_merge_to_first() {
        // Two quads stitched along x = 1 with their own copies of the seam
        let mut mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(2.0, 0.0, 1.0),
                Point3::new(2.0, 1.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3], [4, 5, 6], [4, 6, 7]],
        );
        assert_eq!(remove_duplicate_vertices(&mut mesh), 2);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.faces[2], [1, 4, 5]);
        assert_eq!(mesh.faces[3], [1, 5, 2]);
    }

    #[test]
    fn negative_zero_counts_as_duplicate() {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 1.0));
        mesh.vertices.push(Vertex::from_coords(-0.0, 1.0, 1.0));
        assert_eq!(remove_duplicate_vertices(&mut mesh), 1);
    }

    #[test]
    fn non_manifold_keeps_two_largest() {
        let mut mesh = IndexedMesh::from_positions(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(0.5, 2.0, 1.0),
                Point3::new(0.5, -2.0, 1.0),
                Point3::new(0.5, 0.0, 1.2),
                Point3::new(0.5, 0.0, 0.5),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 1, 4], [1, 0, 5]],
        );
        assert_eq!(remove_non_manifold_edges(&mut mesh), 2);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [1, 0, 3]]);
    }

    #[test]
    fn crop_removes_outside_vertices_and_faces() {
        let mut mesh = grid_mesh(3);
        let bounds = Aabb::new(Point3::new(-0.5, -0.5, 0.0), Point3::new(1.5, 1.5, 2.0));
        let removed = crop_to_aabb(&mut mesh, &bounds);
        assert_eq!(removed, 16 - 4);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces.len(), 2);
        assert!(mesh.has_valid_indices());
    }

    #[test]
    fn repair_counts_add_up() {
        let mut mesh = grid_mesh(2);
        mesh.faces.push(mesh.faces[0]);
        mesh.faces.push([0, 0, 1]);
        mesh.vertices.push(Vertex::from_coords(50.0, 50.0, 50.0));

        let summary = repair_mesh(&mut mesh, &RepairParams::default());
        assert_eq!(summary.degenerates_removed, 1);
        assert_eq!(summary.duplicate_faces_removed, 1);
        assert_eq!(summary.unreferenced_removed, 1);
        assert_eq!(summary.final_faces, 8);
        assert!(summary.to_string().contains("8 faces"));
    }

    #[test]
    fn unreferenced_vertices_can_be_kept() {
        let mut mesh = grid_mesh(1);
        mesh.vertices.push(Vertex::from_coords(50.0, 50.0, 50.0));

        let params = RepairParams::default().with_remove_unreferenced(false);
        let summary = repair_mesh(&mut mesh, &params);
        assert_eq!(summary.unreferenced_removed, 0);
        assert_eq!(mesh.vertices.len(), 5);
    }
}

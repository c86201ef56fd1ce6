//! Mesh adjacency data structures.
//!
//! Provides lookups for edge-to-face and vertex-to-vertex relationships.

use hashbrown::{HashMap, HashSet};

/// Adjacency information for a face list.
///
/// Provides lookups for:
/// - Faces adjacent to an edge
/// - Non-manifold edges (edges with more than two adjacent faces)
/// - The one-ring of vertex neighbours
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps edge (v0, v1) to list of face indices. v0 < v1.
    edge_to_faces: HashMap<(u32, u32), Vec<usize>>,
}

impl MeshAdjacency {
    /// Build adjacency information from a list of faces.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_repair::MeshAdjacency;
    ///
    /// let faces = vec![[0, 1, 2], [1, 3, 2]];
    /// let adj = MeshAdjacency::build(&faces);
    ///
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// assert!(adj.is_manifold());
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            for edge in face_edges(*face) {
                edge_to_faces.entry(edge).or_default().push(face_idx);
            }
        }

        Self { edge_to_faces }
    }

    /// Faces adjacent to an edge, or `None` if the edge does not exist.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Count the edges with exactly one adjacent face.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Iterate over edges with more than two adjacent faces, with those faces.
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = ((u32, u32), &[usize])> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, faces)| (edge, faces.as_slice()))
    }

    /// Count the edges with more than two adjacent faces.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Check that every edge has at most two adjacent faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() <= 2)
    }

    /// Total number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }
}

/// One-ring neighbours of every vertex, indexed by vertex.
///
/// Vertices not referenced by any face get an empty list. Neighbour lists
/// are sorted so iteration order does not depend on hashing.
#[must_use]
pub(crate) fn vertex_neighbors(vertex_count: usize, faces: &[[u32; 3]]) -> Vec<Vec<u32>> {
    let mut sets: Vec<HashSet<u32>> = vec![HashSet::new(); vertex_count];

    for face in faces {
        for i in 0..3 {
            let v = face[i] as usize;
            if v >= vertex_count {
                continue;
            }
            sets[v].insert(face[(i + 1) % 3]);
            sets[v].insert(face[(i + 2) % 3]);
        }
    }

    sets.into_iter()
        .map(|set| {
            let mut list: Vec<u32> = set.into_iter().collect();
            list.sort_unstable();
            list
        })
        .collect()
}

/// The three undirected edges of a face.
#[inline]
pub(crate) fn face_edges(face: [u32; 3]) -> [(u32, u32); 3] {
    [
        normalize_edge(face[0], face[1]),
        normalize_edge(face[1], face[2]),
        normalize_edge(face[2], face[0]),
    ]
}

/// Order an edge so the smaller index comes first.
#[inline]
fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}

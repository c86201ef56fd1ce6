//! Core mesh decimation algorithm.
//!
//! Implements edge collapse with quadric error metrics (QEM). Every vertex
//! keeps the list of faces around it, so a collapse touches only the two
//! one-rings involved. Heap entries are invalidated lazily through
//! per-vertex version stamps.

// Mesh indices and counts don't overflow in practice
#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::HashSet;
use mesh_types::{IndexedMesh, Point3, Vertex};
use tracing::{debug, info};

use crate::error::{DecimateError, DecimateResult};
use crate::params::DecimateParams;
use crate::quadric::Quadric;
use crate::result::DecimationResult;

/// An edge collapse candidate in the priority queue.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    v1: u32,
    v2: u32,
    /// Version stamps of both ends when the candidate was computed.
    stamp: (u32, u32),
    cost: f64,
    target: Point3<f64>,
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behaviour; ties broken on indices so runs repeat
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| (other.v1, other.v2).cmp(&(self.v1, self.v2)))
    }
}

/// Mutable connectivity shared by the collapse loop.
struct Workspace {
    positions: Vec<Point3<f64>>,
    vertex_alive: Vec<bool>,
    version: Vec<u32>,
    quadrics: Vec<Quadric>,
    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    active_faces: usize,
}

impl Workspace {
    fn new(mesh: &IndexedMesh) -> Self {
        let n = mesh.vertices.len();
        let positions = mesh.positions();
        let mut quadrics = vec![Quadric::default(); n];
        let mut vertex_faces = vec![Vec::new(); n];

        for (fi, &[i0, i1, i2]) in mesh.faces.iter().enumerate() {
            let (p0, p1, p2) = (
                &positions[i0 as usize],
                &positions[i1 as usize],
                &positions[i2 as usize],
            );
            if let Some(q) = Quadric::from_triangle(p0, p1, p2) {
                quadrics[i0 as usize] += q;
                quadrics[i1 as usize] += q;
                quadrics[i2 as usize] += q;
            }
            for &v in &[i0, i1, i2] {
                vertex_faces[v as usize].push(fi);
            }
        }

        Self {
            positions,
            vertex_alive: vec![true; n],
            version: vec![0; n],
            quadrics,
            faces: mesh.faces.clone(),
            face_alive: vec![true; mesh.faces.len()],
            vertex_faces,
            active_faces: mesh.faces.len(),
        }
    }

    /// Candidates for every edge of the live faces.
    fn seed_heap(&self, params: &DecimateParams) -> BinaryHeap<EdgeCollapse> {
        let mut heap = BinaryHeap::new();
        let mut seen = HashSet::new();
        for (face, _) in self.faces.iter().zip(&self.face_alive).filter(|(_, alive)| **alive) {
            let [a, b, c] = *face;
            for (v1, v2) in [(a, b), (b, c), (c, a)] {
                let edge = if v1 < v2 { (v1, v2) } else { (v2, v1) };
                if seen.insert(edge) {
                    if let Some(collapse) = self.candidate(edge.0, edge.1, params) {
                        heap.push(collapse);
                    }
                }
            }
        }
        heap
    }

    fn live_faces(&self, v: u32) -> impl Iterator<Item = usize> + '_ {
        self.vertex_faces[v as usize]
            .iter()
            .copied()
            .filter(|&f| self.face_alive[f])
    }

    /// Distinct one-ring neighbours of `v`.
    fn neighbors(&self, v: u32) -> Vec<u32> {
        let mut ring: Vec<u32> = self
            .live_faces(v)
            .flat_map(|f| self.faces[f])
            .filter(|&u| u != v)
            .collect();
        ring.sort_unstable();
        ring.dedup();
        ring
    }

    /// Number of live faces using edge `(a, b)`.
    fn edge_valence(&self, a: u32, b: u32) -> usize {
        self.live_faces(a)
            .filter(|&f| self.faces[f].contains(&b))
            .count()
    }

    fn candidate(&self, v1: u32, v2: u32, params: &DecimateParams) -> Option<EdgeCollapse> {
        let boundary = self.edge_valence(v1, v2) == 1;
        if boundary && params.preserve_boundary {
            return None;
        }

        let q = self.quadrics[v1 as usize] + self.quadrics[v2 as usize];
        let p1 = self.positions[v1 as usize];
        let p2 = self.positions[v2 as usize];

        let pinned = if params.preserve_boundary {
            match (self.is_boundary_vertex(v1), self.is_boundary_vertex(v2)) {
                (true, true) => return None,
                (true, false) => Some(p1),
                (false, true) => Some(p2),
                (false, false) => None,
            }
        } else {
            None
        };

        let target = pinned.or_else(|| q.optimal_point()).unwrap_or_else(|| {
            // Singular system: best of the two ends and the midpoint
            let mid = nalgebra::center(&p1, &p2);
            [p1, p2, mid]
                .into_iter()
                .min_by(|a, b| q.evaluate(a).total_cmp(&q.evaluate(b)))
                .unwrap_or(mid)
        });

        let mut cost = q.evaluate(&target);
        if boundary {
            cost *= params.boundary_penalty;
        }

        Some(EdgeCollapse {
            v1,
            v2,
            stamp: (self.version[v1 as usize], self.version[v2 as usize]),
            cost,
            target,
        })
    }

    fn is_boundary_vertex(&self, v: u32) -> bool {
        self.neighbors(v)
            .into_iter()
            .any(|u| self.edge_valence(v, u) == 1)
    }

    fn is_current(&self, c: &EdgeCollapse) -> bool {
        self.vertex_alive[c.v1 as usize]
            && self.vertex_alive[c.v2 as usize]
            && self.version[c.v1 as usize] == c.stamp.0
            && self.version[c.v2 as usize] == c.stamp.1
    }

    /// Link condition: the ends may share only the apexes of the faces on
    /// the edge, otherwise the collapse pinches the surface.
    fn preserves_manifold(&self, v1: u32, v2: u32) -> bool {
        let ring1: HashSet<u32> = self.neighbors(v1).into_iter().collect();
        let shared = self
            .neighbors(v2)
            .into_iter()
            .filter(|u| *u != v1 && ring1.contains(u))
            .count();
        shared <= self.edge_valence(v1, v2).min(2)
    }

    /// Reject collapses that would invert a surviving face.
    fn preserves_orientation(&self, v1: u32, v2: u32, target: &Point3<f64>) -> bool {
        for v in [v1, v2] {
            for f in self.live_faces(v) {
                let face = self.faces[f];
                if face.contains(&v1) && face.contains(&v2) {
                    continue;
                }
                let before = self.face_normal(face, None);
                let after = self.face_normal(face, Some((v, target)));
                if let (Some(n0), Some(n1)) = (before, after) {
                    if n0.dot(&n1) <= 0.0 {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn face_normal(
        &self,
        face: [u32; 3],
        moved: Option<(u32, &Point3<f64>)>,
    ) -> Option<nalgebra::Vector3<f64>> {
        let p = |i: u32| match moved {
            Some((v, target)) if v == i => *target,
            _ => self.positions[i as usize],
        };
        let (a, b, c) = (p(face[0]), p(face[1]), p(face[2]));
        (b - a).cross(&(c - a)).try_normalize(1e-15)
    }

    /// Merge `v2` into `v1` at `target`.
    fn collapse(&mut self, v1: u32, v2: u32, target: Point3<f64>) {
        self.positions[v1 as usize] = target;
        let q2 = self.quadrics[v2 as usize];
        self.quadrics[v1 as usize] += q2;

        let moved = std::mem::take(&mut self.vertex_faces[v2 as usize]);
        for f in moved {
            if !self.face_alive[f] {
                continue;
            }
            let face = &mut self.faces[f];
            if face.contains(&v1) {
                self.face_alive[f] = false;
                self.active_faces -= 1;
            } else {
                for idx in face.iter_mut() {
                    if *idx == v2 {
                        *idx = v1;
                    }
                }
                self.vertex_faces[v1 as usize].push(f);
            }
        }

        let alive = &self.face_alive;
        self.vertex_faces[v1 as usize].retain(|&f| alive[f]);
        self.vertex_alive[v2 as usize] = false;
        self.version[v1 as usize] += 1;
        self.version[v2 as usize] += 1;
    }

    fn into_mesh(self, source: &IndexedMesh) -> IndexedMesh {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut vertices = Vec::new();
        for (i, alive) in self.vertex_alive.iter().enumerate() {
            let referenced = self.vertex_faces[i].iter().any(|&f| self.face_alive[f]);
            if *alive && referenced {
                remap[i] = vertices.len() as u32;
                let mut v: Vertex = source.vertices[i];
                v.position = self.positions[i];
                vertices.push(v);
            }
        }

        // Collapses can fold two faces onto the same three vertices
        let mut corners = HashSet::new();
        let faces = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, alive)| **alive)
            .map(|(f, _)| f.map(|i| remap[i as usize]))
            .filter(|f| {
                let mut key = *f;
                key.sort_unstable();
                corners.insert(key)
            })
            .collect();

        IndexedMesh::from_parts(vertices, faces)
    }
}

/// Decimate a mesh using edge collapse with quadric error metrics.
///
/// Meshes already at or below the target, and meshes without faces, are
/// returned unchanged. Collapses that would create a non-manifold edge or
/// flip a face are skipped, so the target is a ceiling rather than an
/// exact count. When only flipping collapses remain above the target, the
/// orientation check is dropped for the rest of the run.
///
/// # Errors
///
/// Returns [`DecimateError::InvalidRatio`] for a ratio outside `[0, 1]`
/// and [`DecimateError::InvalidIndex`] when a face points past the vertex
/// array.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Point3};
/// use mesh_decimate::{decimate_mesh, DecimateParams};
///
/// // 8x8 flat grid, 128 triangles
/// let n = 8u32;
/// let mut positions = Vec::new();
/// for y in 0..=n {
///     for x in 0..=n {
///         positions.push(Point3::new(f64::from(x), f64::from(y), 1.0));
///     }
/// }
/// let mut faces = Vec::new();
/// for y in 0..n {
///     for x in 0..n {
///         let i = y * (n + 1) + x;
///         faces.push([i, i + 1, i + n + 2]);
///         faces.push([i, i + n + 2, i + n + 1]);
///     }
/// }
/// let grid = IndexedMesh::from_positions(positions, faces);
///
/// let result = decimate_mesh(&grid, &DecimateParams::with_target_triangles(40)).unwrap();
/// assert!(result.final_triangles <= 40);
/// ```
pub fn decimate_mesh(
    mesh: &IndexedMesh,
    params: &DecimateParams,
) -> DecimateResult<DecimationResult> {
    if params.target_triangles.is_none() && !(0.0..=1.0).contains(&params.target_ratio) {
        return Err(DecimateError::InvalidRatio(params.target_ratio));
    }
    let vertex_count = mesh.vertices.len();
    for (face, indices) in mesh.faces.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(DecimateError::InvalidIndex {
                face,
                index,
                vertex_count,
            });
        }
    }

    let original_triangles = mesh.faces.len();
    let target = params.target_for(original_triangles);

    if original_triangles == 0 || original_triangles <= target {
        return Ok(DecimationResult::unchanged(mesh.clone()));
    }

    info!(
        original = original_triangles,
        target = target,
        "Starting mesh decimation"
    );

    let mut ws = Workspace::new(mesh);
    let mut heap = ws.seed_heap(params);
    let mut check_flips = params.prevent_flips;

    let mut collapses_performed = 0;
    let mut collapses_rejected = 0;

    while ws.active_faces > target {
        let Some(collapse) = heap.pop() else {
            if check_flips && params.max_error.is_none() {
                // Out of candidates above budget: retry without the flip guard
                debug!(faces = ws.active_faces, target, "Relaxing orientation check");
                check_flips = false;
                heap = ws.seed_heap(params);
                continue;
            }
            break;
        };
        if !ws.is_current(&collapse) {
            continue;
        }
        let (v1, v2) = (collapse.v1, collapse.v2);

        if let Some(max_error) = params.max_error {
            if collapse.cost > max_error {
                break;
            }
        }

        if !ws.preserves_manifold(v1, v2)
            || (check_flips && !ws.preserves_orientation(v1, v2, &collapse.target))
        {
            collapses_rejected += 1;
            continue;
        }

        ws.collapse(v1, v2, collapse.target);
        collapses_performed += 1;

        for u in ws.neighbors(v1) {
            let (a, b) = if v1 < u { (v1, u) } else { (u, v1) };
            if let Some(c) = ws.candidate(a, b, params) {
                heap.push(c);
            }
        }
    }

    let decimated = ws.into_mesh(mesh);
    let final_triangles = decimated.faces.len();

    info!(
        final_triangles,
        collapses = collapses_performed,
        rejected = collapses_rejected,
        "Decimation complete"
    );
    debug!(
        vertices = decimated.vertices.len(),
        faces = decimated.faces.len(),
        "Built final decimated mesh"
    );

    Ok(DecimationResult {
        mesh: decimated,
        original_triangles,
        final_triangles,
        collapses_performed,
        collapses_rejected,
    })
}

/// Reduce a mesh to at most `budget` faces.
///
/// Skipped when the mesh already fits or has no faces. Boundary edges may
/// collapse but pay [`DecimateParams::boundary_penalty`].
///
/// # Errors
///
/// Returns [`DecimateError::InvalidIndex`] for malformed input and
/// [`DecimateError::BudgetNotReached`] when the link condition stops the
/// collapse loop above the budget.
pub fn decimate_to_budget(mesh: &IndexedMesh, budget: usize) -> DecimateResult<DecimationResult> {
    let result = decimate_mesh(mesh, &DecimateParams::with_target_triangles(budget))?;
    if result.final_triangles > budget {
        return Err(DecimateError::BudgetNotReached {
            target: budget,
            reached: result.final_triangles,
        });
    }
    Ok(result)
}

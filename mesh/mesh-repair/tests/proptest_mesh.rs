//! Property-based tests for mesh repair.
//!
//! These tests use proptest to generate random meshes and verify invariants.
//!
//! Run with: cargo test -p mesh-repair -- proptest

use hashbrown::HashSet;
use mesh_repair::{
    MeshAdjacency, RepairParams, remove_duplicate_vertices, repair_mesh, smooth_simple,
    validate_indices,
};
use mesh_types::{IndexedMesh, Vertex};
use proptest::prelude::*;

// =============================================================================
// Strategies for generating random meshes
// =============================================================================

/// Generate a vertex on a coarse lattice so exact duplicates actually occur.
fn arb_vertex() -> impl Strategy<Value = Vertex> {
    prop::array::uniform3(-4i32..4).prop_map(|[x, y, z]| {
        Vertex::from_coords(f64::from(x) * 0.5, f64::from(y) * 0.5, 1.0 + f64::from(z) * 0.25)
    })
}

/// Generate a mesh with the specified number of vertices and faces.
/// Ensures all face indices are valid.
fn arb_mesh(
    min_vertices: usize,
    max_vertices: usize,
    min_faces: usize,
    max_faces: usize,
) -> impl Strategy<Value = IndexedMesh> {
    (min_vertices..=max_vertices).prop_flat_map(move |num_vertices| {
        let vertices = prop::collection::vec(arb_vertex(), num_vertices);

        vertices.prop_flat_map(move |verts| {
            #[allow(clippy::cast_possible_truncation)]
            let n = verts.len() as u32;
            let face = prop::array::uniform3(0..n);
            let faces = prop::collection::vec(face, min_faces..=max_faces);

            faces.prop_map(move |f| IndexedMesh::from_parts(verts.clone(), f))
        })
    })
}

fn position_keys(mesh: &IndexedMesh) -> Vec<[u64; 3]> {
    mesh.vertices
        .iter()
        .map(|v| {
            let p = v.position;
            [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
        })
        .collect()
}

// =============================================================================
// Property Tests: Full Repair
// =============================================================================

proptest! {
    /// Repaired meshes only reference existing vertices.
    #[test]
    fn repair_produces_valid_indices(mesh in arb_mesh(3, 40, 1, 80)) {
        let mut repaired = mesh;
        let _ = repair_mesh(&mut repaired, &RepairParams::default());
        prop_assert!(validate_indices(&repaired).is_ok());
    }

    /// No two surviving vertices share a position.
    #[test]
    fn repair_leaves_unique_positions(mesh in arb_mesh(3, 40, 1, 80)) {
        let mut repaired = mesh;
        let _ = repair_mesh(&mut repaired, &RepairParams::default());
        let keys = position_keys(&repaired);
        let unique: HashSet<[u64; 3]> = keys.iter().copied().collect();
        prop_assert_eq!(unique.len(), keys.len());
    }

    /// Every edge ends up with at most two faces.
    #[test]
    fn repair_leaves_manifold_edges(mesh in arb_mesh(3, 40, 1, 80)) {
        let mut repaired = mesh;
        let _ = repair_mesh(&mut repaired, &RepairParams::default());
        prop_assert!(MeshAdjacency::build(&repaired.faces).is_manifold());
    }

    /// Repair never adds geometry.
    #[test]
    fn repair_only_removes(mesh in arb_mesh(3, 40, 1, 80)) {
        let (v, f) = (mesh.vertices.len(), mesh.faces.len());
        let mut repaired = mesh;
        let summary = repair_mesh(&mut repaired, &RepairParams::default());
        prop_assert!(repaired.vertices.len() <= v);
        prop_assert!(repaired.faces.len() <= f);
        prop_assert_eq!(summary.final_faces, repaired.faces.len());
    }

    /// A second repair finds nothing left to do.
    #[test]
    fn repair_is_idempotent(mesh in arb_mesh(3, 40, 1, 80)) {
        let mut repaired = mesh;
        let _ = repair_mesh(&mut repaired, &RepairParams::default());
        let again = repair_mesh(&mut repaired, &RepairParams::default());
        prop_assert!(!again.had_changes(), "{}", again);
    }
}

// =============================================================================
// Property Tests: Individual operations
// =============================================================================

proptest! {
    /// Merging exact duplicates keeps every distinct position.
    #[test]
    fn duplicate_merge_keeps_distinct_positions(mesh in arb_mesh(3, 40, 0, 40)) {
        let before: HashSet<[u64; 3]> = position_keys(&mesh).into_iter().collect();
        let mut merged = mesh;
        remove_duplicate_vertices(&mut merged);
        let after: HashSet<[u64; 3]> = position_keys(&merged).into_iter().collect();
        prop_assert_eq!(before, after);
    }

    /// Smoothing never changes topology and keeps coordinates finite.
    #[test]
    fn smoothing_preserves_topology(mesh in arb_mesh(3, 40, 1, 80)) {
        let mut smoothed = mesh.clone();
        smooth_simple(&mut smoothed, 2);
        prop_assert_eq!(&smoothed.faces, &mesh.faces);
        prop_assert!(smoothed.vertices.iter().all(|v| v.position.coords.iter().all(|c| c.is_finite())));
    }
}

//! Mesh repair operations for reconstructed surfaces.
//!
//! Iso-surface extraction leaves artifacts that break downstream consumers:
//! surface extrapolated past the data, slivers, doubled faces, coincident
//! vertices and edges shared by more than two triangles. This crate removes
//! them in a fixed order and finishes the surface with light smoothing and
//! vertex normals.
//!
//! - [`crop_to_aabb`] - Drop geometry outside the sampled region
//! - [`remove_degenerate_triangles`] - Repeated indices or zero area
//! - [`remove_duplicate_faces`] - Same vertex set, any winding
//! - [`remove_duplicate_vertices`] - Exact-position merge with face remap
//! - [`remove_non_manifold_edges`] - Trim faces until every edge has at most two
//! - [`smooth_simple`] - Uniform neighbour averaging
//! - [`compute_vertex_normals`] - Area-weighted vertex normals
//!
//! # Example
//!
//! ```
//! use mesh_types::{IndexedMesh, Vertex};
//! use mesh_repair::{repair_mesh, RepairParams};
//!
//! let mut mesh = IndexedMesh::new();
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 1.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 1.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 1.0)); // coincident with 1
//! mesh.faces.push([0, 1, 2]);
//! mesh.faces.push([0, 3, 2]); // same triangle after the merge
//!
//! let summary = repair_mesh(&mut mesh, &RepairParams::default());
//! assert_eq!(summary.vertices_merged, 1);
//! assert_eq!(mesh.faces.len(), 1);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod adjacency;
mod error;
mod normals;
mod repair;
mod smooth;

pub use adjacency::MeshAdjacency;
pub use error::{RepairError, RepairResult};
pub use normals::compute_vertex_normals;
pub use repair::{
    RepairParams, RepairSummary, crop_to_aabb, remove_degenerate_triangles,
    remove_duplicate_faces, remove_duplicate_vertices, remove_non_manifold_edges,
    remove_unreferenced_vertices, repair_mesh, validate_indices,
};
pub use smooth::smooth_simple;

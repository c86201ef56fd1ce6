//! Mesh simplification using quadric error metrics.
//!
//! Iteratively collapses the edge whose merged vertex has the lowest
//! quadric error until the mesh fits a triangle budget.
//!
//! # Features
//!
//! - **Budget control**: Target by triangle count or ratio, skipped when the
//!   mesh already fits
//! - **Local updates**: Per-vertex face lists keep each collapse proportional
//!   to the size of the surrounding ring
//! - **Topology guards**: Collapses that break the link condition or flip a
//!   face are rejected
//! - **Boundary handling**: Boundary edges pay a cost penalty, or are frozen
//!   entirely with `preserve_boundary`
//!
//! # Example
//!
//! ```
//! use mesh_types::{IndexedMesh, Point3};
//! use mesh_decimate::decimate_to_budget;
//!
//! let mesh = IndexedMesh::from_positions(
//!     vec![
//!         Point3::new(0.0, 0.0, 1.0),
//!         Point3::new(1.0, 0.0, 1.0),
//!         Point3::new(0.0, 1.0, 1.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//!
//! // Already under budget: returned as-is
//! let result = decimate_to_budget(&mesh, 150_000).unwrap();
//! assert!(!result.was_decimated());
//! println!("{result}");
//! ```
//!
//! # Algorithm
//!
//! 1. For each vertex, sum the plane quadrics of its adjacent faces
//! 2. For each edge, find the position minimising the summed quadric
//! 3. Pop the cheapest edge, check topology, merge the two vertices
//! 4. Recompute candidates for the edges around the merged vertex

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod decimate;
mod error;
mod params;
mod quadric;
mod result;

// Re-export main types and functions
pub use decimate::{decimate_mesh, decimate_to_budget};
pub use error::{DecimateError, DecimateResult};
pub use params::DecimateParams;
pub use quadric::Quadric;
pub use result::DecimationResult;

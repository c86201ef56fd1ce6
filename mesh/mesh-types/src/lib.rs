//! Core mesh types for the photo-to-mesh pipeline.
//!
//! This crate provides the foundational types shared by every stage:
//!
//! - [`Vertex`] - A point in 3D space with an optional normal and UV
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//! - [`Triangle`] - A concrete triangle with vertex positions
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`MeshStats`] - Vertex/face counts and bounds of a finished mesh
//!
//! # Coordinate System
//!
//! Meshes produced from photographs live in **camera space**:
//! - X: image right
//! - Y: image down
//! - Z: forward, away from the camera
//!
//! Face winding is **counter-clockwise (CCW) when viewed from the front**.
//! Normals follow the right-hand rule.
//!
//! # Example
//!
//! ```
//! use mesh_types::{Vertex, IndexedMesh, Point3, MeshTopology};
//!
//! let mut mesh = IndexedMesh::new();
//! mesh.vertices.push(Vertex::new(Point3::new(0.0, 0.0, 1.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(1.0, 0.0, 1.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(0.5, 1.0, 1.0)));
//! mesh.faces.push([0, 1, 2]);
//!
//! assert_eq!(mesh.face_count(), 1);
//! assert!(!mesh.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
mod stats;
mod traits;
mod triangle;
mod vertex;

// Re-export core types
pub use bounds::Aabb;
pub use mesh::{AttributeLengthError, IndexedMesh};
pub use stats::{BoundingBox, MeshStats};
pub use traits::{MeshBounds, MeshTopology};
pub use triangle::Triangle;
pub use vertex::{Uv, Vertex, VertexAttributes};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

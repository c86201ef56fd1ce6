//! Surface reconstruction from oriented point clouds.
//!
//! - **Poisson** - Solves for an indicator function whose gradient matches
//!   the sample normals and extracts its level set
//! - **Density trim** - Drops surface regions supported by few samples
//!
//! # Quick Start
//!
//! ```
//! use mesh_scan::pointcloud::PointCloud;
//! use mesh_scan::reconstruct::{reconstruct_poisson, remove_low_density_vertices, PoissonParams};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut cloud = PointCloud::new();
//! for i in 0..30 {
//!     for j in 0..60 {
//!         let theta = std::f64::consts::PI * (f64::from(i) + 0.5) / 30.0;
//!         let phi = std::f64::consts::TAU * f64::from(j) / 60.0;
//!         let n = Vector3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
//!         cloud.add_point_with_normal(Point3::from(n), n);
//!     }
//! }
//!
//! let params = PoissonParams::default().with_depth(5).with_full_depth(4);
//! let mut result = reconstruct_poisson(&cloud, &params).unwrap();
//! let removed = remove_low_density_vertices(&mut result.mesh, &result.densities, 0.02).unwrap();
//! println!("{} ({removed} sparse vertices trimmed)", result);
//! ```
//!
//! # Workflow
//!
//! 1. **Prepare**: every point needs an oriented normal
//!    (see [`crate::cleanup::clean_point_cloud`])
//! 2. **Reconstruct**: [`reconstruct_poisson`] returns the mesh and one
//!    density per vertex
//! 3. **Trim** (optional): [`remove_low_density_vertices`] cuts the
//!    extrapolated surface far from any sample

mod grid;
pub mod poisson;
mod solver;
mod surface_nets;

pub use poisson::{LevelStats, MAX_DEPTH, MAX_FULL_DEPTH, PoissonParams, PoissonResult, reconstruct_poisson};

use mesh_types::IndexedMesh;
use tracing::debug;

use crate::error::{ScanError, ScanResult};

/// Removes vertices whose density falls below the given quantile.
///
/// The threshold is the density at rank `floor(quantile * (n - 1))` of the
/// sorted densities. Every face touching a vertex below it is dropped, then
/// vertices no face references are removed. Returns the number of vertices
/// removed.
///
/// A quantile of 0 keeps every face.
///
/// # Errors
///
/// - [`ScanError::DensityMismatch`] if `densities` is not parallel to the
///   mesh vertices
/// - [`ScanError::InvalidParameter`] if `quantile` is outside `[0, 1]`
///
/// # Example
///
/// ```
/// use mesh_scan::reconstruct::remove_low_density_vertices;
/// use mesh_types::{IndexedMesh, Vertex};
///
/// let mut mesh = IndexedMesh::new();
/// for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
///     mesh.vertices.push(Vertex::from_coords(x, y, 0.0));
/// }
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([1, 3, 2]);
///
/// let removed = remove_low_density_vertices(&mut mesh, &[5.0, 5.0, 5.0, 0.1], 0.5).unwrap();
/// assert_eq!(removed, 1);
/// assert_eq!(mesh.faces.len(), 1);
/// ```
pub fn remove_low_density_vertices(
    mesh: &mut IndexedMesh,
    densities: &[f64],
    quantile: f64,
) -> ScanResult<usize> {
    if densities.len() != mesh.vertices.len() {
        return Err(ScanError::DensityMismatch {
            densities: densities.len(),
            vertices: mesh.vertices.len(),
        });
    }
    if !(quantile.is_finite() && (0.0..=1.0).contains(&quantile)) {
        return Err(ScanError::InvalidParameter {
            reason: format!("density quantile must be in [0, 1], got {quantile}"),
        });
    }
    if densities.is_empty() {
        return Ok(0);
    }

    let mut sorted = densities.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    // Rank is within 0..n by construction
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let rank = (quantile * (sorted.len() - 1) as f64).floor() as usize;
    let threshold = sorted[rank.min(sorted.len() - 1)];

    let faces_before = mesh.faces.len();
    mesh.faces
        .retain(|f| f.iter().all(|&v| densities[v as usize] >= threshold));
    let faces_removed = faces_before - mesh.faces.len();

    let vertices_removed = mesh_repair::remove_unreferenced_vertices(mesh);
    debug!(
        threshold,
        faces_removed, vertices_removed, "Trimmed low-density surface"
    );
    Ok(vertices_removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mesh_types::Vertex;

    /// Strip of `n` quads along x, densities rising with x.
    fn strip(n: u32) -> (IndexedMesh, Vec<f64>) {
        let mut mesh = IndexedMesh::new();
        let mut densities = Vec::new();
        for i in 0..=n {
            for y in [0.0, 1.0] {
                mesh.vertices.push(Vertex::from_coords(f64::from(i), y, 0.0));
                densities.push(f64::from(i));
            }
        }
        for i in 0..n {
            let a = 2 * i;
            mesh.faces.push([a, a + 2, a + 1]);
            mesh.faces.push([a + 1, a + 2, a + 3]);
        }
        (mesh, densities)
    }

    #[test]
    fn test_zero_quantile_keeps_everything() {
        let (mut mesh, densities) = strip(4);
        let removed = remove_low_density_vertices(&mut mesh, &densities, 0.0).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(mesh.faces.len(), 8);
    }

    #[test]
    fn test_trims_sparse_end() {
        let (mut mesh, densities) = strip(4);
        // 10 densities 0,0,1,1,...,4,4: rank floor(0.3 * 9) = 2 gives threshold 1
        let removed = remove_low_density_vertices(&mut mesh, &densities, 0.3).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(mesh.faces.len(), 6);
        assert!(mesh.vertices.iter().all(|v| v.position.x >= 1.0));
        assert!(mesh.has_valid_indices());
    }

    #[test]
    fn test_full_quantile_keeps_only_densest() {
        let (mut mesh, densities) = strip(3);
        remove_low_density_vertices(&mut mesh, &densities, 1.0).unwrap();
        assert!(mesh.faces.is_empty());
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn test_mismatched_densities() {
        let (mut mesh, _) = strip(2);
        let err = remove_low_density_vertices(&mut mesh, &[1.0], 0.1).unwrap_err();
        assert!(matches!(err, ScanError::DensityMismatch { densities: 1, vertices: 6 }));
    }

    #[test]
    fn test_invalid_quantile() {
        let (mut mesh, densities) = strip(2);
        for q in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                remove_low_density_vertices(&mut mesh, &densities, q),
                Err(ScanError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_empty_mesh() {
        let mut mesh = IndexedMesh::new();
        assert_eq!(remove_low_density_vertices(&mut mesh, &[], 0.5).unwrap(), 0);
    }
}

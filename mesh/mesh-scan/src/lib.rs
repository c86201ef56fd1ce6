//! Point-cloud processing and surface reconstruction.
//!
//! This crate turns a raw, camera-space point cloud into a triangle mesh:
//!
//! - **Point Cloud** - Point storage, voxel downsampling and normal estimation
//! - **Cleanup** - Downsample, remove outliers, estimate and orient normals
//! - **Reconstruction** - Poisson surface reconstruction with per-vertex
//!   sample densities
//!
//! # Quick Start
//!
//! ```
//! use mesh_scan::cleanup::{clean_point_cloud, CloudCleanupParams};
//! use mesh_scan::pointcloud::PointCloud;
//! use mesh_scan::reconstruct::{reconstruct_poisson, PoissonParams};
//! use nalgebra::Point3;
//!
//! // A bumpy sheet two units in front of the camera
//! let positions: Vec<_> = (0..80)
//!     .flat_map(|i| {
//!         (0..80).map(move |j| {
//!             let (x, y) = (f64::from(i) * 0.01 - 0.4, f64::from(j) * 0.01 - 0.4);
//!             Point3::new(x, y, 2.0 + 0.05 * (x * 8.0).sin())
//!         })
//!     })
//!     .collect();
//! let cloud = PointCloud::from_positions(&positions);
//!
//! let cleaned = clean_point_cloud(&cloud, &CloudCleanupParams::default()).unwrap();
//! let params = PoissonParams::default().with_depth(5).with_full_depth(4);
//! let result = reconstruct_poisson(&cleaned.cloud, &params).unwrap();
//! println!("{}", result);
//! ```
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pointcloud`] | Point cloud data structure, downsampling, normals |
//! | [`cleanup`] | Cloud cleanup ahead of reconstruction |
//! | [`reconstruct`] | Poisson reconstruction and density trimming |

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)] // Not all functions benefit from const
#![allow(clippy::cast_precision_loss)] // Expected when converting counts to f64
#![allow(clippy::many_single_char_names)] // Math variables (x, r, p, h) read best short

pub mod cleanup;
pub mod error;
pub mod pointcloud;
pub mod reconstruct;

// Re-export main types at crate root for convenience
pub use cleanup::{CloudCleanupParams, CloudCleanupResult, clean_point_cloud};
pub use error::{ScanError, ScanResult};
pub use pointcloud::normals::NormalEstimationParams;
pub use pointcloud::{CloudPoint, PointCloud};
pub use reconstruct::{
    PoissonParams, PoissonResult, reconstruct_poisson, remove_low_density_vertices,
};

//! Single photograph to textured 3D mesh.
//!
//! This crate wires the mesh family together into one pipeline:
//!
//! ```text
//! image ─► depth ─► point cloud ─► Poisson surface ─► repaired mesh ─► UVs ─► OBJ/GLB
//! ```
//!
//! - [`run_single_image`] decodes an image file and asks a
//!   [`DepthEstimator`](mesh_depth::DepthEstimator) for depth
//! - [`run_with_images`] starts from an image and its raw depth
//! - [`reconstruct`] is the in-memory core, with no file I/O
//! - [`run_with_timeout`] bounds a run by wall-clock time; the `_cancellable`
//!   variants stop before writing once its [`Cancellation`] is raised
//!
//! All parameters live in [`PipelineConfig`], which can be loaded from JSON.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mesh_depth::{DepthFileLoader, Device, FallbackEstimator};
//! use mesh_photo::{PipelineConfig, run_single_image};
//!
//! let config = PipelineConfig::default();
//! let estimator = FallbackEstimator::new(DepthFileLoader::new("depth.png"), Device::Cpu);
//! let output = run_single_image(Path::new("photo.jpg"), Path::new("out"), &config, &estimator)
//!     .unwrap();
//! println!("{}", output.stats);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod pipeline;
mod timeout;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    PipelineOutput, Reconstruction, SUPPORTED_EXTENSIONS, load_image, reconstruct,
    run_single_image, run_single_image_cancellable, run_with_images, run_with_images_cancellable,
};
pub use timeout::{Cancellation, run_with_timeout};

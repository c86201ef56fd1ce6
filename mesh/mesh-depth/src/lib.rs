//! Monocular depth to camera-space geometry.
//!
//! This crate covers everything between a photograph and a point cloud:
//!
//! - [`Intrinsics`] inferred from the image size
//! - [`DepthMap`], a row-major depth buffer aligned with the image
//! - [`postprocess_depth`]: min-max normalisation plus a bilateral filter
//! - [`backproject`]: pixels to camera-space points
//! - [`project_uvs`]: camera-space vertices back to texture coordinates
//! - The [`DepthModel`] / [`ModelLoader`] / [`DepthEstimator`] boundary,
//!   with [`FallbackEstimator`] trying networks in priority order
//!
//! The networks themselves run elsewhere. [`DepthFileLoader`] serves a
//! depth image produced by one.
//!
//! # Example
//!
//! ```
//! use mesh_depth::{
//!     BackprojectParams, DepthMap, Intrinsics, PostprocessParams, backproject,
//!     postprocess_depth,
//! };
//!
//! let raw = DepthMap::from_fn(32, 24, |x, y| (x + y) as f32).unwrap();
//! let depth = postprocess_depth(&raw, &PostprocessParams::default()).unwrap();
//! let k = Intrinsics::infer(32, 24, None);
//! let cloud = backproject(&depth, &k, &BackprojectParams::default());
//! assert!(!cloud.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]

mod backproject;
mod depth;
mod error;
mod intrinsics;
pub mod model;
mod postprocess;
mod source;
mod uv;

pub use backproject::{BackprojectParams, backproject};
pub use depth::DepthMap;
pub use error::{DepthError, DepthResult};
pub use intrinsics::{DEFAULT_FOCAL_FACTOR, Intrinsics, PROJECTION_EPSILON};
pub use model::{
    DepthEstimate, DepthEstimator, DepthModel, Device, FallbackEstimator, InputTransform,
    ModelLoader, ModelVariant, PreparedInput, VariantFailure,
};
pub use postprocess::{
    BilateralParams, NORMALIZE_EPSILON, PostprocessParams, bilateral_filter_depth,
    normalize_depth, postprocess_depth,
};
pub use source::{DepthFileLoader, MockDepth, load_depth_image};
pub use uv::project_uvs;

//! Error types for depth processing.

use thiserror::Error;

use crate::model::VariantFailure;

/// Result type for depth operations.
pub type DepthResult<T> = Result<T, DepthError>;

/// Errors that can occur while producing or processing depth.
#[derive(Debug, Error)]
pub enum DepthError {
    /// Buffer length does not match `width * height`.
    #[error("depth buffer has {actual} values, expected {expected} ({width}x{height})")]
    ShapeMismatch {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// `width * height`.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },

    /// Width or height is zero.
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// A depth model could not be loaded.
    #[error("failed to load depth model: {reason}")]
    ModelLoad {
        /// Description of the failure.
        reason: String,
    },

    /// A loaded model failed to predict.
    #[error("depth inference failed: {reason}")]
    Inference {
        /// Description of the failure.
        reason: String,
    },

    /// Every model variant failed, in priority order.
    #[error("all depth model variants failed: {}", format_failures(.0))]
    AllVariantsFailed(Vec<VariantFailure>),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

fn format_failures(failures: &[VariantFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

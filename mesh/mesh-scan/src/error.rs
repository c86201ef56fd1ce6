//! Error types for scan processing operations.

use thiserror::Error;

/// Result type for scan processing operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur during scan processing.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Point cloud is empty.
    #[error("point cloud is empty")]
    EmptyPointCloud,

    /// Not enough points for the requested operation.
    #[error("insufficient points: need at least {required}, got {actual}")]
    InsufficientPoints {
        /// Minimum number of points required.
        required: usize,
        /// Actual number of points provided.
        actual: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// An operation needed oriented normals on every point.
    #[error("point cloud has no normals ({missing} of {total} points missing)")]
    MissingNormals {
        /// Points without a normal.
        missing: usize,
        /// Total points in the cloud.
        total: usize,
    },

    /// Surface reconstruction failed.
    #[error("reconstruction failed: {reason}")]
    ReconstructionFailed {
        /// Description of why reconstruction failed.
        reason: String,
    },

    /// Densities do not line up with the mesh vertices.
    #[error("density count {densities} does not match vertex count {vertices}")]
    DensityMismatch {
        /// Number of density values supplied.
        densities: usize,
        /// Number of mesh vertices.
        vertices: usize,
    },
}

//! Error types for mesh decimation operations.

use thiserror::Error;

/// Errors that can occur during decimation operations.
#[derive(Debug, Error)]
pub enum DecimateError {
    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index}, mesh has {vertex_count} vertices")]
    InvalidIndex {
        /// Offending face.
        face: usize,
        /// The out-of-range index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// Collapsing stopped with more faces than the target allows.
    #[error("decimation stopped at {reached} triangles, target was {target}")]
    BudgetNotReached {
        /// Requested triangle ceiling.
        target: usize,
        /// Triangles left when no legal collapse remained.
        reached: usize,
    },

    /// Invalid target ratio.
    #[error("invalid target ratio: {0} (must be between 0.0 and 1.0)")]
    InvalidRatio(f64),
}

/// Result type for decimation operations.
pub type DecimateResult<T> = std::result::Result<T, DecimateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DecimateError::InvalidRatio(1.5);
        assert!(format!("{err}").contains("1.5"));

        let err = DecimateError::InvalidIndex {
            face: 2,
            index: 9,
            vertex_count: 4,
        };
        assert_eq!(
            err.to_string(),
            "face 2 references vertex 9, mesh has 4 vertices"
        );

        let err = DecimateError::BudgetNotReached {
            target: 10,
            reached: 12,
        };
        assert_eq!(err.to_string(), "decimation stopped at 12 triangles, target was 10");
    }
}

//! Error types for the photo pipeline.

use std::path::PathBuf;

use mesh_decimate::DecimateError;
use mesh_depth::{DepthError, VariantFailure};
use mesh_io::IoError;
use mesh_scan::ScanError;
use mesh_types::AttributeLengthError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can end a reconstruction run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input image is missing, undecodable, unsupported or empty.
    #[error("cannot use input {}: {reason}", path.display())]
    Input {
        /// Path of the input.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// No depth model variant could produce depth.
    #[error("no depth model available: {}", format_failures(failures))]
    ModelUnavailable {
        /// One entry per variant, in the order they were tried.
        failures: Vec<VariantFailure>,
    },

    /// A stage produced no points or no triangles.
    #[error("degenerate geometry after {stage}")]
    DegenerateGeometry {
        /// Stage that came up empty.
        stage: &'static str,
    },

    /// The run exceeded its wall-clock limit.
    #[error("pipeline exceeded the {seconds} s time limit")]
    Timeout {
        /// The limit that was exceeded.
        seconds: f64,
    },

    /// The run was cancelled before its outputs were written.
    #[error("pipeline run cancelled")]
    Cancelled,

    /// The worker running the pipeline stopped without a result.
    #[error("pipeline worker stopped without a result")]
    WorkerLost,

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// Depth processing error other than model unavailability.
    #[error("depth error: {0}")]
    Depth(DepthError),

    /// Point-cloud or surface reconstruction error.
    #[error("reconstruction error: {0}")]
    Reconstruction(#[from] ScanError),

    /// Decimation error.
    #[error("decimation error: {0}")]
    Decimation(#[from] DecimateError),

    /// Texture coordinates did not match the mesh.
    #[error("texture coordinate error: {0}")]
    Attribute(#[from] AttributeLengthError),

    /// Export error.
    #[error("export error: {0}")]
    Io(#[from] IoError),
}

impl From<DepthError> for PipelineError {
    fn from(e: DepthError) -> Self {
        match e {
            DepthError::AllVariantsFailed(failures) => Self::ModelUnavailable { failures },
            other => Self::Depth(other),
        }
    }
}

impl PipelineError {
    /// Create an [`PipelineError::Input`] error.
    #[must_use]
    pub fn input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure came from empty geometry.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateGeometry { .. })
    }
}

fn format_failures(failures: &[VariantFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_depth::ModelVariant;

    #[test]
    fn all_variants_failed_becomes_model_unavailable() {
        let err = PipelineError::from(DepthError::AllVariantsFailed(vec![VariantFailure {
            variant: ModelVariant::Fast,
            reason: "no weights".into(),
        }]));
        assert!(matches!(err, PipelineError::ModelUnavailable { ref failures } if failures.len() == 1));
        assert_eq!(err.to_string(), "no depth model available: MiDaS_small: no weights");
    }

    #[test]
    fn other_depth_errors_stay_depth() {
        let err = PipelineError::from(DepthError::InvalidDimensions {
            width: 0,
            height: 3,
        });
        assert!(matches!(err, PipelineError::Depth(_)));
    }

    #[test]
    fn messages() {
        let err = PipelineError::input("a.gif", "unsupported extension");
        assert_eq!(err.to_string(), "cannot use input a.gif: unsupported extension");

        let err = PipelineError::DegenerateGeometry {
            stage: "back-projection",
        };
        assert!(err.is_degenerate());
        assert_eq!(err.to_string(), "degenerate geometry after back-projection");

        let err = PipelineError::Timeout { seconds: 120.0 };
        assert_eq!(err.to_string(), "pipeline exceeded the 120 s time limit");
    }
}

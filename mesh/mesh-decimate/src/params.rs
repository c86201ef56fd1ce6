//! Parameters for mesh decimation.

/// Parameters for mesh decimation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecimateParams {
    /// Target number of triangles. If None, uses `target_ratio` instead.
    pub target_triangles: Option<usize>,

    /// Target ratio of triangles to keep (0.0 to 1.0). Default: 0.5
    pub target_ratio: f64,

    /// Whether boundary edges (one adjacent face) are never collapsed.
    /// Default: false
    pub preserve_boundary: bool,

    /// Cost multiplier for boundary edges when they may collapse.
    /// Higher values keep the silhouette longer. Default: 10.0
    pub boundary_penalty: f64,

    /// Reject collapses that turn any surrounding face by more than 90°.
    /// Default: true
    pub prevent_flips: bool,

    /// Maximum quadric error allowed for a collapse. If None, no limit.
    pub max_error: Option<f64>,
}

impl Default for DecimateParams {
    fn default() -> Self {
        Self {
            target_triangles: None,
            target_ratio: 0.5,
            preserve_boundary: false,
            boundary_penalty: 10.0,
            prevent_flips: true,
            max_error: None,
        }
    }
}

impl DecimateParams {
    /// Face budget used by the photo pipeline.
    pub const DEFAULT_BUDGET: usize = 150_000;

    /// Create params targeting a specific triangle count.
    #[must_use]
    pub fn with_target_triangles(count: usize) -> Self {
        Self {
            target_triangles: Some(count),
            ..Default::default()
        }
    }

    /// Create params targeting a ratio of original triangles.
    ///
    /// Out-of-range ratios are rejected by [`decimate_mesh`](crate::decimate_mesh).
    #[must_use]
    pub fn with_target_ratio(ratio: f64) -> Self {
        Self {
            target_ratio: ratio,
            ..Default::default()
        }
    }

    /// Set preserve boundary option.
    #[must_use]
    pub const fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Set the boundary cost multiplier.
    #[must_use]
    pub const fn with_boundary_penalty(mut self, penalty: f64) -> Self {
        self.boundary_penalty = penalty;
        self
    }

    /// Set maximum error threshold.
    #[must_use]
    pub const fn with_max_error(mut self, max_error: f64) -> Self {
        self.max_error = Some(max_error);
        self
    }

    /// Resolve the target face count for a mesh with `faces` triangles.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn target_for(&self, faces: usize) -> usize {
        self.target_triangles
            .unwrap_or_else(|| ((faces as f64) * self.target_ratio).ceil() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = DecimateParams::default();
        assert!((params.target_ratio - 0.5).abs() < 0.001);
        assert!(!params.preserve_boundary);
        assert!(params.prevent_flips);
    }

    #[test]
    fn explicit_count_wins_over_ratio() {
        let params = DecimateParams::with_target_triangles(1000);
        assert_eq!(params.target_triangles, Some(1000));
        assert_eq!(params.target_for(50_000), 1000);
    }

    #[test]
    fn ratio_target_rounds_up() {
        let params = DecimateParams::with_target_ratio(0.3);
        assert_eq!(params.target_for(10), 3);
        assert_eq!(params.target_for(11), 4);
    }

    #[test]
    fn builder() {
        let params = DecimateParams::default()
            .with_preserve_boundary(true)
            .with_boundary_penalty(2.0)
            .with_max_error(0.01);

        assert!(params.preserve_boundary);
        assert!((params.boundary_penalty - 2.0).abs() < f64::EPSILON);
        assert_eq!(params.max_error, Some(0.01));
    }
}

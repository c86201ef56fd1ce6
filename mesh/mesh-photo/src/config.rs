//! Pipeline configuration.
//!
//! [`PipelineConfig`] gathers the parameters of every stage. Every field has
//! a default, so a JSON file only needs the values it changes:
//!
//! ```json
//! {
//!   "focal": 900.0,
//!   "poisson": { "depth": 9 },
//!   "max_triangles": 50000
//! }
//! ```

use std::path::Path;

use mesh_decimate::DecimateParams;
use mesh_depth::{BackprojectParams, Device, PostprocessParams};
use mesh_repair::RepairParams;
use mesh_scan::{CloudCleanupParams, PoissonParams};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Settings for a single-image reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Focal length in pixels. `None` infers it from the image size.
    pub focal: Option<f64>,

    /// Device for depth inference. Default: CPU.
    pub device: Device,

    /// Depth normalisation and smoothing.
    pub postprocess: PostprocessParams,

    /// Depth to point-cloud conversion.
    pub backproject: BackprojectParams,

    /// Downsampling, outlier removal and normal estimation.
    pub cleanup: CloudCleanupParams,

    /// Surface reconstruction.
    pub poisson: PoissonParams,

    /// Drop vertices below this density quantile right after Poisson.
    /// Default: disabled.
    pub density_quantile: Option<f64>,

    /// Mesh cleanup after cropping.
    pub repair: RepairParams,

    /// Umbrella smoothing passes after repair. Default: 1.
    pub smooth_iterations: u32,

    /// Triangle budget for decimation. Default: 150 000.
    pub max_triangles: usize,

    /// Wall-clock limit for a whole run, in seconds. Default: 120.
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            focal: None,
            device: Device::Cpu,
            postprocess: PostprocessParams::default(),
            backproject: BackprojectParams::default(),
            cleanup: CloudCleanupParams::default(),
            poisson: PoissonParams::default(),
            density_quantile: None,
            repair: RepairParams::default(),
            smooth_iterations: 1,
            max_triangles: DecimateParams::DEFAULT_BUDGET,
            timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from a JSON file. Missing fields keep defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the file cannot be read or parsed,
    /// or if the values fail [`PipelineConfig::validate`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] on malformed JSON or invalid values.
    pub fn from_json(text: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| PipelineError::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the focal length override.
    #[must_use]
    pub const fn with_focal(mut self, focal: f64) -> Self {
        self.focal = Some(focal);
        self
    }

    /// Sets the inference device.
    #[must_use]
    pub const fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Sets the finest Poisson depth.
    #[must_use]
    pub fn with_poisson_depth(mut self, depth: u32) -> Self {
        self.poisson = self.poisson.with_depth(depth);
        self
    }

    /// Sets the decimation budget.
    #[must_use]
    pub const fn with_max_triangles(mut self, max_triangles: usize) -> Self {
        self.max_triangles = max_triangles;
        self
    }

    /// Enables the low-density trim at the given quantile.
    #[must_use]
    pub const fn with_density_quantile(mut self, quantile: f64) -> Self {
        self.density_quantile = Some(quantile);
        self
    }

    /// Sets the cleanup voxel size.
    #[must_use]
    pub fn with_voxel_size(mut self, voxel_size: f64) -> Self {
        self.cleanup = self.cleanup.with_voxel_size(voxel_size);
        self
    }

    /// Check values that would otherwise fail deep inside a stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] describing the first bad value.
    pub fn validate(&self) -> PipelineResult<()> {
        let fail = |reason: String| Err(PipelineError::Config { reason });
        if let Some(focal) = self.focal {
            if !(focal.is_finite() && focal > 0.0) {
                return fail(format!("focal must be positive, got {focal}"));
            }
        }
        if !(self.cleanup.voxel_size.is_finite() && self.cleanup.voxel_size > 0.0) {
            return fail(format!(
                "voxel_size must be positive, got {}",
                self.cleanup.voxel_size
            ));
        }
        if let Some(q) = self.density_quantile {
            if !(0.0..=1.0).contains(&q) {
                return fail(format!("density_quantile must be in [0, 1], got {q}"));
            }
        }
        if self.max_triangles == 0 {
            return fail("max_triangles must be greater than 0".to_string());
        }
        if self.timeout_secs == 0 {
            return fail("timeout_secs must be greater than 0".to_string());
        }
        self.poisson.validate().map_err(|e| PipelineError::Config {
            reason: e.to_string(),
        })?;
        if let Some(bilateral) = &self.postprocess.bilateral {
            bilateral.validate().map_err(|e| PipelineError::Config {
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.focal, None);
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.poisson.depth, 8);
        assert_eq!(config.max_triangles, 150_000);
        assert_eq!(config.smooth_iterations, 1);
        assert_eq!(config.timeout_secs, 120);
        assert!(config.density_quantile.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{ "focal": 900.0, "device": "gpu:1", "poisson": { "depth": 9 } }"#,
        )
        .unwrap();
        assert_eq!(config.focal, Some(900.0));
        assert_eq!(config.device, Device::Gpu(1));
        assert_eq!(config.poisson.depth, 9);
        assert_eq!(config.poisson.full_depth, 5);
        assert_eq!(config.backproject.depth_scale, 3.0);
        assert_eq!(config.max_triangles, 150_000);
    }

    #[test]
    fn json_round_trip() {
        let config = PipelineConfig::default()
            .with_focal(512.0)
            .with_density_quantile(0.05)
            .with_max_triangles(1000);
        let text = serde_json::to_string(&config).unwrap();
        let back = PipelineConfig::from_json(&text).unwrap();
        assert_eq!(back.focal, Some(512.0));
        assert_eq!(back.density_quantile, Some(0.05));
        assert_eq!(back.max_triangles, 1000);
        assert!(text.contains("\"device\":\"cpu\""));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(PipelineConfig::default().with_focal(-1.0).validate().is_err());
        assert!(PipelineConfig::default().with_max_triangles(0).validate().is_err());
        assert!(PipelineConfig::default().with_density_quantile(1.5).validate().is_err());
        assert!(PipelineConfig::default().with_poisson_depth(0).validate().is_err());
        assert!(PipelineConfig::default().with_voxel_size(0.0).validate().is_err());
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            PipelineConfig::from_json("{ not json"),
            Err(PipelineError::Config { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json(r#"{ "device": "tpu" }"#),
            Err(PipelineError::Config { .. })
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            PipelineConfig::from_json_file("no_such_config.json"),
            Err(PipelineError::Config { .. })
        ));
    }
}

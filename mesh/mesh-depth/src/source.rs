//! Depth sources that need no network runtime.
//!
//! [`DepthFileLoader`] serves a depth image computed elsewhere, for every
//! variant. [`MockDepth`] returns a fixed map and is meant for tests.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::depth::DepthMap;
use crate::error::{DepthError, DepthResult};
use crate::model::{
    DepthEstimate, DepthEstimator, DepthModel, Device, ModelLoader, ModelVariant, PreparedInput,
};

/// Loads a precomputed grayscale depth image as the prediction of any variant.
///
/// 8-bit and 16-bit images are both accepted and scaled to `[0, 1]`. The
/// file is read on each load, so a missing file fails every variant.
#[derive(Debug, Clone)]
pub struct DepthFileLoader {
    path: PathBuf,
}

impl DepthFileLoader {
    /// Serve the depth image at `path`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the depth image.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a grayscale image as depth in `[0, 1]`.
///
/// # Errors
///
/// Returns [`DepthError::Image`] if the file cannot be decoded.
pub fn load_depth_image<P: AsRef<Path>>(path: P) -> DepthResult<DepthMap> {
    let gray = image::open(path.as_ref())?.into_luma16();
    let (width, height) = gray.dimensions();
    let values = gray
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / f32::from(u16::MAX))
        .collect();
    DepthMap::new(width, height, values)
}

impl ModelLoader for DepthFileLoader {
    fn load(&self, variant: ModelVariant, device: Device) -> DepthResult<Box<dyn DepthModel>> {
        let depth = load_depth_image(&self.path).map_err(|e| DepthError::ModelLoad {
            reason: format!("{}: {e}", self.path.display()),
        })?;
        debug!(
            path = %self.path.display(),
            variant = %variant,
            device = %device,
            width = depth.width(),
            height = depth.height(),
            "Loaded depth image"
        );
        Ok(Box::new(FileDepthModel { variant, depth }))
    }
}

struct FileDepthModel {
    variant: ModelVariant,
    depth: DepthMap,
}

impl DepthModel for FileDepthModel {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn predict(&self, _input: &PreparedInput) -> DepthResult<DepthMap> {
        Ok(self.depth.clone())
    }
}

/// Returns a fixed depth map, resampled to each image.
#[derive(Debug, Clone)]
pub struct MockDepth {
    depth: DepthMap,
    variant: ModelVariant,
}

impl MockDepth {
    /// Always answer with `depth`, attributed to [`ModelVariant::HighQuality`].
    #[must_use]
    pub const fn new(depth: DepthMap) -> Self {
        Self {
            depth,
            variant: ModelVariant::HighQuality,
        }
    }

    /// Attribute the depth to another variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: ModelVariant) -> Self {
        self.variant = variant;
        self
    }
}

impl DepthEstimator for MockDepth {
    fn estimate(&self, image: &RgbImage) -> DepthResult<DepthEstimate> {
        Ok(DepthEstimate {
            depth: self.depth.resize_bilinear(image.width(), image.height())?,
            variant: self.variant,
        })
    }
}

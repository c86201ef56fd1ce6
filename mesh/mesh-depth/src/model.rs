//! The depth-model boundary.
//!
//! Monocular depth networks are run outside this workspace. What lives here
//! is everything around them:
//!
//! - [`ModelVariant`] names the three networks in priority order, each with
//!   its own [`InputTransform`]
//! - [`Device`] selects where inference runs and is always passed explicitly
//! - [`DepthModel`] and [`ModelLoader`] are the seams a runtime plugs into
//! - [`FallbackEstimator`] tries each variant in turn and collects failures
//!
//! # Example
//!
//! ```
//! use image::RgbImage;
//! use mesh_depth::{
//!     DepthEstimator, DepthMap, DepthModel, DepthResult, Device, FallbackEstimator,
//!     ModelLoader, ModelVariant, PreparedInput,
//! };
//!
//! struct Flat;
//!
//! impl DepthModel for Flat {
//!     fn variant(&self) -> ModelVariant {
//!         ModelVariant::Fast
//!     }
//!     fn predict(&self, input: &PreparedInput) -> DepthResult<DepthMap> {
//!         DepthMap::new(input.width(), input.height(), vec![1.0; input.pixel_count()])
//!     }
//! }
//!
//! struct FlatLoader;
//!
//! impl ModelLoader for FlatLoader {
//!     fn load(&self, _: ModelVariant, _: Device) -> DepthResult<Box<dyn DepthModel>> {
//!         Ok(Box::new(Flat))
//!     }
//! }
//!
//! let estimator = FallbackEstimator::new(FlatLoader, Device::Cpu);
//! let estimate = estimator.estimate(&RgbImage::new(40, 30)).unwrap();
//! assert_eq!(estimate.depth.shape(), (30, 40));
//! assert_eq!(estimate.variant, ModelVariant::HighQuality);
//! ```

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::{debug, info, warn};

use crate::depth::DepthMap;
use crate::error::{DepthError, DepthResult};

/// A depth network, from most to least accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ModelVariant {
    /// `DPT_Large`.
    HighQuality,
    /// `DPT_Hybrid`.
    Balanced,
    /// `MiDaS_small`.
    Fast,
}

impl ModelVariant {
    /// All variants in the order they are tried.
    pub const ALL: [Self; 3] = [Self::HighQuality, Self::Balanced, Self::Fast];

    /// Published model name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HighQuality => "DPT_Large",
            Self::Balanced => "DPT_Hybrid",
            Self::Fast => "MiDaS_small",
        }
    }

    /// Preprocessing the network was trained with.
    #[must_use]
    pub const fn transform(self) -> InputTransform {
        match self {
            Self::HighQuality | Self::Balanced => InputTransform::Dpt,
            Self::Fast => InputTransform::Small,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub enum Device {
    /// Host CPU.
    #[default]
    Cpu,
    /// GPU with the given ordinal.
    Gpu(u32),
}

impl Device {
    /// Returns `true` for [`Device::Gpu`].
    #[must_use]
    pub const fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Gpu(index) => write!(f, "gpu:{index}"),
        }
    }
}

impl FromStr for Device {
    type Err = DepthError;

    /// Parses `cpu`, `gpu` (ordinal 0) or `gpu:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu(0)),
            other => other
                .strip_prefix("gpu:")
                .and_then(|n| n.parse().ok())
                .map(Self::Gpu)
                .ok_or_else(|| DepthError::InvalidParameter {
                    reason: format!("unknown device '{other}', expected cpu, gpu or gpu:N"),
                }),
        }
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

impl TryFrom<String> for Device {
    type Error = DepthError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Resize and normalisation applied before a network sees an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTransform {
    /// Short side 384, mean 0.5, std 0.5.
    Dpt,
    /// Short side 256, `ImageNet` mean and std.
    Small,
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

impl InputTransform {
    /// Target length of the shorter image side.
    #[must_use]
    pub const fn short_side(self) -> u32 {
        match self {
            Self::Dpt => 384,
            Self::Small => 256,
        }
    }

    /// Per-channel mean and standard deviation.
    #[must_use]
    pub const fn normalization(self) -> ([f32; 3], [f32; 3]) {
        match self {
            Self::Dpt => ([0.5; 3], [0.5; 3]),
            Self::Small => (IMAGENET_MEAN, IMAGENET_STD),
        }
    }

    /// Network input size for an image, keeping aspect ratio.
    ///
    /// Both sides are rounded to a multiple of 32.
    #[must_use]
    pub fn input_size(self, width: u32, height: u32) -> (u32, u32) {
        let scale = f64::from(self.short_side()) / f64::from(width.min(height).max(1));
        (
            snap_to_32(f64::from(width) * scale),
            snap_to_32(f64::from(height) * scale),
        )
    }

    /// Resize and normalise an image into an NCHW tensor.
    #[must_use]
    pub fn prepare(self, image: &RgbImage) -> PreparedInput {
        let (width, height) = self.input_size(image.width(), image.height());
        let resized = imageops::resize(image, width, height, FilterType::CatmullRom);
        let (mean, std) = self.normalization();

        let plane = width as usize * height as usize;
        let mut data = vec![0.0_f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = (f32::from(pixel.0[c]) / 255.0 - mean[c]) / std[c];
            }
        }

        PreparedInput {
            data,
            width,
            height,
            source_width: image.width(),
            source_height: image.height(),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn snap_to_32(len: f64) -> u32 {
    ((len / 32.0).round() as u32).max(1) * 32
}

/// A preprocessed image, ready for a network.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInput {
    data: Vec<f32>,
    width: u32,
    height: u32,
    source_width: u32,
    source_height: u32,
}

impl PreparedInput {
    /// Tensor values in `[1, 3, height, width]` order.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Tensor shape `[N, C, H, W]`.
    #[must_use]
    pub const fn shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }

    /// Tensor width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Tensor height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `width * height`.
    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of the image the tensor was made from.
    #[must_use]
    pub const fn source_size(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }
}

/// A loaded depth network.
pub trait DepthModel: Send + Sync {
    /// Which network this is.
    fn variant(&self) -> ModelVariant;

    /// Predict relative depth. The map may be at tensor resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn predict(&self, input: &PreparedInput) -> DepthResult<DepthMap>;
}

/// Loads depth networks on demand.
pub trait ModelLoader: Send + Sync {
    /// Load `variant` onto `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights or the device are unavailable.
    fn load(&self, variant: ModelVariant, device: Device) -> DepthResult<Box<dyn DepthModel>>;
}

/// Depth for a whole image, at image resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthEstimate {
    /// Raw relative depth, `height x width` of the image.
    pub depth: DepthMap,
    /// Network that produced it.
    pub variant: ModelVariant,
}

/// Anything that turns an image into depth.
pub trait DepthEstimator: Send + Sync {
    /// Estimate depth for `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if no depth can be produced.
    fn estimate(&self, image: &RgbImage) -> DepthResult<DepthEstimate>;
}

impl<F> DepthEstimator for F
where
    F: Fn(&RgbImage) -> DepthResult<DepthEstimate> + Send + Sync,
{
    fn estimate(&self, image: &RgbImage) -> DepthResult<DepthEstimate> {
        self(image)
    }
}

/// Why one variant could not produce depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantFailure {
    /// The variant that failed.
    pub variant: ModelVariant,
    /// Rendered error.
    pub reason: String,
}

impl fmt::Display for VariantFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.variant, self.reason)
    }
}

/// Tries variants in order until one produces depth.
#[derive(Debug, Clone)]
pub struct FallbackEstimator<L> {
    loader: L,
    variants: Vec<ModelVariant>,
    device: Device,
}

impl<L: ModelLoader> FallbackEstimator<L> {
    /// Try every variant in priority order on `device`.
    #[must_use]
    pub fn new(loader: L, device: Device) -> Self {
        Self {
            loader,
            variants: ModelVariant::ALL.to_vec(),
            device,
        }
    }

    /// Replace the list of variants to try.
    #[must_use]
    pub fn with_variants(mut self, variants: Vec<ModelVariant>) -> Self {
        self.variants = variants;
        self
    }

    /// Variants in the order they are tried.
    #[must_use]
    pub fn variants(&self) -> &[ModelVariant] {
        &self.variants
    }

    /// Device passed to the loader.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    fn try_variant(&self, variant: ModelVariant, image: &RgbImage) -> DepthResult<DepthMap> {
        let model = self.loader.load(variant, self.device)?;
        let input = variant.transform().prepare(image);
        debug!(variant = %variant, shape = ?input.shape(), "Prepared model input");
        let raw = model.predict(&input)?;
        raw.resize_bilinear(image.width(), image.height())
    }
}

impl<L: ModelLoader> DepthEstimator for FallbackEstimator<L> {
    fn estimate(&self, image: &RgbImage) -> DepthResult<DepthEstimate> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DepthError::InvalidDimensions {
                width: image.width(),
                height: image.height(),
            });
        }
        info!(device = %self.device, "Estimating depth");

        let mut failures = Vec::new();
        for &variant in &self.variants {
            match self.try_variant(variant, image) {
                Ok(depth) => {
                    info!(variant = %variant, failed_before = failures.len(), "Depth model succeeded");
                    return Ok(DepthEstimate { depth, variant });
                }
                Err(e) => {
                    warn!(variant = %variant, error = %e, "Depth model failed, trying next");
                    failures.push(VariantFailure {
                        variant,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(DepthError::AllVariantsFailed(failures))
    }
}

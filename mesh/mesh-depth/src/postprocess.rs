//! Depth normalisation and edge-preserving smoothing.
//!
//! Raw model output is relative and noisy. It is first min-max normalised
//! to `[0, 1]` and then smoothed with a bilateral filter, which averages
//! over a disc of neighbours weighted by both pixel distance and depth
//! difference, so depth discontinuities survive.

use rayon::prelude::*;
use tracing::debug;

use crate::depth::DepthMap;
use crate::error::{DepthError, DepthResult};

/// Added to the range before dividing, so a constant map normalises to zero.
pub const NORMALIZE_EPSILON: f64 = 1e-8;

/// Parameters for [`bilateral_filter_depth`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BilateralParams {
    /// Window diameter in pixels. The window is the disc of radius `diameter / 2`.
    pub diameter: u32,
    /// Standard deviation of the spatial Gaussian, in pixels.
    pub sigma_space: f64,
    /// Standard deviation of the range Gaussian, in depth units.
    pub sigma_range: f64,
}

impl Default for BilateralParams {
    fn default() -> Self {
        Self {
            diameter: 9,
            sigma_space: 7.0,
            sigma_range: 0.1,
        }
    }
}

impl BilateralParams {
    /// Set the window diameter.
    #[must_use]
    pub const fn with_diameter(mut self, diameter: u32) -> Self {
        self.diameter = diameter;
        self
    }

    /// Set the spatial sigma.
    #[must_use]
    pub const fn with_sigma_space(mut self, sigma: f64) -> Self {
        self.sigma_space = sigma;
        self
    }

    /// Set the range sigma.
    #[must_use]
    pub const fn with_sigma_range(mut self, sigma: f64) -> Self {
        self.sigma_range = sigma;
        self
    }

    /// Check that both sigmas are positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::InvalidParameter`] naming the bad field.
    pub fn validate(&self) -> DepthResult<()> {
        for (name, sigma) in [
            ("sigma_space", self.sigma_space),
            ("sigma_range", self.sigma_range),
        ] {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(DepthError::InvalidParameter {
                    reason: format!("{name} must be positive, got {sigma}"),
                });
            }
        }
        Ok(())
    }
}

/// Parameters for [`postprocess_depth`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PostprocessParams {
    /// Bilateral filter settings, or `None` to skip smoothing.
    pub bilateral: Option<BilateralParams>,
}

impl Default for PostprocessParams {
    fn default() -> Self {
        Self {
            bilateral: Some(BilateralParams::default()),
        }
    }
}

impl PostprocessParams {
    /// Normalise only.
    #[must_use]
    pub const fn without_filter() -> Self {
        Self { bilateral: None }
    }
}

/// Min-max normalise depth to `[0, 1]`.
///
/// Computes `(d - min) / (max - min + 1e-8)`. Non-finite samples are treated
/// as the minimum, so the output never contains NaN.
///
/// # Example
///
/// ```
/// use mesh_depth::{DepthMap, normalize_depth};
///
/// let flat = DepthMap::new(2, 2, vec![7.0; 4]).unwrap();
/// assert!(normalize_depth(&flat).values().iter().all(|&d| d == 0.0));
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_depth(depth: &DepthMap) -> DepthMap {
    let (lo, hi) = depth.finite_range().unwrap_or((0.0, 0.0));
    let lo = f64::from(lo);
    let scale = 1.0 / (f64::from(hi) - lo + NORMALIZE_EPSILON);

    let values: Vec<f32> = depth
        .values()
        .iter()
        .map(|&d| {
            if d.is_finite() {
                ((f64::from(d) - lo) * scale).clamp(0.0, 1.0) as f32
            } else {
                0.0
            }
        })
        .collect();

    with_values(depth, values)
}

/// Smooth depth with a bilateral filter.
///
/// Borders replicate the edge pixel. Rows are filtered in parallel; the
/// result does not depend on the thread count. Output is clamped to `[0, 1]`.
///
/// # Errors
///
/// Returns [`DepthError::InvalidParameter`] if a sigma is not positive.
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
pub fn bilateral_filter_depth(depth: &DepthMap, params: &BilateralParams) -> DepthResult<DepthMap> {
    params.validate()?;

    let radius = i64::from(params.diameter / 2);
    let space_coeff = -0.5 / (params.sigma_space * params.sigma_space);
    let range_coeff = -0.5 / (params.sigma_range * params.sigma_range);

    // Disc-shaped window with precomputed spatial weights
    let mut kernel = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = dx * dx + dy * dy;
            if r2 <= radius * radius {
                kernel.push((dx, dy, (r2 as f64 * space_coeff).exp()));
            }
        }
    }

    let width = depth.width() as usize;
    let max_x = i64::from(depth.width()) - 1;
    let max_y = i64::from(depth.height()) - 1;
    let src = depth.values();

    let mut values = vec![0.0_f32; src.len()];
    values
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, out) in row.iter_mut().enumerate() {
                let x = x as i64;
                let center = f64::from(src[y as usize * width + x as usize]);

                let mut sum = 0.0;
                let mut weight_sum = 0.0;
                for &(dx, dy, w_space) in &kernel {
                    let nx = (x + dx).clamp(0, max_x);
                    let ny = (y + dy).clamp(0, max_y);
                    let d = f64::from(src[ny as usize * width + nx as usize]);
                    let diff = d - center;
                    let w = w_space * (diff * diff * range_coeff).exp();
                    sum += w * d;
                    weight_sum += w;
                }

                // The centre tap always has weight 1
                *out = (sum / weight_sum).clamp(0.0, 1.0) as f32;
            }
        });

    Ok(with_values(depth, values))
}

/// Normalise raw depth, then optionally smooth it.
///
/// # Errors
///
/// Returns an error if the bilateral parameters are invalid.
pub fn postprocess_depth(raw: &DepthMap, params: &PostprocessParams) -> DepthResult<DepthMap> {
    let normalized = normalize_depth(raw);
    let out = match &params.bilateral {
        Some(bilateral) => bilateral_filter_depth(&normalized, bilateral)?,
        None => normalized,
    };

    debug!(
        width = out.width(),
        height = out.height(),
        filtered = params.bilateral.is_some(),
        "Post-processed depth"
    );
    Ok(out)
}

/// Same shape as `like`, new values. The length always matches.
fn with_values(like: &DepthMap, values: Vec<f32>) -> DepthMap {
    DepthMap::new(like.width(), like.height(), values).unwrap_or_else(|_| like.clone())
}

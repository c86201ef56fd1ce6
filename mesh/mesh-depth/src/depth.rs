//! Dense per-pixel depth.

use crate::error::{DepthError, DepthResult};

/// Row-major depth buffer aligned with the pixels of an image.
///
/// Values are relative, not metric. A model prediction can hold any finite
/// range; after [`crate::postprocess_depth`] every value lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthMap {
    /// Wrap a row-major buffer of `width * height` values.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::InvalidDimensions`] if either side is zero and
    /// [`DepthError::ShapeMismatch`] if the buffer has the wrong length.
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> DepthResult<Self> {
        if width == 0 || height == 0 {
            return Err(DepthError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(DepthError::ShapeMismatch {
                width,
                height,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Build a map by evaluating `f(x, y)` at every pixel.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::InvalidDimensions`] if either side is zero.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> DepthResult<Self> {
        let values = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self::new(width, height, values)
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(height, width)`, matching the image array shape.
    #[must_use]
    pub const fn shape(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Depth at pixel `(x, y)`, or `None` outside the map.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.values[y as usize * self.width as usize + x as usize])
        } else {
            None
        }
    }

    /// Smallest and largest finite values, or `None` if there are none.
    #[must_use]
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(None, |acc, d| match acc {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }

    /// Resample to `width x height` with bilinear interpolation.
    ///
    /// Pixel centres are aligned, so a same-size resize returns an equal map.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::InvalidDimensions`] if either target side is zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn resize_bilinear(&self, width: u32, height: u32) -> DepthResult<Self> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        let sx = f64::from(self.width) / f64::from(width);
        let sy = f64::from(self.height) / f64::from(height);
        let max_x = f64::from(self.width - 1);
        let max_y = f64::from(self.height - 1);

        Self::from_fn(width, height, |x, y| {
            let fx = ((f64::from(x) + 0.5) * sx - 0.5).clamp(0.0, max_x);
            let fy = ((f64::from(y) + 0.5) * sy - 0.5).clamp(0.0, max_y);
            let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
            let x1 = (x0 + 1).min(self.width - 1);
            let y1 = (y0 + 1).min(self.height - 1);
            let tx = fx - f64::from(x0);
            let ty = fy - f64::from(y0);

            let at = |px: u32, py: u32| {
                f64::from(self.values[py as usize * self.width as usize + px as usize])
            };
            let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
            let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
            (top * (1.0 - ty) + bottom * ty) as f32
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_checks_shape() {
        assert!(DepthMap::new(2, 2, vec![0.0; 4]).is_ok());
        assert!(matches!(
            DepthMap::new(2, 2, vec![0.0; 3]),
            Err(DepthError::ShapeMismatch {
                expected: 4,
                actual: 3,
                ..
            })
        ));
        assert!(matches!(
            DepthMap::new(0, 2, vec![]),
            Err(DepthError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn row_major_access() {
        let map = DepthMap::from_fn(3, 2, |x, y| (y * 10 + x) as f32).unwrap();
        assert_eq!(map.get(2, 1), Some(12.0));
        assert_eq!(map.get(0, 1), Some(10.0));
        assert_eq!(map.get(3, 0), None);
        assert_eq!(map.shape(), (2, 3));
        assert_eq!(map.values()[4], 11.0);
    }

    #[test]
    fn finite_range_skips_nan() {
        let map = DepthMap::new(4, 1, vec![f32::NAN, 2.0, -1.0, f32::INFINITY]).unwrap();
        assert_eq!(map.finite_range(), Some((-1.0, 2.0)));

        let map = DepthMap::new(1, 1, vec![f32::NAN]).unwrap();
        assert_eq!(map.finite_range(), None);
    }

    #[test]
    fn resize_same_size_is_identity() {
        let map = DepthMap::from_fn(5, 4, |x, y| (x * y) as f32).unwrap();
        assert_eq!(map.resize_bilinear(5, 4).unwrap(), map);
    }

    #[test]
    fn resize_constant_stays_constant() {
        let map = DepthMap::new(3, 3, vec![0.25; 9]).unwrap();
        let up = map.resize_bilinear(7, 11).unwrap();
        assert_eq!(up.shape(), (11, 7));
        for &d in up.values() {
            assert_relative_eq!(d, 0.25);
        }
    }

    #[test]
    fn resize_interpolates_between_columns() {
        let map = DepthMap::new(2, 1, vec![0.0, 1.0]).unwrap();
        let up = map.resize_bilinear(4, 1).unwrap();
        // Centres at -0.25, 0.25, 0.75, 1.25 in source pixels, clamped
        let v = up.values();
        assert_relative_eq!(v[0], 0.0);
        assert_relative_eq!(v[1], 0.25);
        assert_relative_eq!(v[2], 0.75);
        assert_relative_eq!(v[3], 1.0);
    }

    #[test]
    fn resize_downsample() {
        let map = DepthMap::from_fn(8, 8, |x, _| x as f32).unwrap();
        let down = map.resize_bilinear(4, 4).unwrap();
        assert_relative_eq!(down.get(0, 0).unwrap(), 0.5);
        assert_relative_eq!(down.get(3, 2).unwrap(), 6.5);
    }
}

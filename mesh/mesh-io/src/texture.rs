//! Texture image output.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbImage};

use crate::error::IoResult;

/// Encode an RGB image as PNG bytes.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_png(image: &RgbImage) -> IoResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Write an RGB image as a PNG file.
///
/// # Errors
///
/// Returns an error if encoding fails or the file cannot be written.
pub fn write_texture<P: AsRef<Path>>(image: &RgbImage, path: P) -> IoResult<()> {
    std::fs::write(path, encode_png(image)?)?;
    Ok(())
}

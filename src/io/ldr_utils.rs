// Copyright @yucwang 2026

use crate::error::{RenderError, Result};
use crate::math::constants::Vector3f;

use image::RgbImage;
use std::path::Path;

/// Maps linear values to 8 bits per channel with `clamp(c * 255, 0, 255)`.
pub fn to_ldr(image: &[Vector3f]) -> Vec<u8> {
    let mut out = Vec::with_capacity(image.len() * 3);
    for pixel in image {
        for c in 0..3 {
            out.push((pixel[c] * 255.0).clamp(0.0, 255.0) as u8);
        }
    }
    out
}

pub fn write_png_to_file(image: &[Vector3f],
                         width: usize,
                         height: usize,
                         file_path: &Path) -> Result<()> {
    log::debug!("Writing PNG image: {}.", file_path.display());

    let buffer = RgbImage::from_raw(width as u32, height as u32, to_ldr(image))
        .ok_or_else(|| RenderError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("image buffer does not match {}x{}", width, height))))?;
    buffer.save(file_path)?;
    Ok(())
}

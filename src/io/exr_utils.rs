/* Copyright 2020 @TwoCookingMice */

use crate::error::Result;
use crate::math::constants::Vector3f;

use exr::prelude::write_rgb_file;
use std::path::Path;

// Write a row-major linear RGB image as OpenEXR
pub fn write_exr_to_file(image: &[Vector3f],
                         width: usize,
                         height: usize,
                         file_path: &Path) -> Result<()> {
    log::debug!("Writing OpenEXR image: {}.", file_path.display());

    write_rgb_file(file_path, width, height, |x, y| {
        let pixel = image[y * width + x];
        (pixel.x, pixel.y, pixel.z)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_exr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("image.exr");
        let image = vec![Vector3f::new(0.25, 1.5, 8.0); 6];
        write_exr_to_file(&image, 3, 2, &path).expect("write");
        let bytes = std::fs::read(&path).expect("read back");
        // OpenEXR magic number.
        assert_eq!(&bytes[..4], &[0x76, 0x2f, 0x31, 0x01]);
    }
}

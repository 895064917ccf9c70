// Copyright @yucwang 2026

//! Resume files: everything needed to continue a progressive render.
//!
//! Layout, all little-endian:
//! magic `FNCR`, `u32` version, `u32` metadata length, JSON metadata, then
//! one record per pixel in row-major order (`f64` x3 radiance sums followed
//! by the `u64` sample count).

use crate::core::framebuffer::PixelState;
use crate::error::{RenderError, Result};
use crate::io::write_atomically;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

pub const RESUME_MAGIC: &[u8; 4] = b"FNCR";
pub const RESUME_VERSION: u32 = 1;
const MAX_METADATA_LEN: u32 = 1 << 20;
// f64 x3 sum + u64 count
const PIXEL_RECORD_LEN: u64 = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeMetadata {
    pub spp: u32,
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    pub integrator: String,
    pub scene: PathBuf,
}

impl ResumeMetadata {
    /// Checks that data saved with `self` can continue a render described by
    /// `target`. The sample count of `target` is the total budget.
    pub fn check_compatible(&self, target: &ResumeMetadata) -> Result<()> {
        if self.width != target.width || self.height != target.height {
            return Err(RenderError::IncompatibleResumeData(format!(
                "resolution {}x{} differs from {}x{}",
                self.width, self.height, target.width, target.height)));
        }
        if self.integrator != target.integrator {
            return Err(RenderError::IncompatibleResumeData(format!(
                "integrator '{}' differs from '{}'", self.integrator, target.integrator)));
        }
        if self.seed != target.seed {
            return Err(RenderError::IncompatibleResumeData(format!(
                "seed {} differs from {}", self.seed, target.seed)));
        }
        if self.spp > target.spp {
            return Err(RenderError::IncompatibleResumeData(format!(
                "{} spp saved but only {} requested", self.spp, target.spp)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeData {
    pub metadata: ResumeMetadata,
    pub pixels: Vec<PixelState>,
}

pub fn write_resume<W: Write>(writer: &mut W, metadata: &ResumeMetadata, pixels: &[PixelState]) -> Result<()> {
    let json = serde_json::to_vec(metadata)?;
    writer.write_all(RESUME_MAGIC)?;
    writer.write_u32::<LittleEndian>(RESUME_VERSION)?;
    writer.write_u32::<LittleEndian>(json.len() as u32)?;
    writer.write_all(&json)?;
    for pixel in pixels {
        for c in 0..3 {
            writer.write_f64::<LittleEndian>(pixel.sum[c])?;
        }
        writer.write_u64::<LittleEndian>(pixel.count)?;
    }
    Ok(())
}

fn invalid(what: &str) -> impl Fn(std::io::Error) -> RenderError + '_ {
    move |e| RenderError::InvalidResumeData(format!("{}: {}", what, e))
}

/// Parses a complete resume file. Nothing is returned unless the whole
/// buffer is well-formed.
pub fn read_resume(bytes: &[u8]) -> Result<ResumeData> {
    let mut reader = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(invalid("header"))?;
    if &magic != RESUME_MAGIC {
        return Err(RenderError::InvalidResumeData("bad magic".to_string()));
    }
    let version = reader.read_u32::<LittleEndian>().map_err(invalid("header"))?;
    if version != RESUME_VERSION {
        return Err(RenderError::InvalidResumeData(format!("unsupported version {}", version)));
    }

    let json_len = reader.read_u32::<LittleEndian>().map_err(invalid("header"))?;
    if json_len > MAX_METADATA_LEN {
        return Err(RenderError::InvalidResumeData("metadata too large".to_string()));
    }
    let mut json = vec![0u8; json_len as usize];
    reader.read_exact(&mut json).map_err(invalid("metadata"))?;
    let metadata: ResumeMetadata = serde_json::from_slice(&json)
        .map_err(|e| RenderError::InvalidResumeData(format!("metadata: {}", e)))?;

    let pixel_count = metadata.width.checked_mul(metadata.height)
        .ok_or_else(|| RenderError::InvalidResumeData("resolution overflows".to_string()))?;
    let expected = (pixel_count as u64).checked_mul(PIXEL_RECORD_LEN)
        .ok_or_else(|| RenderError::InvalidResumeData("resolution overflows".to_string()))?;
    let remaining = bytes.len() as u64 - reader.position();
    if remaining != expected {
        return Err(RenderError::InvalidResumeData(format!(
            "expected {} pixel records, found {} bytes", pixel_count, remaining)));
    }

    let mut pixels = Vec::with_capacity(pixel_count);
    for _ in 0..pixel_count {
        let mut sum = [0f64; 3];
        for value in sum.iter_mut() {
            *value = reader.read_f64::<LittleEndian>().map_err(invalid("pixels"))?;
        }
        let count = reader.read_u64::<LittleEndian>().map_err(invalid("pixels"))?;
        pixels.push(PixelState { sum, count });
    }

    Ok(ResumeData { metadata, pixels })
}

pub fn write_resume_file(path: &Path, metadata: &ResumeMetadata, pixels: &[PixelState]) -> Result<()> {
    write_atomically(path, |tmp| {
        let mut buffer = Vec::with_capacity(pixels.len() * PIXEL_RECORD_LEN as usize + 256);
        write_resume(&mut buffer, metadata, pixels)?;
        fs::write(tmp, &buffer)?;
        Ok(())
    })
}

/// `Ok(None)` when there is no resume file at `path`.
pub fn read_resume_file(path: &Path) -> Result<Option<ResumeData>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    read_resume(&bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(spp: u32) -> ResumeMetadata {
        ResumeMetadata {
            spp,
            width: 2,
            height: 1,
            seed: 42,
            integrator: "bidirectional".to_string(),
            scene: PathBuf::from("scenes/box.xml"),
        }
    }

    fn pixels() -> Vec<PixelState> {
        vec![
            PixelState { sum: [1.5, 0.25, -0.0], count: 16 },
            PixelState { sum: [f64::MAX, 1e-300, 3.0], count: 0 },
        ]
    }

    #[test]
    fn test_resume_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("render.dat");
        write_resume_file(&path, &metadata(16), &pixels()).expect("write");

        let data = read_resume_file(&path).expect("read").expect("present");
        assert_eq!(data.metadata, metadata(16));
        assert_eq!(data.pixels, pixels());
        assert!(read_resume_file(&dir.path().join("missing.dat")).expect("read").is_none());
    }

    #[test]
    fn test_truncated_and_corrupt_files_are_rejected() {
        let mut buffer = Vec::new();
        write_resume(&mut buffer, &metadata(16), &pixels()).expect("write");

        let truncated = &buffer[..buffer.len() - 1];
        assert!(matches!(read_resume(truncated), Err(RenderError::InvalidResumeData(_))));

        let mut bad_magic = buffer.clone();
        bad_magic[0] = b'X';
        assert!(matches!(read_resume(&bad_magic), Err(RenderError::InvalidResumeData(_))));

        let mut trailing = buffer.clone();
        trailing.push(0);
        assert!(matches!(read_resume(&trailing), Err(RenderError::InvalidResumeData(_))));

        assert!(matches!(read_resume(&[]), Err(RenderError::InvalidResumeData(_))));

        let mut huge = metadata(16);
        huge.width = 1 << 40;
        huge.height = 1 << 22;
        let mut header_only = Vec::new();
        write_resume(&mut header_only, &huge, &[]).expect("write");
        assert!(matches!(read_resume(&header_only), Err(RenderError::InvalidResumeData(_))));
    }

    #[test]
    fn test_incompatible_metadata() {
        let saved = metadata(16);
        assert!(saved.check_compatible(&metadata(64)).is_ok());
        assert!(saved.check_compatible(&metadata(8)).is_err());

        let mut other = metadata(64);
        other.width = 4;
        assert!(matches!(saved.check_compatible(&other), Err(RenderError::IncompatibleResumeData(_))));

        let mut other = metadata(64);
        other.integrator = "path".to_string();
        assert!(saved.check_compatible(&other).is_err());

        let mut other = metadata(64);
        other.seed = 7;
        assert!(saved.check_compatible(&other).is_err());
    }
}

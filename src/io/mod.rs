// Copyright @yucwang 2026

pub mod exr_utils;
pub mod ldr_utils;
pub mod resume;

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".tmp-{}", name))
}

/// Runs `write` against a temporary file next to `path`, then renames it into
/// place. A failed or interrupted write leaves any previous file untouched.
/// The temporary name keeps the extension so format detection still works.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
    where F: FnOnce(&Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temporary_sibling(path);
    let result = write(&tmp).and_then(|()| Ok(fs::rename(&tmp, path)?));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

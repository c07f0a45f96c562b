//! Atomic JSON persistence.

use crate::error::{ResearchError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Write pretty JSON to `<path>.tmp`, fsync, then rename over `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');

    let tmp = tmp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| ResearchError::store(path, format!("write failed: {e}")))
}

/// Read JSON from `path`; a missing file yields `None`.
///
/// A file that exists but does not parse is an error: treating it as empty
/// would let the next flush overwrite prior results.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ResearchError::store(path, format!("read failed: {e}"))),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| ResearchError::store(path, format!("parse failed: {e}")))
}

/// Check that `path` can be written, creating its parent directory if needed.
///
/// Leaves no file behind.
pub fn preflight_writable(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(ResearchError::store(path, "is a directory"));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| ResearchError::store(path, format!("cannot create parent: {e}")))?;
    }
    let tmp = tmp_path(path);
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .map_err(|e| ResearchError::store(path, format!("not writable: {e}")))?;
    fs::remove_file(&tmp).map_err(|e| ResearchError::store(path, format!("cleanup failed: {e}")))
}

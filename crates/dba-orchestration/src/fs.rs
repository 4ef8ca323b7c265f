//! Filesystem steps shared by the workflows

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Timestamp used in backup names
pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Create `path` and its parents unless it exists
pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        debug!("Directory exists: {}", path.display());
        return Ok(());
    }
    info!("Creating directory {}", path.display());
    std::fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

/// First of `<stem><ext>`, `<stem>_1<ext>`, `<stem>_2<ext>`... that does not exist
pub(crate) fn unique_path(parent: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = parent.join(format!("{}{}", stem, ext));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| parent.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Delete a directory tree one entry at a time, deepest entries first
pub(crate) fn remove_tree(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|e| Error::io(root, std::io::Error::other(e)))?;
        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        removed.map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

/// Read a text file
pub(crate) fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Truncate and rewrite a text file
pub(crate) fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| Error::io(path, e))
}

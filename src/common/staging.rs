//! Filesystem staging: directories, file copies and tree removal.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating parents as needed.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Copy `src` to `dst`, creating `dst`'s parent directory.
///
/// The data is written to a temporary sibling and renamed into place, so a
/// reader never sees a half-written `dst`. Returns the number of bytes copied.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    let file_name = dst
        .file_name()
        .with_context(|| format!("Destination {} has no file name", dst.display()))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp = dst.with_file_name(temp_name);

    let bytes = fs::copy(src, &temp)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), temp.display()))?;
    fs::rename(&temp, dst)
        .with_context(|| format!("Failed to move {} into place", dst.display()))?;
    Ok(bytes)
}

/// Remove a directory tree. Succeeds if it does not exist.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// A freshly created work directory that is removed when dropped.
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create `<parent>/<name>`, wiping anything left from a previous run.
    pub fn prepare(parent: &Path, name: &str) -> Result<Self> {
        let path = parent.join(name);
        remove_tree(&path)?;
        ensure_dir(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = remove_tree(&self.path) {
            tracing::warn!("staging cleanup failed: {:#}", e);
        }
    }
}

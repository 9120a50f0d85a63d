//! Filesystem writes for generated artifacts.
//!
//! Files are opened, written and closed within a single call; nothing is held
//! open between operations.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{CockpitError, Result};

/// Check that `relative_path` stays below whatever root it is joined onto.
///
/// Absolute paths, drive prefixes and `..` segments are rejected.
pub fn ensure_relative(relative_path: &str) -> Result<&Path> {
    let path = Path::new(relative_path);
    let escapes = path.components().any(|c| {
        matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if relative_path.trim().is_empty() || path.is_absolute() || escapes {
        return Err(CockpitError::Config(format!(
            "refusing to write outside the target directory: {relative_path}"
        )));
    }
    Ok(path)
}

/// Write `content` (trimmed) to `root/relative_path`, creating parent directories.
///
/// Existing files are overwritten. Returns the absolute path written.
pub fn write_file(root: &Path, relative_path: &str, content: &str) -> Result<PathBuf> {
    let path = root.join(ensure_relative(relative_path)?);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CockpitError::io(parent, e))?;
    }
    fs::write(&path, content.trim()).map_err(|e| CockpitError::io(&path, e))?;
    debug!(path = %path.display(), bytes = content.trim().len(), "wrote file");
    Ok(path)
}

/// Expand `pattern` relative to `root` and return the matching files.
///
/// Directories that happen to match are skipped.
pub fn find_matching(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern
    );
    let entries = glob::glob(&full).map_err(|e| CockpitError::Pattern(format!("{pattern}: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            CockpitError::io(path, e.into_error())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Delete every file under `root` matching `pattern` (e.g. `**/*.tf*`).
///
/// The first failed delete aborts the clear and is reported with its path.
/// A missing `root` clears nothing. Returns the deleted paths.
pub fn clear_matching(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let files = find_matching(root, pattern)?;
    for file in &files {
        fs::remove_file(file).map_err(|e| CockpitError::io(file, e))?;
        debug!(path = %file.display(), "removed stale file");
    }
    Ok(files)
}

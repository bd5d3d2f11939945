use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::ExportError;

/// Resolves the anchor directory for a set of relative paths.
///
/// Without a name the start directory itself is the root and no search
/// happens.
pub fn resolve_root(start: &Path, name: Option<&str>) -> Result<PathBuf, ExportError> {
    match name {
        Some(name) => find_named_ancestor(start, name),
        None => Ok(start.to_path_buf()),
    }
}

/// Walks upward from `start` (inclusive) until a directory whose own name
/// equals `name` is found.
///
/// The comparison is exact and case-sensitive. The walk stops with
/// `RootNotFound` once a directory has no parent or its parent does not exist.
pub fn find_named_ancestor(start: &Path, name: &str) -> Result<PathBuf, ExportError> {
    let not_found = || ExportError::RootNotFound {
        name: name.to_string(),
        start: start.to_path_buf(),
    };

    let mut current = start.canonicalize().map_err(|_| not_found())?;
    let target = OsStr::new(name);

    loop {
        if current.file_name() == Some(target) {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) if parent.is_dir() => current = parent.to_path_buf(),
            _ => return Err(not_found()),
        }
    }
}

//! # Collision-free File Naming
//!
//! Log files and checkpoints are never overwritten: when `stem.ext` is
//! taken, `stem_1.ext`, `stem_2.ext`, ... are tried in order.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Returns `dir/stem+ext` if nothing exists there yet, otherwise
/// `dir/stem_<n>+ext` for the smallest free `n >= 1`.
///
/// `ext` includes the leading dot (e.g. `".txt"`).
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1u64..)
        .map(|uniq| dir.join(format!("{stem}_{uniq}{ext}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Creates the first free name in the `unique_path` sequence and opens it
/// for appending.
///
/// The file is opened with `create_new`, so a name taken between the
/// existence check and the open moves on to the next suffix instead of
/// truncating someone else's file.
pub fn create_unique(dir: &Path, stem: &str, ext: &str) -> io::Result<(PathBuf, File)> {
    loop {
        let path = unique_path(dir, stem, ext);
        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "name taken while creating; retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Creates `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
        tracing::debug!(dir = %dir.display(), "created directory");
    }
    Ok(())
}

use std::{
    io,
    path::{Path, PathBuf},
};

use log::trace;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Error while walking {root}: {source}")]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
    #[error("Error while copying {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

/// Enumerates every file under `root` and keeps the ones whose directory
/// (relative to `root`) and file name satisfy `predicate`.
///
/// Returned paths are relative to `root`. The walk order is whatever the
/// filesystem yields; callers may only rely on the identity of the set.
pub fn select<F>(root: &Path, predicate: F) -> Result<Vec<PathBuf>, TreeError>
where
    F: Fn(&Path, &str) -> bool,
{
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| TreeError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(name) = entry.file_name().to_str() else {
            trace!("Skipping non-UTF-8 file name {:?}", entry.file_name());
            continue;
        };
        let dir = relative.parent().unwrap_or_else(|| Path::new(""));
        if predicate(dir, name) {
            files.push(relative.to_path_buf());
        }
    }
    Ok(files)
}

/// Copies each relative path in `files` from under `root` to the same
/// relative location under `dest_root`, creating intermediate directories
/// and rewriting a `.c` or `.cc` extension to `.cpp` in the destination
/// name only. File contents are copied verbatim and existing destination
/// files are overwritten, never deleted.
///
/// Returns the destination paths in input order so callers can chain a
/// post-processing pass over exactly the files just copied.
pub fn mirror(
    root: &Path,
    files: &[PathBuf],
    dest_root: &Path,
) -> Result<Vec<PathBuf>, TreeError> {
    let mut copied = Vec::with_capacity(files.len());
    for file in files {
        let from = root.join(file);
        let to = dest_root.join(rename_source_extension(file));
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        trace!("Copying {} to {}", from.display(), to.display());
        std::fs::copy(&from, &to).map_err(|source| TreeError::Copy {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        copied.push(to);
    }
    Ok(copied)
}

/// The composition used by nearly every recipe step: select under `root`,
/// then mirror the selection into `dest_root`.
pub fn select_and_mirror<F>(
    root: &Path,
    predicate: F,
    dest_root: &Path,
) -> Result<Vec<PathBuf>, TreeError>
where
    F: Fn(&Path, &str) -> bool,
{
    let files = select(root, predicate)?;
    mirror(root, &files, dest_root)
}

fn rename_source_extension(path: &Path) -> PathBuf {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("c") | Some("cc") => path.with_extension("cpp"),
        _ => path.to_path_buf(),
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Returns `true` when a file was removed.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn read_optional_string(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Directories between the filesystem and `dir` (inclusive) that do not exist yet, outermost
/// first.
pub fn missing_ancestors(dir: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = dir
        .ancestors()
        .filter(|candidate| !candidate.as_os_str().is_empty())
        .take_while(|candidate| !candidate.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

/// Create `dir` one level at a time and return exactly the directories this call created.
pub fn create_dir_chain(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for candidate in missing_ancestors(dir) {
        match fs::create_dir(&candidate) {
            Ok(()) => created.push(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && candidate.is_dir() => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to create directory: {}", candidate.display())
                });
            }
        }
    }
    Ok(created)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRemoval {
    Removed,
    Missing,
    NotEmpty,
    Denied,
}

/// Remove `dir` only when it is empty. Anything short of a hard I/O failure is reported as an
/// outcome rather than an error.
pub fn remove_dir_if_empty(dir: &Path) -> Result<DirRemoval> {
    match fs::remove_dir(dir) {
        Ok(()) => Ok(DirRemoval::Removed),
        Err(err) => classify_remove_dir_error(dir, err),
    }
}

/// Platforms that report a non-empty directory without a dedicated error kind fall back to
/// listing it.
pub(crate) fn classify_remove_dir_error(dir: &Path, err: io::Error) -> Result<DirRemoval> {
    match err.kind() {
        io::ErrorKind::NotFound => return Ok(DirRemoval::Missing),
        io::ErrorKind::DirectoryNotEmpty => return Ok(DirRemoval::NotEmpty),
        io::ErrorKind::PermissionDenied => return Ok(DirRemoval::Denied),
        _ => {}
    }

    match fs::read_dir(dir).map(|mut entries| entries.next().is_some()) {
        Ok(true) => Ok(DirRemoval::NotEmpty),
        _ => Err(err).with_context(|| format!("failed to remove directory: {}", dir.display())),
    }
}

/// Replace `path` with `content` through a temporary sibling so an interrupted write never
/// leaves a truncated file. Existing permissions are carried over.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".cmdry-tmp-{}", std::process::id()));
    let tmp_path = path.with_file_name(name);

    let written = fs::write(&tmp_path, content).and_then(|()| match fs::metadata(path) {
        Ok(metadata) => fs::set_permissions(&tmp_path, metadata.permissions()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    });
    if let Err(err) = written {
        let _ = remove_file_if_exists(&tmp_path);
        return Err(err).with_context(|| format!("failed to write {}", tmp_path.display()));
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = remove_file_if_exists(&tmp_path);
        return Err(err).with_context(|| {
            format!("failed to replace {} -> {}", tmp_path.display(), path.display())
        });
    }
    Ok(())
}

pub fn file_sha256_hex(path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

use crate::error::{Result, TddError};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Parent directories are created as needed.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Resolve `relative` under `root`, refusing anything that could land
/// outside it.
pub fn resolve_in_repo(root: &Path, relative: &str) -> Result<PathBuf> {
    let rel = Path::new(relative);
    if relative.trim().is_empty() {
        return Err(TddError::InvalidPath(relative.to_string()));
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TddError::InvalidPath(relative.to_string()));
            }
        }
    }
    Ok(root.join(rel))
}

/// Write a generated file into the repository.
pub fn write_repo_file(root: &Path, relative: &str, content: &str) -> Result<PathBuf> {
    let path = resolve_in_repo(root, relative)?;
    atomic_write(&path, content.as_bytes())?;
    Ok(path)
}

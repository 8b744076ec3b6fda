//! Raw file primitives used by the planner and committer.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Read a file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::from_io(e, path))?;
    String::from_utf8(bytes).map_err(|e| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8: {}", path.display(), e),
        ))
    })
}

/// Replace `path` with `contents` so readers never see a partial file.
///
/// Writes a temp file in the same directory, copies the original
/// permissions onto it, syncs, then renames it over the target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = parent_dir(path)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), metadata.permissions())?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Copy `path` to a timestamped sibling and return the backup's path.
///
/// The name is `<file name>.<YYYYMMDDTHHMMSS.mmm>.<suffix>`; a counter is
/// appended if that name is already taken.
pub fn create_backup(path: &Path, now: DateTime<Utc>, suffix: &str) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", path.display())))?
        .to_string_lossy()
        .to_string();
    let stamp = now.format("%Y%m%dT%H%M%S%.3f");

    let mut backup = path.with_file_name(format!("{}.{}.{}", file_name, stamp, suffix));
    let mut counter = 1;
    while backup.exists() {
        backup = path.with_file_name(format!("{}.{}.{}.{}", file_name, stamp, counter, suffix));
        counter += 1;
    }

    fs::copy(path, &backup).map_err(|e| Error::from_io(e, path))?;
    Ok(backup)
}

fn parent_dir(path: &Path) -> Result<&Path> {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => Ok(p),
        Some(_) => Ok(Path::new(".")),
        None => Err(Error::InvalidInput(format!(
            "{} has no parent directory",
            path.display()
        ))),
    }
}

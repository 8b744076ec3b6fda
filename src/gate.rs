//! Directory allow-list consulted before any path is read or written.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Error, Result};

/// Decides whether a path may be touched.
pub trait PathGate: Send + Sync {
    fn check(&self, path: &Path) -> Result<()>;
}

/// Permits every path.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PathGate for AllowAll {
    fn check(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Permits paths under one of a set of root directories.
///
/// Paths are compared after symlink resolution, so a link inside a root
/// pointing outside it is refused.
#[derive(Debug, Clone)]
pub struct AllowedRoots {
    roots: Vec<PathBuf>,
}

impl AllowedRoots {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let roots = roots.into_iter().map(|r| normalize(&r)).collect();
        Self { roots }
    }
}

impl PathGate for AllowedRoots {
    fn check(&self, path: &Path) -> Result<()> {
        let resolved = normalize(path);
        if self.roots.iter().any(|root| resolved.starts_with(root)) {
            Ok(())
        } else {
            warn!(path = %resolved.display(), "path outside allowed roots");
            Err(Error::AccessDenied(resolved))
        }
    }
}

/// Best-effort canonical form of `path`.
///
/// Existing paths are canonicalized. For a missing path the deepest
/// existing ancestor is canonicalized and the remainder appended.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut tail = Vec::new();
    let mut current = absolute.as_path();
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            tail.push(name.to_os_string());
        }
        if let Ok(canonical) = parent.canonicalize() {
            let mut out = canonical;
            for part in tail.iter().rev() {
                out.push(part);
            }
            return out;
        }
        current = parent;
    }
    absolute
}

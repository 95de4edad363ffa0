// SPDX-License-Identifier: EUPL-1.2

//! Filesystem boundary.
//!
//! Every state read and every transition in the certificate stores goes
//! through [`Filesystem`]: whether a file exists *is* state, so the
//! operations are kept narrow enough to run against a temporary directory
//! in tests.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Move/copy/exists/timestamp operations used by stores and the workspace.
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Regular files below `start` accepted by `matcher`, at most
    /// `max_depth` levels deep (children of `start` are depth 1).
    /// Sorted by path. Subdirectories that vanish mid-scan are skipped.
    fn find(
        &self,
        start: &Path,
        max_depth: usize,
        matcher: &dyn Fn(&Path) -> bool,
    ) -> io::Result<Vec<PathBuf>>;

    /// Direct subdirectories of `dir`, sorted.
    fn list_dirs(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Move `source` to `target`, replacing an existing target.
    fn move_replace(&self, source: &Path, target: &Path) -> io::Result<()>;

    /// Copy `source` to `target`, replacing an existing target.
    fn copy_replace(&self, source: &Path, target: &Path) -> io::Result<()>;

    fn create_dirs(&self, dir: &Path) -> io::Result<()>;

    /// Create an empty file; an existing file is left untouched.
    fn create_file(&self, path: &Path) -> io::Result<()>;

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()>;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Delete a file or a whole directory tree.
    fn remove_recursive(&self, path: &Path) -> io::Result<()>;

    /// Returns `false` when there was nothing to delete.
    fn remove_if_exists(&self, path: &Path) -> io::Result<bool>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Create a marker file or refresh its modification time.
    fn touch(&self, path: &Path, now: SystemTime) -> io::Result<()> {
        if !self.is_file(path) {
            self.create_file(path)?;
        }
        self.set_modified(path, now)
    }
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    fn walk(
        dir: &Path,
        depth: usize,
        max_depth: usize,
        matcher: &dyn Fn(&Path) -> bool,
        found: &mut Vec<PathBuf>,
    ) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else { continue };
            let path = entry.path();

            if file_type.is_file() {
                if matcher(&path) {
                    found.push(path);
                }
            } else if file_type.is_dir() && depth < max_depth {
                if let Err(e) = Self::walk(&path, depth + 1, max_depth, matcher, found) {
                    tracing::debug!(path = %path.display(), "Skipping unreadable directory: {e}");
                }
            }
        }
        Ok(())
    }
}

impl Filesystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn find(
        &self,
        start: &Path,
        max_depth: usize,
        matcher: &dyn Fn(&Path) -> bool,
    ) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        if max_depth > 0 {
            Self::walk(start, 1, max_depth, matcher, &mut found)?;
        }
        found.sort();
        Ok(found)
    }

    fn list_dirs(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let Ok(entry) = entry else { continue };
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn move_replace(&self, source: &Path, target: &Path) -> io::Result<()> {
        fs::rename(source, target)
    }

    fn copy_replace(&self, source: &Path, target: &Path) -> io::Result<()> {
        fs::copy(source, target).map(|_| ())
    }

    fn create_dirs(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn create_file(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map(|_| ())
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        File::options().write(true).open(path)?.set_modified(time)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn remove_recursive(&self, path: &Path) -> io::Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn remove_if_exists(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

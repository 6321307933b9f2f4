//! Single-writer lock per matrix file
//!
//! A `<matrix>.lock` file created with `create_new`; removed on drop.

use hexreach_common::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct MatrixLock {
    path: PathBuf,
}

impl MatrixLock {
    pub fn lock_path(matrix: &Path) -> PathBuf {
        let mut name = matrix.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        matrix.with_file_name(name)
    }

    /// Take the lock for `matrix`, failing with [`Error::Locked`] if held
    pub fn acquire(matrix: &Path) -> Result<Self> {
        let path = Self::lock_path(matrix);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::Locked(matrix.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let lock = Self { path };
        writeln!(file, "{}", std::process::id())?;
        Ok(lock)
    }
}

impl Drop for MatrixLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let dir = TempDir::new().unwrap();
        let matrix = dir.path().join("ca.r9.arrow");

        let lock = MatrixLock::acquire(&matrix).unwrap();
        assert!(MatrixLock::lock_path(&matrix).exists());
        assert!(matches!(MatrixLock::acquire(&matrix), Err(Error::Locked(_))));

        drop(lock);
        assert!(!MatrixLock::lock_path(&matrix).exists());
        MatrixLock::acquire(&matrix).unwrap();
    }
}

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates a directory structure if it doesn't exist.
///
/// Safe to call concurrently for the same path.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
///
/// # Example
///
/// ```no_run
/// use depot_utils::error::FileSystemResult;
/// use depot_utils::fs::ensure_dir_exists;
///
/// fn main() -> FileSystemResult<()> {
///     ensure_dir_exists("/srv/depot/crates/se/rd/serde")?;
///     Ok(())
/// }
/// ```
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    // create_dir_all tolerates another worker creating the same tree.
    fs::create_dir_all(path).map_err(|err| {
        FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        }
    })
}

/// Removes a file, ignoring it if missing.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(FileSystemError::File {
                path: path.to_path_buf(),
                action: "remove",
                source: err,
            })
        }
    }
}

/// Returns the sibling `<name>.part` path used while writing `path`.
pub fn part_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Writes `data` to `path` so that readers never observe a partial file.
///
/// The bytes land in `<path>.part` first and are renamed into place. On failure the
/// partial file is removed and `path` is left untouched.
///
/// # Errors
///
/// * [`FileSystemError::File`] if writing or renaming fails.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    let tmp = part_path(path);

    if let Err(err) = fs::write(&tmp, data) {
        let _ = safe_remove(&tmp);
        return Err(FileSystemError::File {
            path: tmp,
            action: "write",
            source: err,
        });
    }

    fs::rename(&tmp, path).map_err(|err| {
        let _ = safe_remove(&tmp);
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "rename",
            source: err,
        }
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_ensure_dir_exists_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("se").join("rd").join("serde");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());

        // second call is a no-op
        ensure_dir_exists(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists_file_collision() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(matches!(
            ensure_dir_exists(&file_path),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_safe_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        safe_remove(dir.path().join("missing.part")).unwrap();
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path("/srv/crates/se/rd/serde/serde-1.0.0.crate"),
            PathBuf::from("/srv/crates/se/rd/serde/serde-1.0.0.crate.part")
        );
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_part() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("a-0.1.0.crate");
        fs::write(&target, b"stale").unwrap();

        write_atomic(&target, b"fresh").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"fresh");
        assert!(!part_path(&target).exists());
    }

    #[test]
    fn test_write_atomic_missing_parent_fails_cleanly() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("absent").join("a-0.1.0.crate");
        let err = write_atomic(&target, b"data").unwrap_err();
        assert!(matches!(err, FileSystemError::File { action: "write", .. }));
        assert!(!target.exists());
    }
}

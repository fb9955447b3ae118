//! Sharded archive layout on disk.

use std::path::{Path, PathBuf};

use depot_utils::{
    fs::{ensure_dir_exists, write_atomic},
    hash::verify_checksum,
    path::shard_prefix,
};
use tracing::debug;

use crate::{error::ErrorContext, MirrorResult};

/// Archive storage rooted at one directory.
///
/// Each package gets its own directory under a name-derived shard:
///
/// | name length | directory |
/// |---|---|
/// | 1 | `{root}/1/{name}` |
/// | 2 | `{root}/2/{name}` |
/// | 3 | `{root}/3/{name[0]}/{name}` |
/// | 4+ | `{root}/{name[0..2]}/{name[2..4]}/{name}` |
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
    extension: String,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage root. Failure here is fatal to a download run.
    pub fn init(&self) -> MirrorResult<()> {
        ensure_dir_exists(&self.root)?;
        Ok(())
    }

    pub fn shard_dir(&self, name: &str) -> PathBuf {
        self.root.join(shard_prefix(name)).join(name)
    }

    pub fn archive_path(&self, name: &str, version: &str) -> PathBuf {
        self.shard_dir(name)
            .join(format!("{name}-{version}.{}", self.extension))
    }

    /// Writes a verified archive and returns its path.
    pub fn store(&self, name: &str, version: &str, bytes: &[u8]) -> MirrorResult<PathBuf> {
        ensure_dir_exists(self.shard_dir(name))?;
        let path = self.archive_path(name, version);
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    /// Size of an archive already on disk whose digest matches `checksum`.
    ///
    /// A file that exists but does not match is left alone and reported as absent,
    /// so it gets replaced by the next successful download.
    pub fn existing(&self, name: &str, version: &str, checksum: &str) -> MirrorResult<Option<u64>> {
        let path = self.archive_path(name, version);
        if !path.is_file() {
            return Ok(None);
        }

        if !verify_checksum(&path, checksum)? {
            debug!(path = %path.display(), "existing archive does not match, refetching");
            return Ok(None);
        }

        let size = path
            .metadata()
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len();
        Ok(Some(size))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use depot_utils::hash::sha256_hex;
    use tempfile::tempdir;

    use super::*;

    fn relative(store: &ArchiveStore, name: &str) -> String {
        store
            .shard_dir(name)
            .strip_prefix(store.root())
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_shard_layout_boundaries() {
        let store = ArchiveStore::new("/srv/crates", "crate");
        assert_eq!(relative(&store, "a"), "1/a");
        assert_eq!(relative(&store, "ab"), "2/ab");
        assert_eq!(relative(&store, "abc"), "3/a/abc");
        assert_eq!(relative(&store, "abcd"), "ab/cd/abcd");
        assert_eq!(relative(&store, "serde_json"), "se/rd/serde_json");
    }

    #[test]
    fn test_archive_path_uses_extension() {
        let store = ArchiveStore::new("/srv/crates", "tar.gz");
        assert_eq!(
            store.archive_path("serde", "1.0.0"),
            PathBuf::from("/srv/crates/se/rd/serde/serde-1.0.0.tar.gz")
        );
    }

    #[test]
    fn test_store_is_idempotent_on_directories() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(dir.path().join("crates"), "crate");
        store.init().unwrap();
        store.init().unwrap();

        let first = store.store("abc", "0.1.0", b"one").unwrap();
        let second = store.store("abc", "0.2.0", b"two").unwrap();
        assert_eq!(first.parent(), second.parent());
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert!(!dir.path().join("crates/3/a/abc/abc-0.1.0.crate.part").exists());
    }

    #[test]
    fn test_existing_requires_matching_digest() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(dir.path(), "crate");

        assert_eq!(store.existing("abc", "0.1.0", "00").unwrap(), None);

        store.store("abc", "0.1.0", b"payload").unwrap();
        let good = sha256_hex(b"payload");
        assert_eq!(store.existing("abc", "0.1.0", &good).unwrap(), Some(7));
        assert_eq!(
            store.existing("abc", "0.1.0", &good.to_uppercase()).unwrap(),
            None
        );
        assert_eq!(store.existing("abc", "0.1.0", &sha256_hex(b"other")).unwrap(), None);
    }
}

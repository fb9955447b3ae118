//! In-memory collaborators for pipeline tests.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use depot_dl::{
    api::{PackageInfo, RegistryApi, VersionInfo},
    error::{ApiError, Result as ApiResult},
};
use depot_registry::{IndexSource, RegistryError, Result as RegistryResult};
use depot_utils::{hash::sha256_hex, path::shard_prefix};

type Key = (String, String);

fn key(name: &str, version: &str) -> Key {
    (name.to_string(), version.to_string())
}

/// Registry API backed by maps. Every call is recorded.
#[derive(Default)]
pub struct FakeRegistry {
    packages: HashMap<String, PackageInfo>,
    licenses: HashMap<Key, String>,
    archives: HashMap<Key, Vec<u8>>,
    broken_versions: HashSet<Key>,
    requests: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn with_package(mut self, name: &str) -> Self {
        self.packages.insert(
            name.to_string(),
            PackageInfo {
                name: name.to_string(),
                description: Some(format!("The {name} package")),
                documentation: Some(format!("https://docs.example/{name}")),
            },
        );
        self
    }

    pub fn with_license(mut self, name: &str, version: &str, license: &str) -> Self {
        self.licenses.insert(key(name, version), license.to_string());
        self
    }

    pub fn with_archive(mut self, name: &str, version: &str, bytes: &[u8]) -> Self {
        self.archives.insert(key(name, version), bytes.to_vec());
        self
    }

    /// Makes version lookups for `name@version` fail with a 500.
    pub fn with_broken_version(mut self, name: &str, version: &str) -> Self {
        self.broken_versions.insert(key(name, version));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn archive_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|r| r.strip_prefix("archive ").map(String::from))
            .collect()
    }

    fn record(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }
}

impl RegistryApi for FakeRegistry {
    fn fetch_package_info(&self, name: &str) -> ApiResult<PackageInfo> {
        self.record(format!("package {name}"));
        self.packages.get(name).cloned().ok_or_else(|| {
            ApiError::NotFound {
                url: format!("fake://api/{name}"),
            }
        })
    }

    fn fetch_version_info(&self, name: &str, version: &str) -> ApiResult<VersionInfo> {
        self.record(format!("version {name}@{version}"));
        if self.broken_versions.contains(&key(name, version)) {
            return Err(ApiError::BadStatus {
                status: 500,
                url: format!("fake://api/{name}/{version}"),
            });
        }
        Ok(VersionInfo {
            license: self.licenses.get(&key(name, version)).cloned(),
        })
    }

    fn fetch_archive(&self, name: &str, version: &str, _checksum: &str) -> ApiResult<Vec<u8>> {
        self.record(format!("archive {name}@{version}"));
        self.archives.get(&key(name, version)).cloned().ok_or_else(|| {
            ApiError::NotFound {
                url: format!("fake://dl/{name}/{version}/download"),
            }
        })
    }
}

/// Index source whose snapshot is a prepared directory.
pub struct FakeIndexSource {
    root: PathBuf,
    revision: Option<String>,
    refreshes: AtomicUsize,
}

impl FakeIndexSource {
    pub fn new(root: &Path, revision: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            revision: Some(revision.to_string()),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// A source whose refresh always fails.
    pub fn unreachable(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            revision: None,
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

impl IndexSource for FakeIndexSource {
    fn refresh(&self) -> RegistryResult<String> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.revision.clone().ok_or_else(|| {
            RegistryError::Git {
                command: "git pull --ff-only".into(),
                stderr: "fatal: unable to access remote".into(),
            }
        })
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// One index line for `name@version` whose checksum is the digest of `payload`.
pub fn entry(name: &str, version: &str, payload: &[u8]) -> String {
    entry_with_checksum(name, version, &sha256_hex(payload), false)
}

pub fn entry_with_checksum(name: &str, version: &str, checksum: &str, yanked: bool) -> String {
    format!(
        r#"{{"name":"{name}","vers":"{version}","deps":[],"cksum":"{checksum}","features":{{}},"yanked":{yanked}}}"#
    )
}

/// Writes the index file for `name` at its sharded location under `root`.
pub fn write_index_file(root: &Path, name: &str, lines: &[String]) {
    let dir = root.join(shard_prefix(name));
    fs::create_dir_all(&dir).unwrap();
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(dir.join(name), content).unwrap();
}

/// Writes a crates.io style `config.json` at the index root.
pub fn write_index_config(root: &Path) {
    fs::create_dir_all(root).unwrap();
    fs::write(
        root.join("config.json"),
        r#"{"dl":"https://dl.example/crates","api":"https://registry.example"}"#,
    )
    .unwrap();
}

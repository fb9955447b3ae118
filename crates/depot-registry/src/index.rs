//! Index tree traversal and version record parsing.

use std::{
    fs::{self, File, ReadDir},
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    config::INDEX_CONFIG_FILE,
    error::{ErrorContext, RegistryError, Result},
};

/// One published version, as recorded on a line of an index file.
///
/// Fields the mirror does not need (dependencies, features) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    #[serde(rename = "vers")]
    pub version: String,
    #[serde(rename = "cksum")]
    pub checksum: String,
    #[serde(default)]
    pub yanked: bool,
}

impl IndexEntry {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// Streams the entries of one index file in file order.
///
/// Blank lines are skipped. A malformed line yields [`RegistryError::MalformedEntry`];
/// callers decide whether to keep reading.
pub struct EntryReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl EntryReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl Iterator for EntryReader {
    type Item = Result<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    let path = self.path.display().to_string();
                    return Some(
                        Err::<IndexEntry, _>(err).with_context(|| format!("reading {path}")),
                    );
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(IndexEntry::parse(&line).map_err(|source| {
                RegistryError::MalformedEntry {
                    path: self.path.clone(),
                    line: self.line_no,
                    source,
                }
            }));
        }
    }
}

/// Depth-first walk yielding every package file under an index root.
///
/// Hidden entries (`.git`, `.github`) and the root `config.json` are skipped.
pub struct IndexWalker {
    root: PathBuf,
    stack: Vec<ReadDir>,
}

impl IndexWalker {
    pub fn new(root: &Path) -> Result<Self> {
        let dir = fs::read_dir(root).with_context(|| format!("reading {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            stack: vec![dir],
        })
    }

    fn is_skipped(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        name.starts_with('.')
            || (name == INDEX_CONFIG_FILE && path.parent() == Some(self.root.as_path()))
    }
}

impl Iterator for IndexWalker {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(dir) = self.stack.last_mut() {
            let Some(entry) = dir.next() else {
                self.stack.pop();
                continue;
            };

            let entry = match entry.with_context(|| "walking index".to_string()) {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            let path = entry.path();
            if self.is_skipped(&path) {
                continue;
            }

            let file_type = match entry
                .file_type()
                .with_context(|| format!("inspecting {}", path.display()))
            {
                Ok(ft) => ft,
                Err(err) => return Some(Err(err)),
            };

            if file_type.is_dir() {
                match fs::read_dir(&path).with_context(|| format!("reading {}", path.display())) {
                    Ok(dir) => self.stack.push(dir),
                    Err(err) => return Some(Err(err)),
                }
            } else if file_type.is_file() {
                return Some(Ok(path));
            }
        }
        None
    }
}

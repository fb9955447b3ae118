//! Local checkout of the registry index.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use tracing::{debug, info};

use crate::error::{ErrorContext, RegistryError, Result};

/// Something that can bring a local index snapshot up to date.
pub trait IndexSource: Send + Sync {
    /// Pulls the latest snapshot and returns its revision id.
    fn refresh(&self) -> Result<String>;

    /// Directory holding the snapshot.
    fn root(&self) -> &Path;
}

/// A git clone of the index, refreshed with fast-forward pulls.
pub struct GitIndex {
    url: String,
    path: PathBuf,
}

impl GitIndex {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }

    pub fn is_cloned(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Revision currently checked out, without touching the remote.
    pub fn head(&self) -> Result<String> {
        git(Some(&self.path), &["rev-parse", "HEAD"])
    }
}

impl IndexSource for GitIndex {
    fn refresh(&self) -> Result<String> {
        if self.is_cloned() {
            info!(path = %self.path.display(), "pulling registry index");
            git(Some(&self.path), &["pull", "--rebase=false", "--ff-only"])?;
        } else {
            info!(url = %self.url, path = %self.path.display(), "cloning registry index");
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let target = self.path.to_string_lossy();
            git(None, &["clone", &self.url, &target])?;
        }

        let revision = self.head()?;
        debug!(%revision, "index at revision");
        Ok(revision)
    }

    fn root(&self) -> &Path {
        &self.path
    }
}

fn git(dir: Option<&Path>, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    cmd.args(args);

    let command = format!("git {}", args.join(" "));
    debug!(%command, "running");
    let output = cmd
        .output()
        .with_context(|| format!("executing `{command}`"))?;

    if !output.status.success() {
        return Err(RegistryError::Git {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn commit(repo: &Path, file: &str, content: &str) {
        fs::write(repo.join(file), content).unwrap();
        git(Some(repo), &["add", "."]).unwrap();
        git(
            Some(repo),
            &[
                "-c",
                "user.name=depot",
                "-c",
                "user.email=depot@localhost",
                "commit",
                "-q",
                "-m",
                file,
            ],
        )
        .unwrap();
    }

    #[test]
    fn test_clone_then_pull_reports_new_revision() {
        if !git_available() {
            return;
        }

        let dir = tempdir().unwrap();
        let origin = dir.path().join("origin");
        fs::create_dir_all(&origin).unwrap();
        git(Some(&origin), &["init", "-q"]).unwrap();
        commit(&origin, "config.json", r#"{"dl":"https://dl.example"}"#);

        let index = GitIndex::new(origin.to_string_lossy(), dir.path().join("mirror/index"));
        assert!(!index.is_cloned());

        let first = index.refresh().unwrap();
        assert!(index.is_cloned());
        assert_eq!(first, git(Some(&origin), &["rev-parse", "HEAD"]).unwrap());

        commit(&origin, "a", r#"{"name":"a","vers":"0.1.0","cksum":"00"}"#);
        let second = index.refresh().unwrap();
        assert_ne!(first, second);
        assert!(index.root().join("a").exists());
    }

    #[test]
    fn test_failed_command_carries_stderr() {
        if !git_available() {
            return;
        }

        let dir = tempdir().unwrap();
        let index = GitIndex::new("unused", dir.path());
        assert!(matches!(index.head(), Err(RegistryError::Git { .. })));
    }
}

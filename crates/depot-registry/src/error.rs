//! Error types for the registry crate.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(depot_registry::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Malformed index entry at {}:{line}: {source}", path.display())]
    #[diagnostic(
        code(depot_registry::malformed_entry),
        help("The rest of this file is skipped until the index is fixed")
    )]
    MalformedEntry {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("Invalid index config {}: {source}", path.display())]
    #[diagnostic(
        code(depot_registry::config_json),
        help("The index root must contain a config.json with a `dl` key")
    )]
    InvalidConfig {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    #[diagnostic(
        code(depot_registry::git),
        help("Check that git is installed and the index URL is reachable")
    )]
    Git { command: String, stderr: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Api(#[from] depot_dl::error::ApiError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            RegistryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = result
            .with_context(|| "reading index/se/rd/serde".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while reading index/se/rd/serde: gone");
    }

    #[test]
    fn test_malformed_entry_display() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RegistryError::MalformedEntry {
            path: PathBuf::from("3/a/abc"),
            line: 4,
            source,
        };
        assert!(err.to_string().starts_with("Malformed index entry at 3/a/abc:4:"));
    }
}

//! Error types for depot-core.

use depot_config::error::ConfigError;
use depot_db::error::DbError;
use depot_dl::error::ApiError;
use depot_registry::RegistryError;
use depot_utils::error::{FileSystemError, HashError, PathError};
use miette::Diagnostic;
use thiserror::Error;

/// Error type for mirror runs.
#[derive(Error, Diagnostic, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    #[diagnostic(
        code(depot::filesystem),
        help("Check that the archive directory is writable")
    )]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(depot::hash))]
    Hash(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(code(depot::path), help("Check the paths in your configuration"))]
    Path(#[from] PathError),

    #[error("Error while {action}")]
    #[diagnostic(code(depot::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Checksum mismatch for {name}@{version}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(depot::checksum),
        help("The registry served different bytes than the index records. The version stays pending and is retried on the next run.")
    )]
    ChecksumMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("Background task failed: {0}")]
    #[diagnostic(
        code(depot::task),
        help("This is an internal error, please report it")
    )]
    TaskFailed(String),

    #[error("Thread lock poison error")]
    #[diagnostic(
        code(depot::poison),
        help("This is an internal error, please report it")
    )]
    PoisonError,
}

impl MirrorError {
    /// Errors that invalidate the whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Db(err) => err.is_fatal(),
            Self::PoisonError | Self::TaskFailed(_) => true,
            _ => false,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MirrorError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::PoisonError
    }
}

impl From<tokio::task::JoinError> for MirrorError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, MirrorError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, MirrorError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            MirrorError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

//! Error types for depot-db.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Catalog connection failed: {0}")]
    #[diagnostic(
        code(depot_db::connection),
        help("Check that the catalog path is writable")
    )]
    Connection(String),

    #[error("Catalog query failed: {0}")]
    #[diagnostic(code(depot_db::query))]
    Query(String),

    #[error("Catalog migration failed: {0}")]
    #[diagnostic(
        code(depot_db::migration),
        help("The catalog schema may be corrupted. Move the file aside and run `depot sync` again.")
    )]
    Migration(String),

    #[error("Catalog already has this row: {0}")]
    #[diagnostic(code(depot_db::conflict))]
    Conflict(String),
}

impl DbError {
    /// A lost or unusable connection, as opposed to a failure of one statement.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DbError::Connection(_) | DbError::Migration(_))
    }
}

impl From<DieselError> for DbError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DbError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                DbError::Connection(info.message().to_string())
            }
            DieselError::DatabaseError(_, info) => DbError::Query(info.message().to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<diesel::result::ConnectionError> for DbError {
    fn from(err: diesel::result::ConnectionError) -> Self {
        DbError::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

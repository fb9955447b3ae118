//! Shared catalog handle.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use depot_db::{connection::DbConnection, error::DbError};
use depot_utils::fs::ensure_dir_exists;
use diesel::{QueryResult, SqliteConnection};
use tracing::debug;

use crate::{error::MirrorError, MirrorResult};

/// Thread-safe wrapper around the catalog connections.
///
/// Clones share the same connections. The catalog writer applies every mutation through
/// [`with_conn`](CatalogDb::with_conn); worker tasks do their lookups through
/// [`with_reader`](CatalogDb::with_reader). A file-backed catalog gives readers their
/// own WAL connection, so lookups do not queue behind writer commits. An in-memory
/// catalog is private to one connection and serves both roles.
#[derive(Clone)]
pub struct CatalogDb {
    conn: Arc<Mutex<DbConnection>>,
    reader: Arc<Mutex<DbConnection>>,
}

impl CatalogDb {
    /// Opens the catalog at `path`, creating its directory and schema on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> MirrorResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir_exists(parent)?;
        }
        debug!(path = %path.display(), "opening catalog");
        let conn = DbConnection::open(path)?;
        let reader = DbConnection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    pub fn open_in_memory() -> MirrorResult<Self> {
        let conn = Arc::new(Mutex::new(DbConnection::open_in_memory()?));
        Ok(Self {
            reader: conn.clone(),
            conn,
        })
    }

    /// Locks the write connection and returns the guard.
    pub fn conn(&self) -> MirrorResult<MutexGuard<'_, DbConnection>> {
        self.conn.lock().map_err(|_| MirrorError::PoisonError)
    }

    /// Executes a function with the write connection.
    pub fn with_conn<F, T>(&self, f: F) -> MirrorResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> QueryResult<T>,
    {
        let mut conn = self.conn()?;
        f(conn.conn()).map_err(|err| MirrorError::Db(DbError::from(err)))
    }

    /// Executes a read-only function with the read connection.
    pub fn with_reader<F, T>(&self, f: F) -> MirrorResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> QueryResult<T>,
    {
        let mut conn = self.reader.lock().map_err(|_| MirrorError::PoisonError)?;
        f(conn.conn()).map_err(|err| MirrorError::Db(DbError::from(err)))
    }
}

#[cfg(test)]
mod tests {
    use depot_db::{models::catalog::NewPackage, repository::catalog::CatalogRepository};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state/nested/catalog.db");

        let db = CatalogDb::open(&path).unwrap();
        assert!(path.exists());
        assert!(!db
            .with_conn(|conn| CatalogRepository::package_exists(conn, "serde"))
            .unwrap());
    }

    #[test]
    fn test_clones_share_connection() {
        let db = CatalogDb::open_in_memory().unwrap();
        let other = db.clone();

        db.with_conn(|conn| {
            CatalogRepository::upsert_package(
                conn,
                &NewPackage {
                    name: "serde",
                    description: None,
                    documentation: None,
                },
            )
        })
        .unwrap();

        assert!(other
            .with_conn(|conn| CatalogRepository::package_exists(conn, "serde"))
            .unwrap());
    }

    #[test]
    fn test_reader_is_not_blocked_by_writer_lock() {
        let dir = tempdir().unwrap();
        let db = CatalogDb::open(dir.path().join("catalog.db")).unwrap();

        db.with_conn(|conn| {
            CatalogRepository::upsert_package(
                conn,
                &NewPackage {
                    name: "abc",
                    description: None,
                    documentation: None,
                },
            )
        })
        .unwrap();

        let _writer = db.conn().unwrap();
        assert!(db
            .with_reader(|conn| CatalogRepository::package_exists(conn, "abc"))
            .unwrap());
    }

    #[test]
    fn test_in_memory_reader_sees_writes() {
        let db = CatalogDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            CatalogRepository::upsert_package(
                conn,
                &NewPackage {
                    name: "abc",
                    description: None,
                    documentation: None,
                },
            )
        })
        .unwrap();

        assert!(db
            .with_reader(|conn| CatalogRepository::package_exists(conn, "abc"))
            .unwrap());
    }
}

//! Catalog connection management.

use std::path::Path;

use diesel::{sql_query, Connection, RunQueryDsl, SqliteConnection};

use crate::{
    error::{DbError, Result},
    migration::apply_migrations,
};

/// Catalog connection wrapper with migration support.
pub struct DbConnection {
    conn: SqliteConnection,
}

impl DbConnection {
    /// Opens the catalog at `path`, creating the schema on first use.
    ///
    /// # Errors
    ///
    /// * [`DbError::Connection`] if the file cannot be opened
    /// * [`DbError::Migration`] if the schema cannot be applied
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let mut conn = SqliteConnection::establish(&path_str)?;

        // WAL lets the producer's reads proceed while the writer commits.
        for pragma in ["PRAGMA journal_mode = WAL;", "PRAGMA busy_timeout = 5000;"] {
            sql_query(pragma)
                .execute(&mut conn)
                .map_err(|e| DbError::Connection(e.to_string()))?;
        }

        apply_migrations(&mut conn).map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Opens a private in-memory catalog.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = SqliteConnection::establish(":memory:")?;
        apply_migrations(&mut conn).map_err(|e| DbError::Migration(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl std::ops::Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use diesel::connection::SimpleConnection;
    use tempfile::tempdir;

    use super::*;
    use crate::repository::catalog::CatalogRepository;

    #[test]
    fn test_open_creates_schema_and_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        {
            let mut db = DbConnection::open(&path).unwrap();
            CatalogRepository::record_sync(db.conn(), "abc123", "2025-06-01T00:00:00Z").unwrap();
        }

        let mut db = DbConnection::open(&path).unwrap();
        let latest = CatalogRepository::latest_sync(db.conn()).unwrap().unwrap();
        assert_eq!(latest.revision, "abc123");
    }

    #[test]
    fn test_open_adopts_tables_created_outside_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        {
            let mut conn = SqliteConnection::establish(&path.to_string_lossy()).unwrap();
            conn.batch_execute(include_str!(
                "../migrations/catalog/2025-06-01-000000_create_catalog/up.sql"
            ))
            .unwrap();
        }

        let mut db = DbConnection::open(&path).unwrap();
        assert_eq!(CatalogRepository::stats(db.conn()).unwrap().versions, 0);
    }
}

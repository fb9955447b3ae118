//! Catalog repository: packages, versions and sync history.

use std::collections::HashSet;

use diesel::{dsl::exists, prelude::*, upsert::excluded};

use crate::{
    models::catalog::{
        CatalogStats, NewPackage, NewPackageVersion, NewSyncRecord, PackageVersion,
        PendingVersion, SyncRecord,
    },
    schema::catalog::{package_versions, packages, sync_history},
};

/// Repository for catalog operations.
///
/// Package names compare case-insensitively (the columns are `COLLATE NOCASE`).
pub struct CatalogRepository;

impl CatalogRepository {
    /// Checks if a package is already registered.
    pub fn package_exists(conn: &mut SqliteConnection, name: &str) -> QueryResult<bool> {
        diesel::select(exists(packages::table.filter(packages::name.eq(name)))).get_result(conn)
    }

    /// Returns every version string recorded for `name`.
    pub fn known_versions(conn: &mut SqliteConnection, name: &str) -> QueryResult<HashSet<String>> {
        let versions: Vec<String> = package_versions::table
            .filter(package_versions::name.eq(name))
            .select(package_versions::version)
            .load(conn)?;
        Ok(versions.into_iter().collect())
    }

    /// Inserts a package or refreshes its description and documentation.
    pub fn upsert_package(conn: &mut SqliteConnection, package: &NewPackage) -> QueryResult<usize> {
        diesel::insert_into(packages::table)
            .values(package)
            .on_conflict(packages::name)
            .do_update()
            .set((
                packages::description.eq(excluded(packages::description)),
                packages::documentation.eq(excluded(packages::documentation)),
            ))
            .execute(conn)
    }

    /// Inserts a new version row with `downloaded = false`.
    ///
    /// Fails with a unique violation if `(name, version)` already exists.
    pub fn insert_version(
        conn: &mut SqliteConnection,
        version: &NewPackageVersion,
    ) -> QueryResult<usize> {
        diesel::insert_into(package_versions::table)
            .values(version)
            .execute(conn)
    }

    /// Lists versions whose archive has not been retrieved, in insertion order.
    pub fn pending_versions(
        conn: &mut SqliteConnection,
        include_yanked: bool,
    ) -> QueryResult<Vec<PendingVersion>> {
        let mut query = package_versions::table
            .filter(package_versions::downloaded.eq(false))
            .into_boxed();

        if !include_yanked {
            query = query.filter(package_versions::yanked.eq(false));
        }

        query
            .order(package_versions::id.asc())
            .select(PendingVersion::as_select())
            .load(conn)
    }

    /// Records a successful retrieval.
    ///
    /// Only pending rows are touched, so a downloaded row never changes again.
    /// Returns the number of rows updated (0 or 1).
    pub fn mark_downloaded(
        conn: &mut SqliteConnection,
        name: &str,
        version: &str,
        size: i64,
        timestamp: &str,
    ) -> QueryResult<usize> {
        diesel::update(
            package_versions::table
                .filter(package_versions::name.eq(name))
                .filter(package_versions::version.eq(version))
                .filter(package_versions::downloaded.eq(false)),
        )
        .set((
            package_versions::downloaded.eq(true),
            package_versions::size.eq(size),
            package_versions::last_update.eq(timestamp),
        ))
        .execute(conn)
    }

    pub fn find_version(
        conn: &mut SqliteConnection,
        name: &str,
        version: &str,
    ) -> QueryResult<Option<PackageVersion>> {
        package_versions::table
            .filter(package_versions::name.eq(name))
            .filter(package_versions::version.eq(version))
            .select(PackageVersion::as_select())
            .first(conn)
            .optional()
    }

    /// Lists every downloaded version.
    pub fn downloaded_versions(conn: &mut SqliteConnection) -> QueryResult<Vec<PackageVersion>> {
        package_versions::table
            .filter(package_versions::downloaded.eq(true))
            .select(PackageVersion::as_select())
            .load(conn)
    }

    /// Appends an entry to the sync history.
    pub fn record_sync(
        conn: &mut SqliteConnection,
        revision: &str,
        timestamp: &str,
    ) -> QueryResult<usize> {
        diesel::insert_into(sync_history::table)
            .values(&NewSyncRecord {
                revision,
                synced_at: timestamp,
            })
            .execute(conn)
    }

    pub fn latest_sync(conn: &mut SqliteConnection) -> QueryResult<Option<SyncRecord>> {
        sync_history::table
            .order(sync_history::id.desc())
            .select(SyncRecord::as_select())
            .first(conn)
            .optional()
    }

    pub fn stats(conn: &mut SqliteConnection) -> QueryResult<CatalogStats> {
        let packages: i64 = packages::table.count().get_result(conn)?;
        let versions: i64 = package_versions::table.count().get_result(conn)?;
        let downloaded: i64 = package_versions::table
            .filter(package_versions::downloaded.eq(true))
            .count()
            .get_result(conn)?;
        let yanked: i64 = package_versions::table
            .filter(package_versions::yanked.eq(true))
            .count()
            .get_result(conn)?;

        Ok(CatalogStats {
            packages,
            versions,
            downloaded,
            pending: versions - downloaded,
            yanked,
        })
    }
}

#[cfg(test)]
mod tests {
    use diesel::result::{DatabaseErrorKind, Error};

    use super::*;
    use crate::connection::DbConnection;

    fn catalog() -> DbConnection {
        DbConnection::open_in_memory().unwrap()
    }

    fn new_version<'a>(name: &'a str, version: &'a str, yanked: bool) -> NewPackageVersion<'a> {
        NewPackageVersion {
            name,
            version,
            checksum: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            yanked,
            license: Some("MIT"),
        }
    }

    #[test]
    fn test_upsert_package_is_idempotent_and_case_insensitive() {
        let mut db = catalog();
        let conn = db.conn();

        assert!(!CatalogRepository::package_exists(conn, "serde").unwrap());

        let pkg = NewPackage {
            name: "Serde",
            description: Some("first"),
            documentation: None,
        };
        CatalogRepository::upsert_package(conn, &pkg).unwrap();

        let pkg = NewPackage {
            name: "Serde",
            description: Some("second"),
            documentation: Some("https://docs.rs/serde"),
        };
        CatalogRepository::upsert_package(conn, &pkg).unwrap();

        assert!(CatalogRepository::package_exists(conn, "serde").unwrap());
        assert_eq!(CatalogRepository::stats(conn).unwrap().packages, 1);

        let stored: (Option<String>, Option<String>) = packages::table
            .select((packages::description, packages::documentation))
            .first(conn)
            .unwrap();
        assert_eq!(stored.0.as_deref(), Some("second"));
        assert_eq!(stored.1.as_deref(), Some("https://docs.rs/serde"));
    }

    #[test]
    fn test_insert_version_conflict() {
        let mut db = catalog();
        let conn = db.conn();

        CatalogRepository::insert_version(conn, &new_version("Inflector", "0.1.0", false))
            .unwrap();
        let err =
            CatalogRepository::insert_version(conn, &new_version("inflector", "0.1.0", false))
                .unwrap_err();
        assert!(matches!(
            err,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
        ));

        let known = CatalogRepository::known_versions(conn, "inflector").unwrap();
        assert_eq!(known, HashSet::from(["0.1.0".to_string()]));
    }

    #[test]
    fn test_pending_versions_yanked_filter_and_order() {
        let mut db = catalog();
        let conn = db.conn();

        CatalogRepository::insert_version(conn, &new_version("a", "0.1.0", false)).unwrap();
        CatalogRepository::insert_version(conn, &new_version("a", "0.2.0", true)).unwrap();
        CatalogRepository::insert_version(conn, &new_version("b", "1.0.0", false)).unwrap();

        let all = CatalogRepository::pending_versions(conn, true).unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|v| format!("{}@{}", v.name, v.version))
            .collect();
        assert_eq!(names, ["a@0.1.0", "a@0.2.0", "b@1.0.0"]);

        let unyanked = CatalogRepository::pending_versions(conn, false).unwrap();
        assert_eq!(unyanked.len(), 2);
        assert!(unyanked.iter().all(|v| !v.yanked));
    }

    #[test]
    fn test_mark_downloaded_is_monotonic() {
        let mut db = catalog();
        let conn = db.conn();

        CatalogRepository::insert_version(conn, &new_version("a", "0.1.0", false)).unwrap();

        let updated =
            CatalogRepository::mark_downloaded(conn, "a", "0.1.0", 42, "2025-06-01T00:00:00Z")
                .unwrap();
        assert_eq!(updated, 1);

        // a second success must not rewrite size or timestamp
        let updated =
            CatalogRepository::mark_downloaded(conn, "a", "0.1.0", 7, "2030-01-01T00:00:00Z")
                .unwrap();
        assert_eq!(updated, 0);

        let row = CatalogRepository::find_version(conn, "a", "0.1.0")
            .unwrap()
            .unwrap();
        assert!(row.downloaded);
        assert_eq!(row.size, 42);
        assert_eq!(row.last_update.as_deref(), Some("2025-06-01T00:00:00Z"));

        assert!(CatalogRepository::pending_versions(conn, true)
            .unwrap()
            .is_empty());
        assert_eq!(CatalogRepository::downloaded_versions(conn).unwrap().len(), 1);
    }

    #[test]
    fn test_mark_downloaded_unknown_row_is_noop() {
        let mut db = catalog();
        let updated =
            CatalogRepository::mark_downloaded(db.conn(), "ghost", "1.0.0", 1, "now").unwrap();
        assert_eq!(updated, 0);
    }

    #[test]
    fn test_sync_history_latest_and_stats() {
        let mut db = catalog();
        let conn = db.conn();

        assert!(CatalogRepository::latest_sync(conn).unwrap().is_none());
        CatalogRepository::record_sync(conn, "rev1", "2025-06-01T00:00:00Z").unwrap();
        CatalogRepository::record_sync(conn, "rev2", "2025-06-02T00:00:00Z").unwrap();
        assert_eq!(
            CatalogRepository::latest_sync(conn).unwrap().unwrap().revision,
            "rev2"
        );

        CatalogRepository::insert_version(conn, &new_version("a", "0.1.0", true)).unwrap();
        CatalogRepository::insert_version(conn, &new_version("a", "0.2.0", false)).unwrap();
        CatalogRepository::mark_downloaded(conn, "a", "0.2.0", 10, "t").unwrap();

        let stats = CatalogRepository::stats(conn).unwrap();
        assert_eq!(
            stats,
            CatalogStats {
                packages: 0,
                versions: 2,
                downloaded: 1,
                pending: 1,
                yanked: 1,
            }
        );
    }
}

use diesel::prelude::*;

use crate::schema::catalog::*;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = packages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Package {
    pub name: String,
    pub description: Option<String>,
    pub documentation: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = packages)]
pub struct NewPackage<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub documentation: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = package_versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PackageVersion {
    pub id: i32,
    pub name: String,
    pub version: String,
    pub size: i64,
    pub checksum: String,
    pub yanked: bool,
    pub downloaded: bool,
    pub license: Option<String>,
    pub last_update: Option<String>,
}

/// A freshly discovered version; `downloaded` and `size` take their column defaults.
#[derive(Insertable)]
#[diesel(table_name = package_versions)]
pub struct NewPackageVersion<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub checksum: &'a str,
    pub yanked: bool,
    pub license: Option<&'a str>,
}

/// A version whose archive has not been retrieved yet.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = package_versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PendingVersion {
    pub name: String,
    pub version: String,
    pub checksum: String,
    pub yanked: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sync_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncRecord {
    pub id: i32,
    pub revision: String,
    pub synced_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = sync_history)]
pub struct NewSyncRecord<'a> {
    pub revision: &'a str,
    pub synced_at: &'a str,
}

/// Aggregate counts shown by `depot status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub packages: i64,
    pub versions: i64,
    pub downloaded: i64,
    pub pending: i64,
    pub yanked: i64,
}

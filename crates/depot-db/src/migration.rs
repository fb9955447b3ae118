use std::error::Error;

use diesel::{sql_query, RunQueryDsl, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::debug;

pub const CATALOG_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/catalog");

/// Applies pending catalog migrations.
///
/// A catalog whose tables were created outside the migration harness reports
/// "already exists"; the offending migration is then marked as applied and the loop retries.
pub fn apply_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    loop {
        match conn.run_pending_migrations(CATALOG_MIGRATIONS) {
            Ok(applied) => {
                for version in applied {
                    debug!(%version, "applied catalog migration");
                }
                break;
            }
            Err(e) if e.to_string().contains("already exists") => {
                mark_first_pending(conn)?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn mark_first_pending(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let pending = conn.pending_migrations(CATALOG_MIGRATIONS)?;
    let Some(first) = pending.first() else {
        return Ok(());
    };

    debug!(version = %first.name().version(), "marking pre-existing migration as applied");
    sql_query("INSERT INTO __diesel_schema_migrations (version) VALUES (?1)")
        .bind::<diesel::sql_types::Text, _>(first.name().version().to_string())
        .execute(conn)?;

    Ok(())
}

use depot_config::config::Config;
use depot_core::{database::CatalogDb, MirrorResult};
use depot_db::{
    models::catalog::{CatalogStats, SyncRecord},
    repository::catalog::CatalogRepository,
};
use nu_ansi_term::Color::{Blue, Cyan, Green, LightRed, Yellow};
use serde_json::json;
use tracing::info;

use crate::utils::{Colored, Icons};

fn status_json(stats: &CatalogStats, last_sync: Option<&SyncRecord>) -> serde_json::Value {
    json!({
        "packages": stats.packages,
        "versions": stats.versions,
        "downloaded": stats.downloaded,
        "pending": stats.pending,
        "yanked": stats.yanked,
        "last_sync": last_sync.map(|record| json!({
            "revision": record.revision,
            "synced_at": record.synced_at,
        })),
    })
}

pub fn display_status(config: &Config, as_json: bool) -> MirrorResult<()> {
    let db = CatalogDb::open(config.get_db_path()?)?;
    let (stats, last_sync) = db.with_conn(|conn| {
        Ok((
            CatalogRepository::stats(conn)?,
            CatalogRepository::latest_sync(conn)?,
        ))
    })?;

    if as_json {
        println!("{}", status_json(&stats, last_sync.as_ref()));
        return Ok(());
    }

    info!(
        "{} {} packages, {} versions",
        Icons::PACKAGE,
        Colored(Blue, stats.packages),
        Colored(Blue, stats.versions)
    );
    info!(
        "{} {} downloaded, {} pending, {} yanked",
        Icons::SIZE,
        Colored(Green, stats.downloaded),
        Colored(Yellow, stats.pending),
        Colored(LightRed, stats.yanked)
    );
    match last_sync {
        Some(record) => {
            info!(
                "{} index at {} (synced {})",
                Icons::ARROW,
                Colored(Cyan, &record.revision),
                record.synced_at
            )
        }
        None => info!("{} index never synced", Icons::WARNING),
    }

    Ok(())
}

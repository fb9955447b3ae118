//! Single-writer funnel for catalog mutations.

use chrono::Utc;
use depot_db::{
    models::catalog::{NewPackage, NewPackageVersion},
    repository::catalog::CatalogRepository,
};
use diesel::{QueryResult, SqliteConnection};
use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use crate::{database::CatalogDb, MirrorResult};

/// A mutation queued by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWrite {
    UpsertPackage {
        name: String,
        description: Option<String>,
        documentation: Option<String>,
    },
    InsertVersion {
        name: String,
        version: String,
        checksum: String,
        yanked: bool,
        license: Option<String>,
    },
    /// Stamped with the time the writer applies it.
    MarkDownloaded {
        name: String,
        version: String,
        size: u64,
    },
}

impl CatalogWrite {
    fn apply(&self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        match self {
            CatalogWrite::UpsertPackage {
                name,
                description,
                documentation,
            } => {
                CatalogRepository::upsert_package(
                    conn,
                    &NewPackage {
                        name,
                        description: description.as_deref(),
                        documentation: documentation.as_deref(),
                    },
                )
            }
            CatalogWrite::InsertVersion {
                name,
                version,
                checksum,
                yanked,
                license,
            } => {
                CatalogRepository::insert_version(
                    conn,
                    &NewPackageVersion {
                        name,
                        version,
                        checksum,
                        yanked: *yanked,
                        license: license.as_deref(),
                    },
                )
            }
            CatalogWrite::MarkDownloaded {
                name,
                version,
                size,
            } => {
                let size = i64::try_from(*size).unwrap_or(i64::MAX);
                let timestamp = Utc::now().to_rfc3339();
                CatalogRepository::mark_downloaded(conn, name, version, size, &timestamp)
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            CatalogWrite::UpsertPackage { name, .. } => format!("upsert package {name}"),
            CatalogWrite::InsertVersion { name, version, .. } => {
                format!("insert {name}@{version}")
            }
            CatalogWrite::MarkDownloaded { name, version, .. } => {
                format!("mark {name}@{version} downloaded")
            }
        }
    }
}

/// Counters for one writer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub applied: u64,
    pub failed: u64,
}

/// Handle used by workers to queue writes.
pub type WriteSender = UnboundedSender<CatalogWrite>;

/// Owns the only task that mutates the catalog during a stage.
///
/// Writes are applied in the order they are received. A failed write is logged and
/// counted; a lost connection stops the writer and is returned from
/// [`finish`](Self::finish).
pub struct CatalogWriter {
    sender: WriteSender,
    task: JoinHandle<MirrorResult<WriterStats>>,
}

impl CatalogWriter {
    pub fn spawn(db: CatalogDb) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<CatalogWrite>();

        let task = tokio::task::spawn_blocking(move || {
            let mut stats = WriterStats::default();
            while let Some(write) = receiver.blocking_recv() {
                match db.with_conn(|conn| write.apply(conn)) {
                    Ok(_) => stats.applied += 1,
                    Err(err) if err.is_fatal() => {
                        error!("catalog writer stopped on {}: {err}", write.describe());
                        return Err(err);
                    }
                    Err(err) => {
                        warn!("failed to {}: {err}", write.describe());
                        stats.failed += 1;
                    }
                }
            }
            debug!(
                applied = stats.applied,
                failed = stats.failed,
                "catalog writer drained"
            );
            Ok(stats)
        });

        Self { sender, task }
    }

    pub fn sender(&self) -> WriteSender {
        self.sender.clone()
    }

    /// Closes the queue and waits for every queued write to be applied.
    ///
    /// Senders handed out by [`sender`](Self::sender) must be dropped first, or this
    /// waits for them.
    pub async fn finish(self) -> MirrorResult<WriterStats> {
        drop(self.sender);
        self.task.await?
    }
}

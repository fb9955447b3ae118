//! Download engine: fills in the archives of pending catalog rows.

use std::sync::Arc;

use depot_config::config::Config;
use depot_db::{models::catalog::PendingVersion, repository::catalog::CatalogRepository};
use depot_dl::api::RegistryApi;
use depot_events::{EventSinkHandle, MirrorEvent, Stage};
use depot_utils::hash::{checksum_matches, sha256_hex};
use tracing::{debug, error, info, trace, warn};

use crate::{
    database::CatalogDb,
    error::MirrorError,
    pool::WorkerPool,
    storage::ArchiveStore,
    types::{DownloadOutcome, DownloadReport},
    writer::{CatalogWrite, CatalogWriter, WriteSender},
    MirrorResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    pub workers: usize,
    /// Also fetch versions the index marks as yanked.
    pub include_yanked: bool,
}

impl DownloadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers(),
            include_yanked: config.download_yanked(),
        }
    }
}

pub struct Downloader {
    db: CatalogDb,
    api: Arc<dyn RegistryApi>,
    store: ArchiveStore,
    events: EventSinkHandle,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new(
        db: CatalogDb,
        api: Arc<dyn RegistryApi>,
        store: ArchiveStore,
        events: EventSinkHandle,
        options: DownloadOptions,
    ) -> Self {
        Self {
            db,
            api,
            store,
            events,
            options,
        }
    }

    /// Downloads every pending version.
    ///
    /// The pending set is loaded up front so no read cursor stays open while the writer
    /// commits. Failing to create the storage root or to read the pending set aborts the
    /// run; anything that goes wrong with a single version is logged and the version
    /// stays pending.
    pub async fn run(&self) -> MirrorResult<DownloadReport> {
        self.store.init()?;

        let include_yanked = self.options.include_yanked;
        let pending = self
            .db
            .with_conn(|conn| CatalogRepository::pending_versions(conn, include_yanked))?;

        info!(
            pending = pending.len(),
            root = %self.store.root().display(),
            "downloading archives"
        );
        self.events.emit(MirrorEvent::StageStarted {
            stage: Stage::Download,
            total: Some(pending.len() as u64),
        });

        let mut report = DownloadReport {
            pending: pending.len() as u64,
            ..Default::default()
        };

        let writer = CatalogWriter::spawn(self.db.clone());
        let ctx = Arc::new(ArchiveContext {
            api: self.api.clone(),
            store: self.store.clone(),
            events: self.events.clone(),
            writes: writer.sender(),
        });

        let mut pool = WorkerPool::new(self.options.workers);
        for version in pending {
            let ctx = ctx.clone();
            pool.submit(move || ctx.fetch(version)).await?;
        }

        let outcomes = pool.join().await;
        // Jobs lost to a panic never reported back.
        report.failed += report.pending - outcomes.len() as u64;
        for outcome in outcomes {
            report.add(outcome);
        }
        drop(ctx);
        report.writes = writer.finish().await?;

        self.events.emit(MirrorEvent::StageFinished {
            stage: Stage::Download,
        });
        info!(
            stored = report.stored,
            reused = report.reused,
            mismatched = report.mismatched,
            failed = report.failed,
            "downloads finished"
        );
        Ok(report)
    }
}

struct ArchiveContext {
    api: Arc<dyn RegistryApi>,
    store: ArchiveStore,
    events: EventSinkHandle,
    writes: WriteSender,
}

impl ArchiveContext {
    fn fail(&self, version: &PendingVersion, reason: String) -> DownloadOutcome {
        self.events.emit(MirrorEvent::ItemFailed {
            stage: Stage::Download,
            name: version.name.clone(),
            version: Some(version.version.clone()),
            reason,
        });
        DownloadOutcome::Failed
    }

    fn mark_downloaded(&self, version: &PendingVersion, size: u64) -> bool {
        self.writes
            .send(CatalogWrite::MarkDownloaded {
                name: version.name.clone(),
                version: version.version.clone(),
                size,
            })
            .is_ok()
    }

    fn fetch(&self, pending: PendingVersion) -> DownloadOutcome {
        let PendingVersion {
            name,
            version,
            checksum,
            ..
        } = &pending;

        match self.store.existing(name, version, checksum) {
            Ok(Some(size)) => {
                debug!(%name, %version, "archive already on disk");
                if !self.mark_downloaded(&pending, size) {
                    return self.fail(&pending, "catalog writer stopped".into());
                }
                self.events.emit(MirrorEvent::ArchiveReused {
                    name: name.clone(),
                    version: version.clone(),
                    size,
                });
                return DownloadOutcome::Reused { size };
            }
            Ok(None) => {}
            Err(err) => debug!(%name, %version, "could not check existing archive: {err}"),
        }

        let bytes = match self.api.fetch_archive(name, version, checksum) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%name, %version, "download failed: {err}");
                return self.fail(&pending, err.to_string());
            }
        };

        let actual = sha256_hex(&bytes);
        if !checksum_matches(&actual, checksum) {
            let err = MirrorError::ChecksumMismatch {
                name: name.clone(),
                version: version.clone(),
                expected: checksum.clone(),
                actual: actual.clone(),
            };
            error!("{err}");
            trace!(body = %String::from_utf8_lossy(&bytes), "mismatched response body");
            self.events.emit(MirrorEvent::ChecksumMismatch {
                name: name.clone(),
                version: version.clone(),
                expected: checksum.clone(),
                actual,
            });
            return DownloadOutcome::Mismatched;
        }

        let path = match self.store.store(name, version, &bytes) {
            Ok(path) => path,
            Err(err) => {
                error!(%name, %version, "failed to store archive: {err}");
                return self.fail(&pending, err.to_string());
            }
        };

        let size = bytes.len() as u64;
        if !self.mark_downloaded(&pending, size) {
            return self.fail(&pending, "catalog writer stopped".into());
        }
        debug!(path = %path.display(), size, "stored archive");
        self.events.emit(MirrorEvent::ArchiveStored {
            name: name.clone(),
            version: version.clone(),
            size,
        });
        DownloadOutcome::Stored { size }
    }
}

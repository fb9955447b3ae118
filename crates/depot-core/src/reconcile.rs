//! Brings the catalog up to date with the index.
//!
//! Every package file under the index root becomes one pool job. A job only reads the
//! catalog; the rows it discovers are queued on a [`CatalogWriter`], which is drained
//! before [`Reconciler::run`] returns.

use std::{collections::HashSet, path::Path, sync::Arc};

use depot_config::config::Config;
use depot_db::repository::catalog::CatalogRepository;
use depot_dl::api::RegistryApi;
use depot_events::{EventSinkHandle, MirrorEvent, Stage};
use depot_registry::{EntryReader, IndexWalker};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    database::CatalogDb,
    pool::WorkerPool,
    types::{FileOutcome, FileStatus, ReconcileReport},
    writer::{CatalogWrite, CatalogWriter, WriteSender},
    MirrorResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub workers: usize,
    /// Look up each new version's license.
    pub fetch_licenses: bool,
}

impl ReconcileOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers(),
            fetch_licenses: config.fetch_licenses(),
        }
    }
}

pub struct Reconciler {
    db: CatalogDb,
    api: Arc<dyn RegistryApi>,
    events: EventSinkHandle,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        db: CatalogDb,
        api: Arc<dyn RegistryApi>,
        events: EventSinkHandle,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            db,
            api,
            events,
            options,
        }
    }

    /// Reconciles every package file under `index_root`.
    ///
    /// Per-file failures are logged and counted. The run fails only when the index
    /// root cannot be read or the catalog connection is lost.
    pub async fn run(&self, index_root: &Path) -> MirrorResult<ReconcileReport> {
        info!(root = %index_root.display(), "reconciling index");
        let root = index_root.to_path_buf();
        let walker = tokio::task::spawn_blocking(move || IndexWalker::new(&root)).await??;

        self.events.emit(MirrorEvent::StageStarted {
            stage: Stage::Reconcile,
            total: None,
        });

        let writer = CatalogWriter::spawn(self.db.clone());
        let ctx = Arc::new(FileContext {
            db: self.db.clone(),
            api: self.api.clone(),
            events: self.events.clone(),
            writes: writer.sender(),
            fetch_licenses: self.options.fetch_licenses,
        });

        // The walk reads directories, so it runs on the blocking pool and hands
        // package files over as it finds them.
        let (paths_tx, mut paths) = mpsc::unbounded_channel();
        let walk = tokio::task::spawn_blocking(move || {
            for path in walker {
                if paths_tx.send(path).is_err() {
                    break;
                }
            }
        });

        let mut report = ReconcileReport::default();
        let mut pool = WorkerPool::new(self.options.workers);
        while let Some(path) = paths.recv().await {
            let path = match path {
                Ok(path) => path,
                Err(err) => {
                    warn!("skipping unreadable index entry: {err}");
                    report.failed_files += 1;
                    continue;
                }
            };
            let ctx = ctx.clone();
            pool.submit(move || ctx.reconcile_file(&path)).await?;
        }
        walk.await?;

        for outcome in pool.join().await {
            report.add(outcome);
        }
        drop(ctx);
        report.writes = writer.finish().await?;

        self.events.emit(MirrorEvent::StageFinished {
            stage: Stage::Reconcile,
        });
        info!(
            files = report.files,
            packages = report.packages_registered,
            versions = report.versions_recorded,
            "reconciliation finished"
        );
        Ok(report)
    }
}

struct FileContext {
    db: CatalogDb,
    api: Arc<dyn RegistryApi>,
    events: EventSinkHandle,
    writes: WriteSender,
    fetch_licenses: bool,
}

impl FileContext {
    fn fail(&self, name: &str, version: Option<&str>, reason: String) {
        self.events.emit(MirrorEvent::ItemFailed {
            stage: Stage::Reconcile,
            name: name.to_string(),
            version: version.map(String::from),
            reason,
        });
    }

    fn reconcile_file(&self, path: &Path) -> FileOutcome {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let reader = match EntryReader::open(path) {
            Ok(reader) => reader,
            Err(err) => {
                warn!("{err}");
                self.fail(&name, None, err.to_string());
                return FileOutcome::new(FileStatus::Failed);
            }
        };

        let mut outcome = FileOutcome::new(FileStatus::Complete);

        let exists = match self
            .db
            .with_reader(|conn| CatalogRepository::package_exists(conn, &name))
        {
            Ok(exists) => exists,
            Err(err) => {
                warn!(%name, "catalog lookup failed: {err}");
                self.fail(&name, None, err.to_string());
                return FileOutcome::new(FileStatus::Failed);
            }
        };

        if !exists {
            let info = match self.api.fetch_package_info(&name) {
                Ok(info) => info,
                Err(err) => {
                    warn!(%name, "skipping package, metadata lookup failed: {err}");
                    self.fail(&name, None, err.to_string());
                    return FileOutcome::new(FileStatus::Skipped);
                }
            };
            debug!(name = %info.name, "registering package");
            let write = CatalogWrite::UpsertPackage {
                name: info.name.clone(),
                description: info.description,
                documentation: info.documentation,
            };
            if self.writes.send(write).is_err() {
                return FileOutcome::new(FileStatus::Failed);
            }
            outcome.registered = true;
            self.events
                .emit(MirrorEvent::PackageRegistered { name: info.name });
        }

        let mut known: HashSet<String> = match self
            .db
            .with_reader(|conn| CatalogRepository::known_versions(conn, &name))
        {
            Ok(known) => known,
            Err(err) => {
                warn!(%name, "catalog lookup failed: {err}");
                self.fail(&name, None, err.to_string());
                outcome.status = FileStatus::Failed;
                return outcome;
            }
        };

        for entry in reader {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("{err}");
                    self.fail(&name, None, err.to_string());
                    outcome.status = FileStatus::Malformed;
                    return outcome;
                }
            };

            if known.contains(&entry.version) {
                continue;
            }

            let license = if self.fetch_licenses {
                match self.api.fetch_version_info(&entry.name, &entry.version) {
                    Ok(info) => info.license,
                    Err(err) => {
                        warn!(
                            name = %entry.name,
                            version = %entry.version,
                            "version lookup failed, leaving the rest of the file for the next run: {err}"
                        );
                        self.fail(&entry.name, Some(&entry.version), err.to_string());
                        outcome.status = FileStatus::Failed;
                        return outcome;
                    }
                }
            } else {
                None
            };

            let write = CatalogWrite::InsertVersion {
                name: entry.name.clone(),
                version: entry.version.clone(),
                checksum: entry.checksum,
                yanked: entry.yanked,
                license,
            };
            if self.writes.send(write).is_err() {
                outcome.status = FileStatus::Failed;
                return outcome;
            }

            outcome.recorded += 1;
            self.events.emit(MirrorEvent::VersionRecorded {
                name: entry.name,
                version: entry.version.clone(),
            });
            known.insert(entry.version);
        }

        self.events.emit(MirrorEvent::FileReconciled {
            name,
            new_versions: outcome.recorded,
        });
        outcome
    }
}

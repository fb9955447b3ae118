//! Run orchestration: refresh, reconcile, download.

use std::sync::Arc;

use chrono::Utc;
use depot_config::config::Config;
use depot_db::repository::catalog::CatalogRepository;
use depot_dl::{
    api::{HttpRegistryClient, RegistryApi},
    http_client::ClientConfig,
};
use depot_events::{EventSinkHandle, MirrorEvent, Stage};
use depot_registry::{GitIndex, IndexConfig, IndexSource};
use tracing::{debug, info, warn};

use crate::{
    database::CatalogDb,
    fetch::{DownloadOptions, Downloader},
    reconcile::{ReconcileOptions, Reconciler},
    storage::ArchiveStore,
    types::MirrorReport,
    MirrorResult,
};

/// Where the registry API client comes from.
pub enum ApiSource {
    /// Use this client as is.
    Fixed(Arc<dyn RegistryApi>),
    /// Build an HTTP client from the index `config.json` once the snapshot is present.
    FromIndex {
        client: ClientConfig,
        api_override: Option<String>,
    },
}

/// Which stages run and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorOptions {
    pub update_index: bool,
    pub reconcile: bool,
    pub download: bool,
    pub reconcile_options: ReconcileOptions,
    pub download_options: DownloadOptions,
}

impl MirrorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            update_index: config.update_index(),
            reconcile: true,
            download: true,
            reconcile_options: ReconcileOptions::from_config(config),
            download_options: DownloadOptions::from_config(config),
        }
    }
}

/// HTTP client settings derived from the configuration.
pub fn client_config(config: &Config, proxy: Option<&str>) -> MirrorResult<ClientConfig> {
    let client = ClientConfig {
        user_agent: Some(config.user_agent()),
        headers: None,
        proxy: None,
        timeout: Some(config.request_timeout()),
    };
    Ok(client.with_proxy(proxy)?)
}

pub struct Mirror {
    db: CatalogDb,
    source: Arc<dyn IndexSource>,
    api: ApiSource,
    store: ArchiveStore,
    events: EventSinkHandle,
    options: MirrorOptions,
}

impl Mirror {
    pub fn new(
        db: CatalogDb,
        source: Arc<dyn IndexSource>,
        api: ApiSource,
        store: ArchiveStore,
        events: EventSinkHandle,
        options: MirrorOptions,
    ) -> Self {
        Self {
            db,
            source,
            api,
            store,
            events,
            options,
        }
    }

    /// Builds a mirror over the configured catalog, git index and archive root.
    ///
    /// The catalog is opened here, so a store that cannot be opened fails before any
    /// network activity.
    pub fn from_config(
        config: &Config,
        client: ClientConfig,
        events: EventSinkHandle,
    ) -> MirrorResult<Self> {
        let db = CatalogDb::open(config.get_db_path()?)?;
        let source = GitIndex::new(config.get_index_url(), config.get_index_path()?);
        let store = ArchiveStore::new(config.get_archive_path()?, config.archive_extension());

        Ok(Self::new(
            db,
            Arc::new(source),
            ApiSource::FromIndex {
                client,
                api_override: config.api_url.clone(),
            },
            store,
            events,
            MirrorOptions::from_config(config),
        ))
    }

    pub fn with_options(mut self, options: MirrorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Runs the enabled stages in order. Each stage drains completely before the next
    /// starts.
    pub async fn run(&self) -> MirrorResult<MirrorReport> {
        let mut report = MirrorReport::default();

        if self.options.update_index {
            report.revision = self.refresh().await?;
        }

        if !self.options.reconcile && !self.options.download {
            return Ok(report);
        }
        let api = self.resolve_api()?;

        if self.options.reconcile {
            let reconciler = Reconciler::new(
                self.db.clone(),
                api.clone(),
                self.events.clone(),
                self.options.reconcile_options,
            );
            report.reconcile = Some(reconciler.run(self.source.root()).await?);
        }

        if self.options.download {
            let downloader = Downloader::new(
                self.db.clone(),
                api,
                self.store.clone(),
                self.events.clone(),
                self.options.download_options,
            );
            report.download = Some(downloader.run().await?);
        }

        info!("mirror run complete");
        Ok(report)
    }

    /// Pulls the index and appends to the sync history.
    ///
    /// A failed pull is not fatal: reconciliation proceeds over whatever snapshot is
    /// already on disk.
    async fn refresh(&self) -> MirrorResult<Option<String>> {
        self.events.emit(MirrorEvent::StageStarted {
            stage: Stage::Refresh,
            total: None,
        });

        let source = self.source.clone();
        let revision = match tokio::task::spawn_blocking(move || source.refresh()).await? {
            Ok(revision) => {
                let synced_at = Utc::now().to_rfc3339();
                self.db
                    .with_conn(|conn| CatalogRepository::record_sync(conn, &revision, &synced_at))?;
                info!(%revision, "index refreshed");
                self.events.emit(MirrorEvent::IndexRefreshed {
                    revision: revision.clone(),
                });
                Some(revision)
            }
            Err(err) => {
                warn!("index refresh failed, using the existing snapshot: {err}");
                self.events.emit(MirrorEvent::ItemFailed {
                    stage: Stage::Refresh,
                    name: self.source.root().display().to_string(),
                    version: None,
                    reason: err.to_string(),
                });
                None
            }
        };

        self.events.emit(MirrorEvent::StageFinished {
            stage: Stage::Refresh,
        });
        Ok(revision)
    }

    fn resolve_api(&self) -> MirrorResult<Arc<dyn RegistryApi>> {
        match &self.api {
            ApiSource::Fixed(api) => Ok(api.clone()),
            ApiSource::FromIndex {
                client,
                api_override,
            } => {
                let index_config = IndexConfig::load(self.source.root())?;
                let endpoints = index_config.endpoints(api_override.as_deref())?;
                debug!(api = endpoints.api_base(), "using registry endpoints");
                Ok(Arc::new(HttpRegistryClient::new(client, endpoints)))
            }
        }
    }
}

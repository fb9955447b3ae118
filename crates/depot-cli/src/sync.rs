use depot_config::config::Config;
use depot_core::{
    pipeline::{client_config, Mirror, MirrorOptions},
    types::MirrorReport,
    MirrorResult,
};
use depot_events::EventSinkHandle;
use depot_utils::bytes::format_bytes;
use nu_ansi_term::Color::{Green, Red, Yellow};
use tracing::info;

use crate::utils::{Colored, Icons};

/// Stage toggles from the `sync` subcommand.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncFlags {
    pub no_update: bool,
    pub skip_download: bool,
    pub skip_reconcile: bool,
    pub no_yanked: bool,
}

impl SyncFlags {
    /// Narrows the configured options; flags only ever switch work off.
    pub fn apply(&self, mut options: MirrorOptions) -> MirrorOptions {
        options.update_index &= !self.no_update;
        options.reconcile &= !self.skip_reconcile;
        options.download &= !self.skip_download;
        options.download_options.include_yanked &= !self.no_yanked;
        options
    }
}

pub async fn sync_mirror(
    config: &Config,
    proxy: Option<&str>,
    flags: SyncFlags,
    events: EventSinkHandle,
) -> MirrorResult<MirrorReport> {
    let client = client_config(config, proxy)?;
    let mirror = Mirror::from_config(config, client, events)?;
    let options = flags.apply(*mirror.options());
    let mirror = mirror.with_options(options);

    mirror.run().await
}

pub fn print_report(report: &MirrorReport) {
    if let Some(revision) = &report.revision {
        info!("{} index at {revision}", Icons::ARROW);
    }

    if let Some(reconcile) = &report.reconcile {
        info!(
            "{} {} files reconciled: {} new packages, {} new versions",
            Icons::CHECK,
            reconcile.files,
            Colored(Green, reconcile.packages_registered),
            Colored(Green, reconcile.versions_recorded),
        );
        let problems = reconcile.skipped_packages + reconcile.malformed_files + reconcile.failed_files;
        if problems > 0 {
            info!(
                "{} {} packages skipped, {} malformed files, {} failed files",
                Icons::WARNING,
                Colored(Yellow, reconcile.skipped_packages),
                Colored(Yellow, reconcile.malformed_files),
                Colored(Yellow, reconcile.failed_files),
            );
        }
    }

    if let Some(download) = &report.download {
        info!(
            "{} {}/{} archives ready ({} new, {} already present, {})",
            Icons::CHECK,
            download.completed(),
            download.pending,
            Colored(Green, download.stored),
            download.reused,
            format_bytes(download.bytes, 2),
        );
        if download.mismatched + download.failed > 0 {
            info!(
                "{} {} checksum mismatches, {} failed downloads; they stay pending",
                Icons::CROSS,
                Colored(Red, download.mismatched),
                Colored(Red, download.failed),
            );
        }
    }
}

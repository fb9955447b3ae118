use std::{
    collections::HashMap,
    sync::{mpsc::Receiver, Arc, LazyLock},
    time::Duration,
};

use depot_events::{MirrorEvent, Stage};
use depot_utils::bytes::format_bytes;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nu_ansi_term::Color::{Cyan, Red};

use crate::utils::Colored;

/// Shared MultiProgress instance for suspend/stop from other modules.
static MULTI: LazyLock<Arc<MultiProgress>> = LazyLock::new(|| Arc::new(MultiProgress::new()));

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

/// Owns the background progress thread returned by [`spawn_event_handler`].
///
/// Every sender of the event channel must be dropped before calling
/// [`finish`](ProgressGuard::finish), otherwise the thread waits forever.
pub struct ProgressGuard {
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProgressGuard {
    /// Wait for the handler thread to drain remaining events.
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  {wide_bar:.cyan/dim}  {pos}/{len}  {msg}  {eta}",
    )
    .map(|style| style.progress_chars("━━─"))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn create_stage_job(stage: Stage, total: Option<u64>) -> ProgressBar {
    let pb = match total {
        Some(total) => {
            let pb = MULTI.add(ProgressBar::new(total));
            pb.set_style(bar_style());
            pb
        }
        None => {
            let pb = MULTI.add(ProgressBar::new_spinner());
            pb.set_style(spinner_style());
            pb
        }
    };
    pb.set_prefix(stage.as_str());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Running counters for one stage, rendered as the bar message.
#[derive(Debug, Default)]
struct StageTally {
    items: u64,
    registered: u64,
    versions: u64,
    bytes: u64,
    failed: u64,
    revision: Option<String>,
}

impl StageTally {
    fn apply(&mut self, event: &MirrorEvent) {
        if event.completes_item() {
            self.items += 1;
        }
        match event {
            MirrorEvent::IndexRefreshed { revision } => self.revision = Some(revision.clone()),
            MirrorEvent::PackageRegistered { .. } => self.registered += 1,
            MirrorEvent::FileReconciled { new_versions, .. } => self.versions += new_versions,
            MirrorEvent::ArchiveStored { size, .. } => self.bytes += size,
            MirrorEvent::ChecksumMismatch { .. } | MirrorEvent::ItemFailed { .. } => {
                self.failed += 1
            }
            _ => {}
        }
    }

    fn message(&self, stage: Stage) -> String {
        let mut msg = match stage {
            Stage::Refresh => match &self.revision {
                Some(revision) => format!("at {}", short_revision(revision)),
                None => "updating index".to_string(),
            },
            Stage::Reconcile => format!(
                "{} files, {} new packages, {} new versions",
                self.items, self.registered, self.versions
            ),
            Stage::Download => format_bytes(self.bytes, 2),
        };
        if self.failed > 0 {
            msg.push_str(&format!(", {}", Colored(Red, format!("{} failed", self.failed))));
        }
        msg
    }
}

fn short_revision(revision: &str) -> &str {
    revision.get(..12).unwrap_or(revision)
}

/// Spawn a background thread that maps [`MirrorEvent`]s to indicatif progress bars.
///
/// Each stage gets one line: a spinner while its size is unknown, a bar once the work
/// is counted up front. Lines are cleared when their stage finishes.
pub fn spawn_event_handler(receiver: Receiver<MirrorEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        let mut jobs: HashMap<Stage, (ProgressBar, StageTally)> = HashMap::new();

        while let Ok(event) = receiver.recv() {
            let stage = event.stage();
            match &event {
                MirrorEvent::StageStarted { total, .. } => {
                    let pb = create_stage_job(stage, *total);
                    let tally = StageTally::default();
                    pb.set_message(tally.message(stage));
                    jobs.insert(stage, (pb, tally));
                    continue;
                }
                MirrorEvent::StageFinished { .. } => {
                    if let Some((pb, tally)) = jobs.remove(&stage) {
                        pb.finish_and_clear();
                        MULTI.suspend(|| {
                            eprintln!("{} {}", Colored(Cyan, stage), tally.message(stage));
                        });
                    }
                    continue;
                }
                _ => {}
            }

            if let Some((pb, tally)) = jobs.get_mut(&stage) {
                tally.apply(&event);
                if event.completes_item() {
                    pb.inc(1);
                }
                pb.set_message(tally.message(stage));
            }
        }

        for (_, (pb, _)) in jobs.drain() {
            pb.finish_and_clear();
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn stored(size: u64) -> MirrorEvent {
        MirrorEvent::ArchiveStored {
            name: "a".into(),
            version: "0.1.0".into(),
            size,
        }
    }

    #[test]
    #[serial]
    fn test_download_tally() {
        crate::utils::set_flag(&crate::utils::COLOR, false);
        let mut tally = StageTally::default();
        tally.apply(&stored(1024));
        tally.apply(&stored(1024));
        tally.apply(&MirrorEvent::ChecksumMismatch {
            name: "b".into(),
            version: "0.1.0".into(),
            expected: "00".into(),
            actual: "ff".into(),
        });

        assert_eq!(tally.items, 3);
        assert_eq!(tally.bytes, 2048);
        assert!(tally.message(Stage::Download).ends_with(", 1 failed"));
    }

    #[test]
    fn test_reconcile_tally() {
        let mut tally = StageTally::default();
        tally.apply(&MirrorEvent::PackageRegistered { name: "a".into() });
        tally.apply(&MirrorEvent::VersionRecorded {
            name: "a".into(),
            version: "0.1.0".into(),
        });
        tally.apply(&MirrorEvent::FileReconciled {
            name: "a".into(),
            new_versions: 1,
        });

        assert_eq!(
            tally.message(Stage::Reconcile),
            "1 files, 1 new packages, 1 new versions"
        );
    }

    #[test]
    fn test_refresh_message_shortens_revision() {
        let mut tally = StageTally::default();
        assert_eq!(tally.message(Stage::Refresh), "updating index");
        tally.apply(&MirrorEvent::IndexRefreshed {
            revision: "0123456789abcdef0123".into(),
        });
        assert_eq!(tally.message(Stage::Refresh), "at 0123456789ab");
    }
}

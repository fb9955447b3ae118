/// All event types emitted by a mirror run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    /// A pipeline stage is starting. `total` is known only when the work is
    /// loaded up front.
    StageStarted { stage: Stage, total: Option<u64> },
    /// A pipeline stage drained all of its work.
    StageFinished { stage: Stage },
    /// The index snapshot was refreshed.
    IndexRefreshed { revision: String },
    /// A package was seen for the first time and its metadata stored.
    PackageRegistered { name: String },
    /// A new version row was queued for the catalog.
    VersionRecorded { name: String, version: String },
    /// A package file was fully processed by the reconciler.
    FileReconciled { name: String, new_versions: u64 },
    /// An archive passed verification and was written to disk.
    ArchiveStored {
        name: String,
        version: String,
        size: u64,
    },
    /// An archive already on disk matched its checksum and was adopted.
    ArchiveReused {
        name: String,
        version: String,
        size: u64,
    },
    /// Downloaded bytes did not hash to the expected checksum.
    ChecksumMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },
    /// A single item failed; the run continues.
    ItemFailed {
        stage: Stage,
        name: String,
        version: Option<String>,
        reason: String,
    },
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Refresh,
    Reconcile,
    Download,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Refresh => "refresh",
            Stage::Reconcile => "reconcile",
            Stage::Download => "download",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MirrorEvent {
    /// Stage the event belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            MirrorEvent::StageStarted { stage, .. }
            | MirrorEvent::StageFinished { stage }
            | MirrorEvent::ItemFailed { stage, .. } => *stage,
            MirrorEvent::IndexRefreshed { .. } => Stage::Refresh,
            MirrorEvent::PackageRegistered { .. }
            | MirrorEvent::VersionRecorded { .. }
            | MirrorEvent::FileReconciled { .. } => Stage::Reconcile,
            MirrorEvent::ArchiveStored { .. }
            | MirrorEvent::ArchiveReused { .. }
            | MirrorEvent::ChecksumMismatch { .. } => Stage::Download,
        }
    }

    /// Whether the event closes out one unit of work for progress purposes.
    pub fn completes_item(&self) -> bool {
        matches!(
            self,
            MirrorEvent::FileReconciled { .. }
                | MirrorEvent::ArchiveStored { .. }
                | MirrorEvent::ArchiveReused { .. }
                | MirrorEvent::ChecksumMismatch { .. }
                | MirrorEvent::ItemFailed { .. }
        )
    }
}

use crate::writer::WriterStats;

// ---- Reconcile ----

/// How one index file ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Every line was read.
    Complete,
    /// Package metadata could not be fetched; no versions were recorded.
    Skipped,
    /// A malformed line stopped the file.
    Malformed,
    /// A lookup or read failure stopped the file.
    Failed,
}

/// Result of reconciling one index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOutcome {
    pub status: FileStatus,
    pub registered: bool,
    pub recorded: u64,
}

impl FileOutcome {
    pub fn new(status: FileStatus) -> Self {
        Self {
            status,
            registered: false,
            recorded: 0,
        }
    }
}

/// Report returned after reconciliation completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub files: u64,
    pub packages_registered: u64,
    pub versions_recorded: u64,
    pub skipped_packages: u64,
    pub malformed_files: u64,
    pub failed_files: u64,
    pub writes: WriterStats,
}

impl ReconcileReport {
    pub fn add(&mut self, outcome: FileOutcome) {
        self.files += 1;
        self.versions_recorded += outcome.recorded;
        if outcome.registered {
            self.packages_registered += 1;
        }
        match outcome.status {
            FileStatus::Complete => {}
            FileStatus::Skipped => self.skipped_packages += 1,
            FileStatus::Malformed => self.malformed_files += 1,
            FileStatus::Failed => self.failed_files += 1,
        }
    }
}

// ---- Download ----

/// Result of processing one pending version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Stored { size: u64 },
    /// A matching archive was already on disk.
    Reused { size: u64 },
    Mismatched,
    Failed,
}

/// Report returned after the download stage completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub pending: u64,
    pub stored: u64,
    pub reused: u64,
    pub mismatched: u64,
    pub failed: u64,
    pub bytes: u64,
    pub writes: WriterStats,
}

impl DownloadReport {
    pub fn add(&mut self, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Stored { size } => {
                self.stored += 1;
                self.bytes += size;
            }
            DownloadOutcome::Reused { size } => {
                self.reused += 1;
                self.bytes += size;
            }
            DownloadOutcome::Mismatched => self.mismatched += 1,
            DownloadOutcome::Failed => self.failed += 1,
        }
    }

    /// Versions that are downloaded after this run.
    pub fn completed(&self) -> u64 {
        self.stored + self.reused
    }
}

// ---- Pipeline ----

/// Report for a whole run. Stages that were skipped are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub revision: Option<String>,
    pub reconcile: Option<ReconcileReport>,
    pub download: Option<DownloadReport>,
}

use crate::scan::file::{FileReport, FileState};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use tuneshelf_cache::UpsertOutcome;

/// Running totals of a scan.
///
/// Totals combine with `+` in any order, so per-file contributions can be
/// summed however the files were scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// Candidate objects enumerated, including listing entries that failed.
    pub total_files: u64,
    /// Objects extracted and written to the catalog.
    pub scanned_files: u64,
    pub new_songs: u64,
    pub updated_songs: u64,
    /// Extracted, but the catalog already held identical values.
    pub unchanged_songs: u64,
    /// Passed over by the scan cache gate.
    pub skipped_files: u64,
    /// Abandoned because the scan was cancelled; left stale in the cache.
    pub interrupted_files: u64,
    pub errors: u64,
}

impl ScanProgress {
    /// Contribution of a listing entry that could not be read.
    pub fn listing_error() -> Self {
        Self {
            total_files: 1,
            errors: 1,
            ..Self::default()
        }
    }
}

impl From<&FileReport> for ScanProgress {
    fn from(report: &FileReport) -> Self {
        let mut progress = Self {
            total_files: 1,
            ..Self::default()
        };
        match report.state {
            FileState::Skipped => progress.skipped_files = 1,
            FileState::Interrupted => progress.interrupted_files = 1,
            FileState::Errored => progress.errors = 1,
            FileState::Upserted | FileState::CacheUpdated => {
                progress.scanned_files = 1;
                match report.outcome {
                    Some(UpsertOutcome::New) => progress.new_songs = 1,
                    Some(UpsertOutcome::Updated) => progress.updated_songs = 1,
                    Some(UpsertOutcome::Unchanged) | None => progress.unchanged_songs = 1,
                }
            },
            // Never final.
            FileState::Discovered | FileState::Extracting | FileState::Resolving => {},
        }
        progress
    }
}

impl Add for ScanProgress {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            total_files: self.total_files + rhs.total_files,
            scanned_files: self.scanned_files + rhs.scanned_files,
            new_songs: self.new_songs + rhs.new_songs,
            updated_songs: self.updated_songs + rhs.updated_songs,
            unchanged_songs: self.unchanged_songs + rhs.unchanged_songs,
            skipped_files: self.skipped_files + rhs.skipped_files,
            interrupted_files: self.interrupted_files + rhs.interrupted_files,
            errors: self.errors + rhs.errors,
        }
    }
}

impl AddAssign for ScanProgress {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for ScanProgress {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

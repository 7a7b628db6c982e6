use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use humansize::{format_size, DECIMAL};
use log::{debug, info, warn};
use walkdir::WalkDir;
use crate::config::ShortsConfig;

/// Files older than this are reclaimed on the next sweep
pub const MAX_FILE_AGE: Duration = Duration::from_secs(600);

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files inspected
    pub scanned: usize,
    /// Files deleted by this sweep
    pub removed: usize,
    /// Bytes freed by deleted files
    pub bytes_reclaimed: u64,
    /// Expired files that could not be deleted (permission, already gone)
    pub failed: usize,
}

/// Best-effort, age-based reclaimer for the working directories
#[derive(Debug, Clone)]
pub struct Janitor {
    dirs: Vec<PathBuf>,
    max_age: Duration,
}

impl Janitor {
    pub fn new(dirs: Vec<PathBuf>, max_age: Duration) -> Self {
        Janitor { dirs, max_age }
    }

    /// Janitor over the staging and output directories with the standard age limit
    pub fn from_config(cfg: &ShortsConfig) -> Self {
        Self::new(
            vec![cfg.staging_dir.clone(), cfg.output_dir.clone()],
            MAX_FILE_AGE,
        )
    }

    /// Sweep using the current wall clock
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now())
    }

    /// Delete every regular file whose mtime is more than `max_age` before `now`.
    ///
    /// Never fails: unreadable directories, vanished files and failed deletions
    /// are counted and logged at debug level only.
    pub fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        for dir in &self.dirs {
            if !dir.is_dir() {
                debug!("Janitor: directory does not exist, skipping: {}", dir.display());
                continue;
            }

            let walker = WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(false);
            for entry in walker.into_iter() {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        debug!("Janitor: error reading directory entry: {}", e);
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }
                report.scanned += 1;

                // A concurrent sweep may already have removed it
                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        debug!("Janitor: cannot stat {}: {}", entry.path().display(), e);
                        continue;
                    }
                };
                let modified = match metadata.modified() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                // mtime in the future counts as fresh
                let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
                if age <= self.max_age {
                    continue;
                }

                match std::fs::remove_file(entry.path()) {
                    Ok(()) => {
                        report.removed += 1;
                        report.bytes_reclaimed += metadata.len();
                        debug!("Janitor: removed {} (age {}s)", entry.path().display(), age.as_secs());
                    }
                    Err(e) => {
                        report.failed += 1;
                        debug!("Janitor: failed to remove {}: {}", entry.path().display(), e);
                    }
                }
            }
        }

        if report.removed > 0 {
            info!("🧹 Janitor removed {} expired file(s), reclaimed {}",
                  report.removed, format_size(report.bytes_reclaimed, DECIMAL));
        } else {
            debug!("Janitor: nothing to reclaim ({} files scanned)", report.scanned);
        }

        report
    }

    /// Run a sweep on the blocking pool without waiting for it.
    ///
    /// The join handle is dropped, so the outcome is never observed by the caller.
    pub fn spawn_sweep(&self) {
        let janitor = self.clone();
        let handle = tokio::task::spawn_blocking(move || {
            janitor.sweep();
        });
        drop(handle);
    }
}

/// Log-only helper for callers without a runtime (CLI one-shots)
pub fn sweep_now(cfg: &ShortsConfig) -> SweepReport {
    let report = Janitor::from_config(cfg).sweep();
    if report.failed > 0 {
        warn!("Janitor could not remove {} expired file(s)", report.failed);
    }
    report
}

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use derive_more::{Display, Error};
use regex::Regex;

use crate::run::RunLog;

/// Names of run directories, e.g. `2024-03-01 021500`.
static RUN_DIR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}\s\d{6}$").expect("run directory pattern should be valid")
});

/// Returns if `name` follows the run directory naming convention.
pub fn is_run_dir_name(name: &str) -> bool {
    RUN_DIR_NAME.is_match(name)
}

/// Number of most recent runs to keep.
///
/// `0` disables pruning altogether.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeepCount(usize);

impl KeepCount {
    /// Pruning disabled.
    pub const DISABLED: Self = Self(0);

    pub fn new(keep: usize) -> Self {
        Self(keep)
    }

    /// Interprets a raw retention count.
    ///
    /// Absent, zero or negative counts disable pruning. Anything that is not an
    /// integer disables pruning too, with a warning.
    pub fn coerce(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::DISABLED;
        };

        match raw.parse::<i64>() {
            Ok(keep) => Self(usize::try_from(keep).unwrap_or(0)),
            Err(_) => {
                log::warn!(target: "backup::retention", "Retention count '{raw}' is not a number, pruning disabled");
                Self::DISABLED
            }
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.0 == 0
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for KeepCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors while pruning old runs. Logged, never propagated.
#[derive(Debug, Display, Error)]
pub enum RetentionError {
    /// The backups root can't be listed.
    #[display("Listing {} failed: {source}", path.display())]
    List { path: PathBuf, source: io::Error },
    /// The modification time of a run directory can't be read.
    #[display("Reading modification time of {} failed: {source}", path.display())]
    Metadata { path: PathBuf, source: io::Error },
    /// A run directory can't be removed.
    #[display("Removing {} failed: {source}", path.display())]
    Remove { path: PathBuf, source: io::Error },
}

/// A run directory considered for retention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetentionEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// What [prune_old_runs] did.
#[derive(Debug, Default)]
pub struct RetentionReport {
    /// Run directories kept, newest first.
    pub kept: Vec<PathBuf>,
    /// Run directories removed.
    pub removed: Vec<PathBuf>,
    /// Problems encountered on the way.
    pub errors: Vec<RetentionError>,
}

/// Lists the run directories below `backups_root`, in listing order.
///
/// Entries not following the naming convention are skipped, as are entries
/// whose modification time can't be read (reported in `errors`).
pub fn list_run_dirs(
    backups_root: &Path,
    errors: &mut Vec<RetentionError>,
) -> Result<Vec<RetentionEntry>, RetentionError> {
    let list_error = |source: io::Error| RetentionError::List {
        path: backups_root.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(backups_root).map_err(list_error)? {
        let dir_entry = dir_entry.map_err(list_error)?;
        let path = dir_entry.path();

        let name = dir_entry.file_name();
        if !name.to_str().is_some_and(is_run_dir_name) {
            log::trace!(target: "backup::retention", "Ignoring {}", path.display());
            continue;
        }

        let modified = dir_entry
            .metadata()
            .and_then(|metadata| {
                if metadata.is_dir() {
                    metadata.modified().map(Some)
                } else {
                    Ok(None)
                }
            });
        match modified {
            Ok(Some(modified)) => entries.push(RetentionEntry { path, modified }),
            Ok(None) => {
                log::trace!(target: "backup::retention", "Ignoring non-directory {}", path.display());
            }
            Err(source) => errors.push(RetentionError::Metadata { path, source }),
        }
    }

    Ok(entries)
}

/// Removes all but the `keep` most recently modified run directories below `backups_root`.
///
/// Never fails: every problem is logged and collected in the returned report.
/// A failed removal doesn't stop the remaining ones.
pub fn prune_old_runs(backups_root: &Path, keep: KeepCount, log: &RunLog) -> RetentionReport {
    let mut report = RetentionReport::default();

    if keep.is_disabled() {
        log::debug!(target: "backup::retention", "No retention count configured, keeping every run");
        return report;
    }

    let mut entries = match list_run_dirs(backups_root, &mut report.errors) {
        Ok(entries) => entries,
        Err(e) => {
            log.error("backup::retention", format_args!("[FAILED] {e}"));
            report.errors.push(e);
            return report;
        }
    };
    for e in &report.errors {
        log.warn("backup::retention", format_args!("{e}"));
    }

    // stable: equal times keep their listing order
    entries.sort_by(|a, b| b.modified.cmp(&a.modified));

    let split = keep.get().min(entries.len());
    let outdated = entries.split_off(split);
    report.kept = entries.into_iter().map(|entry| entry.path).collect();

    if outdated.is_empty() {
        log::debug!(target: "backup::retention", "{} run(s) present, nothing to prune", report.kept.len());
        return report;
    }

    log.blank();
    log.info(
        "backup::retention",
        format_args!("Keeping the {keep} most recent run(s), removing {}", outdated.len()),
    );
    for RetentionEntry { path, .. } in outdated {
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                log.info("backup::retention", format_args!("Removed {}", path.display()));
                report.removed.push(path);
            }
            Err(source) => {
                let e = RetentionError::Remove { path, source };
                log.error("backup::retention", format_args!("[FAILED] {e}"));
                report.errors.push(e);
            }
        }
    }

    report
}

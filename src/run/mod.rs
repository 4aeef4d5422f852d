//! Per-run state: the timestamped run directory and its [RunLog].

mod log;

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

pub use self::log::RunLog;
use crate::util::dir::ensure_directory;

/// Name format of a run directory, e.g. `2024-03-01 021500`.
pub const RUN_DIR_FORMAT: &str = "%Y-%m-%d %H%M%S";

/// Name of the log file inside every run directory.
pub const RUN_LOG_FILE: &str = "logs.txt";

/// Everything belonging to one run of the backup driver.
///
/// Created once at start-up and never changed afterwards.
/// Two runs started within the same second resolve to the same run
/// directory and share it.
#[derive(Debug)]
pub struct BackupRunContext {
    root_dir: PathBuf,
    timestamp: NaiveDateTime,
    run_dir: PathBuf,
    log: RunLog,
}

impl BackupRunContext {
    /// Creates the run directory for `timestamp` below `root_dir` and opens its log.
    pub fn with_timestamp(root_dir: &Path, timestamp: NaiveDateTime) -> io::Result<Self> {
        let run_dir = root_dir.join(run_dir_name(&timestamp));
        if run_dir.is_relative() {
            ::log::warn!(target: "backup::run", "run directory is relative: {}", run_dir.display());
        }

        ensure_directory(&run_dir)?;
        let log = RunLog::create(&run_dir.join(RUN_LOG_FILE))?;

        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            timestamp,
            run_dir,
            log,
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn timestamp(&self) -> &NaiveDateTime {
        &self.timestamp
    }

    /// `<root_dir>/<YYYY-MM-DD HHMMSS>`
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }
}

/// Directory name of a run started at `timestamp`.
pub fn run_dir_name(timestamp: &NaiveDateTime) -> String {
    timestamp.format(RUN_DIR_FORMAT).to_string()
}

//! Backends dumping a single database of a connection.
//!
//! Currently the following backends are implemented:
//!
//! - [MySqlDump]: Runs `mysqldump` (or a compatible program like `mariadb-dump`).

pub mod mysqldump;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use derive_more::{Display, Error};

pub use mysqldump::MySqlDump;

use crate::connections::NormalizedTarget;
use crate::run::RunLog;
use crate::util::dir::join_inside;

/// Generic dump backend.
pub trait Dumper {
    /// Dumps `database` of `target` into `destination_dir`.
    ///
    /// Implementations never fail: every problem is logged to `log` and
    /// reported through the returned [DumpOutcome], so the caller can carry on
    /// with the next database.
    fn dump_one(
        &self,
        target: &NormalizedTarget,
        database: &str,
        destination_dir: &Path,
        log: &RunLog,
    ) -> DumpOutcome;
}

/// Errors of a single database dump.
#[derive(Debug, Display, Error)]
pub enum DumpError {
    /// The artifact file can't be created.
    #[display("Creating dump file {} failed: {source}", path.display())]
    CreateArtifact { path: PathBuf, source: io::Error },
    /// The dump utility can't be started.
    #[display("Starting {program} failed: {source}")]
    Spawn { program: String, source: io::Error },
    /// The dump utility exited unsuccessfully.
    #[display("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Result of dumping one database.
#[derive(Debug)]
pub struct DumpOutcome {
    pub host: String,
    pub database: String,
    /// Location of the (possibly incomplete) dump file.
    pub artifact: PathBuf,
    pub result: Result<(), DumpError>,
}

impl DumpOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Location of the dump file of `database` inside `destination_dir`.
///
/// Root, prefix and `..` components of `database` are dropped, the file
/// always lands below `destination_dir`.
pub fn artifact_path(destination_dir: &Path, database: &str) -> PathBuf {
    join_inside(destination_dir, &format!("{database}.sql"))
}

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::orchestrator::RunInputs;
use crate::util::retention::KeepCount;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// JSON (or `.toml`) file listing the database connections to back up.
    #[arg(long, short = 'c', env = "DIR_DATABASES")]
    pub connections: Option<PathBuf>,

    /// Folder receiving one timestamped directory per run.
    #[arg(long, short = 'r', env = "DIR_BACKUPS")]
    pub backup_root: Option<PathBuf>,

    /// Number of most recent runs to keep. Unset, zero or negative keeps every run.
    #[arg(long, short = 'k', env = "BACKUP_KEEP", allow_hyphen_values = true)]
    pub keep: Option<String>,

    /// Dump utility to run for every database.
    #[arg(long, env = "DUMP_COMMAND", default_value = "mysqldump")]
    pub dump_command: String,
}

impl Cli {
    /// Path inputs of the run, still unvalidated.
    pub fn run_inputs(&self) -> RunInputs {
        RunInputs {
            connections: self.connections.clone(),
            backup_root: self.backup_root.clone(),
        }
    }

    /// The retention count, coerced once.
    pub fn keep_count(&self) -> KeepCount {
        KeepCount::coerce(self.keep.as_deref())
    }
}

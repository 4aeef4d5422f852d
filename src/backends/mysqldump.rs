//! Implements dumping a database with `mysqldump` using [MySqlDump].

use std::ffi::OsString;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use super::{artifact_path, DumpError, DumpOutcome, Dumper};
use crate::connections::NormalizedTarget;
use crate::run::RunLog;

const DEFAULT_PROGRAM: &str = "mysqldump";

/// Flags passed on every invocation, in this order.
const DUMP_FLAGS: [&str; 3] = [
    "--skip-column-statistics", // no per-column statistics, unsupported by older servers
    "--single-transaction",     // consistent snapshot of InnoDB tables
    "--force",                  // continue past non-fatal errors
];

/// Dump backend running `mysqldump` (or a compatible program) once per database.
///
/// The program's stdout becomes `<destination>/<database>.sql`.
/// No timeout is applied: a hanging dump blocks the run.
#[derive(Debug, Clone)]
pub struct MySqlDump {
    program: OsString,
}

impl Default for MySqlDump {
    fn default() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }
}

impl MySqlDump {
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn arguments(target: &NormalizedTarget, database: &str) -> Vec<String> {
        let mut args = vec![
            "-h".to_string(),
            target.host.clone(),
            "-u".to_string(),
            target.user.clone(),
            format!("-p{}", target.password),
        ];
        args.extend(DUMP_FLAGS.iter().map(|flag| flag.to_string()));
        args.push(database.to_string());

        args
    }

    /// Command line with the password masked, for logging.
    fn display_command(&self, target: &NormalizedTarget, database: &str) -> String {
        let args = Self::arguments(target, database)
            .into_iter()
            .map(|arg| {
                if arg.starts_with("-p") && !arg.starts_with("--") {
                    "-p****".to_string()
                } else {
                    arg
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        format!("{} {args}", self.program_name())
    }

    fn run(
        &self,
        target: &NormalizedTarget,
        database: &str,
        artifact: &Path,
        log: &RunLog,
    ) -> Result<(), DumpError> {
        let artifact_file = File::create(artifact).map_err(|source| DumpError::CreateArtifact {
            path: artifact.to_path_buf(),
            source,
        })?;

        log::trace!(target: "backup::mysqldump", "Running: {}", self.display_command(target, database));
        let output = Command::new(&self.program)
            .args(Self::arguments(target, database))
            .stdin(Stdio::null())
            .stdout(artifact_file)
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| DumpError::Spawn {
                program: self.program_name(),
                source,
            })?;

        // relay stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            log.warn("backup::mysqldump", format_args!("{database}: {line}"));
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(DumpError::Failed {
                program: self.program_name(),
                status: output.status,
            })
        }
    }
}

impl Dumper for MySqlDump {
    fn dump_one(
        &self,
        target: &NormalizedTarget,
        database: &str,
        destination_dir: &Path,
        log: &RunLog,
    ) -> DumpOutcome {
        let artifact = artifact_path(destination_dir, database);

        log.info("backup::mysqldump", format_args!("Host: {}", target.host));
        log.info("backup::mysqldump", format_args!("User: {}", target.user));
        log.info("backup::mysqldump", format_args!("Database: {database}"));
        log::debug!(target: "backup::mysqldump", "Saving dump at: {}", artifact.display());

        let result = self.run(target, database, &artifact, log);
        match &result {
            Ok(()) => log.info("backup::mysqldump", "[OK] Dump created"),
            Err(e) => log.error("backup::mysqldump", format_args!("[FAILED] Dump failed: {e}")),
        }

        DumpOutcome {
            host: target.host.clone(),
            database: database.to_string(),
            artifact,
            result,
        }
    }
}

//! Sequential dump of every database of every active connection.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use derive_more::{Display, Error, From};

use crate::backends::{DumpOutcome, Dumper};
use crate::connections::{load_connections, ConfigError, NormalizedTarget};
use crate::run::BackupRunContext;
use crate::util::dir::{ensure_directory, join_inside};
use crate::util::retention::{prune_old_runs, KeepCount, RetentionReport};

/// A required input of the run is missing.
#[derive(Debug, Display, Error)]
#[display("Required input {name} is not set")]
pub struct EnvironmentError {
    pub name: &'static str,
}

/// Errors aborting a whole backup run.
#[derive(Debug, Display, Error, From)]
pub enum BackupError {
    /// A required input is missing.
    #[from]
    Environment(EnvironmentError),
    /// The connection file can't be loaded.
    #[from]
    Config(ConfigError),
    /// A run or host directory can't be created.
    #[display("Creating directory {} failed: {source}", path.display())]
    Directory { path: PathBuf, source: io::Error },
}

/// Inputs of a backup run as handed over by the caller, possibly incomplete.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub connections: Option<PathBuf>,
    pub backup_root: Option<PathBuf>,
}

/// [RunInputs] with every required input present.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub connections: PathBuf,
    pub backup_root: PathBuf,
}

impl RunInputs {
    /// Checks that every required path is given. Touches no file.
    pub fn validate(self) -> Result<RunPaths, EnvironmentError> {
        let connections = self
            .connections
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or(EnvironmentError { name: "DIR_DATABASES" })?;
        let backup_root = self
            .backup_root
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or(EnvironmentError { name: "DIR_BACKUPS" })?;

        Ok(RunPaths {
            connections,
            backup_root,
        })
    }
}

/// Outcome of a structurally completed run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Connections read from the connection file.
    pub connections: usize,
    /// Connections skipped for being inactive.
    pub skipped: usize,
    /// Every attempted dump, in dump order.
    pub dumps: Vec<DumpOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.dumps.iter().filter(|dump| dump.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.dumps.len() - self.succeeded()
    }
}

/// Drives a [Dumper] over all connections of a connection file.
pub struct Orchestrator<D> {
    dumper: D,
}

impl<D: Dumper> Orchestrator<D> {
    pub fn new(dumper: D) -> Self {
        Self { dumper }
    }

    #[cfg(test)]
    pub(crate) fn dumper(&self) -> &D {
        &self.dumper
    }

    /// Dumps every database of every active connection in `connections`.
    ///
    /// Dumps run one after another in file order. A failing dump is recorded
    /// and the run carries on; only an unusable connection file or a host
    /// directory that can't be created aborts the run.
    pub fn run(
        &self,
        ctx: &BackupRunContext,
        connections: &Path,
    ) -> Result<RunSummary, BackupError> {
        let log = ctx.log();

        let targets = load_connections(connections)?;
        let mut summary = RunSummary {
            connections: targets.len(),
            ..Default::default()
        };

        for target in &targets {
            log.blank();
            if !target.active {
                log.info("backup::orchestrator", format_args!("Connection: {} [inactive]", target.title));
                summary.skipped += 1;
                continue;
            }
            log.info("backup::orchestrator", format_args!("Connection: {}", target.title));

            let destination = host_dir(ctx.run_dir(), target);
            ensure_directory(&destination).map_err(|source| BackupError::Directory {
                path: destination.clone(),
                source,
            })?;

            for database in &target.databases {
                log.blank();
                let outcome = self.dumper.dump_one(target, database, &destination, log);
                summary.dumps.push(outcome);
            }
        }

        Ok(summary)
    }
}

/// What a successful [Orchestrator::execute] did.
#[derive(Debug)]
pub struct RunReport {
    pub run_dir: PathBuf,
    pub summary: RunSummary,
    pub retention: RetentionReport,
}

impl<D: Dumper> Orchestrator<D> {
    /// Runs a complete backup: validates `inputs`, creates the run directory
    /// for `timestamp`, dumps all connections and, only if that succeeded,
    /// prunes old runs down to `keep`.
    pub fn execute(
        &self,
        inputs: RunInputs,
        keep: KeepCount,
        timestamp: NaiveDateTime,
    ) -> Result<RunReport, BackupError> {
        let paths = inputs.validate().inspect_err(|e| {
            log::error!(target: "backup::orchestrator", "[FAILED] {e}");
        })?;

        let ctx = BackupRunContext::with_timestamp(&paths.backup_root, timestamp).map_err(
            |source| BackupError::Directory {
                path: paths.backup_root.clone(),
                source,
            },
        )?;
        let log = ctx.log();
        log.info(
            "backup::orchestrator",
            format_args!("Backup run {} started", ctx.timestamp().format("%Y-%m-%d %H:%M:%S")),
        );

        let summary = match self.run(&ctx, &paths.connections) {
            Ok(summary) => summary,
            Err(e) => {
                log.blank();
                log.error("backup::orchestrator", format_args!("[FAILED] Backup routine aborted: {e}"));
                return Err(e);
            }
        };

        log.blank();
        log.info(
            "backup::orchestrator",
            format_args!(
                "Backup routine processed successfully ({} dump(s) succeeded, {} failed, {} connection(s) skipped).",
                summary.succeeded(),
                summary.failed(),
                summary.skipped,
            ),
        );

        let retention = prune_old_runs(ctx.root_dir(), keep, log);

        Ok(RunReport {
            run_dir: ctx.run_dir().to_path_buf(),
            summary,
            retention,
        })
    }
}

/// `<run_dir>/<host>`, never outside `run_dir`.
fn host_dir(run_dir: &Path, target: &NormalizedTarget) -> PathBuf {
    join_inside(run_dir, &target.host)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::NaiveDate;

    use super::*;
    use crate::backends::DumpError;
    use crate::run::RunLog;

    /// Writes an artifact for every database except the ones listed in `failing`.
    #[derive(Default)]
    struct FakeDumper {
        failing: Vec<String>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl Dumper for FakeDumper {
        fn dump_one(
            &self,
            target: &NormalizedTarget,
            database: &str,
            destination_dir: &Path,
            _log: &RunLog,
        ) -> DumpOutcome {
            self.calls
                .borrow_mut()
                .push((target.host.clone(), database.to_string()));

            let artifact = crate::backends::artifact_path(destination_dir, database);
            let result = if self.failing.iter().any(|name| name == database) {
                Err(DumpError::Spawn {
                    program: "fake".into(),
                    source: io::Error::other("boom"),
                })
            } else {
                std::fs::write(&artifact, "-- dump").map_err(|source| DumpError::CreateArtifact {
                    path: artifact.clone(),
                    source,
                })
            };

            DumpOutcome {
                host: target.host.clone(),
                database: database.to_string(),
                artifact,
                result,
            }
        }
    }

    fn context(root: &Path) -> BackupRunContext {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        BackupRunContext::with_timestamp(root, timestamp).unwrap()
    }

    fn write_connections(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("connections.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn missing_inputs_are_rejected() {
        let err = RunInputs::default().validate().unwrap_err();
        assert_eq!(err.name, "DIR_DATABASES");

        let err = RunInputs {
            connections: Some("connections.json".into()),
            backup_root: Some(PathBuf::new()),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.name, "DIR_BACKUPS");

        assert!(RunInputs {
            connections: Some("connections.json".into()),
            backup_root: Some("/backups".into()),
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn dumps_in_file_order_and_skips_inactive() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let connections = write_connections(
            tmp.path(),
            r#"[
                {"host": "db1", "database": "a", "databases": ["b", "c"]},
                {"host": "db2", "active": false, "database": "x"},
                {"host": "db3", "databases": "d"}
            ]"#,
        );
        let ctx = context(&tmp.path().join("backups"));
        let orchestrator = Orchestrator::new(FakeDumper::default());

        let summary = orchestrator.run(&ctx, &connections).unwrap();

        let calls = orchestrator.dumper().calls.borrow();
        let order: Vec<_> = calls.iter().map(|(h, d)| format!("{h}/{d}")).collect();
        assert_eq!(order, ["db1/a", "db1/b", "db1/c", "db3/d"]);
        assert_eq!(summary.connections, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded(), 4);
        assert!(!ctx.run_dir().join("db2").exists());
        assert!(ctx.run_dir().join("db1").join("c.sql").is_file());
    }

    #[test]
    fn failed_dump_does_not_stop_the_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let connections = write_connections(
            tmp.path(),
            r#"[{"host": "db1", "databases": ["a", "b"]}, {"host": "db2", "database": "c"}]"#,
        );
        let ctx = context(&tmp.path().join("backups"));
        let orchestrator = Orchestrator::new(FakeDumper {
            failing: vec!["a".into()],
            ..Default::default()
        });

        let summary = orchestrator.run(&ctx, &connections).unwrap();

        assert_eq!(summary.dumps.len(), 3);
        assert!(!summary.dumps[0].is_success());
        assert!(summary.dumps[1].is_success());
        assert_eq!(summary.failed(), 1);
        assert!(ctx.run_dir().join("db1").join("b.sql").is_file());
        assert!(ctx.run_dir().join("db2").join("c.sql").is_file());
    }

    #[test]
    fn repeated_host_shares_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let connections = write_connections(
            tmp.path(),
            r#"[{"host": "db1", "database": "a"}, {"host": "db1", "database": "b"}]"#,
        );
        let ctx = context(&tmp.path().join("backups"));

        Orchestrator::new(FakeDumper::default())
            .run(&ctx, &connections)
            .unwrap();

        assert!(ctx.run_dir().join("db1").join("a.sql").is_file());
        assert!(ctx.run_dir().join("db1").join("b.sql").is_file());
    }

    #[test]
    fn absolute_host_stays_inside_run_dir() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let elsewhere = tempfile::tempdir().expect("tempdir");
        let escaping_host = elsewhere.path().join("escaped");
        let connections = write_connections(
            tmp.path(),
            &format!(
                r#"[{{"host": {}, "databases": ["a", "/b"]}}]"#,
                serde_json::to_string(&escaping_host.to_string_lossy()).unwrap()
            ),
        );
        let ctx = context(&tmp.path().join("backups"));

        let summary = Orchestrator::new(FakeDumper::default())
            .run(&ctx, &connections)
            .unwrap();

        assert_eq!(summary.succeeded(), 2);
        for dump in &summary.dumps {
            assert!(dump.artifact.starts_with(ctx.run_dir()), "{}", dump.artifact.display());
            assert!(dump.artifact.is_file());
        }
        assert!(!escaping_host.exists());
    }

    #[test]
    fn malformed_config_aborts_before_host_dirs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let connections = write_connections(tmp.path(), r#"[{"host": "db1""#);
        let ctx = context(&tmp.path().join("backups"));
        let orchestrator = Orchestrator::new(FakeDumper::default());

        let err = orchestrator.run(&ctx, &connections).unwrap_err();

        assert!(matches!(err, BackupError::Config(ConfigError::Json { .. })));
        assert!(orchestrator.dumper().calls.borrow().is_empty());
        let entries: Vec<_> = std::fs::read_dir(ctx.run_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, ["logs.txt"]);
    }
}

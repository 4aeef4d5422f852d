use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use db_backup_lib::backends::MySqlDump;
use db_backup_lib::cli::Cli;
use db_backup_lib::orchestrator::Orchestrator;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let keep = cli.keep_count();
    let orchestrator = Orchestrator::new(MySqlDump::with_program(&cli.dump_command));

    match orchestrator.execute(cli.run_inputs(), keep, Local::now().naive_local()) {
        Ok(report) => {
            log::debug!(
                target: "backup",
                "Run {} finished, {} old run(s) removed",
                report.run_dir.display(),
                report.retention.removed.len()
            );
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}

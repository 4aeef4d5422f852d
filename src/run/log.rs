use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use log::Level;

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Log of a single backup run.
///
/// Every line goes to the interactive sink (the [`log`] facade) and is
/// appended to the run's log file. Both sinks stamp the line on their own.
/// The file is line buffered, so nothing is lost if the process stops
/// between two lines.
#[derive(Debug)]
pub struct RunLog {
    path: Option<PathBuf>,
    file: Option<Mutex<LineWriter<File>>>,
}

impl RunLog {
    /// Opens (or creates) `path` in append mode.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::debug!(target: "backup::run", "Writing run log to {}", path.display());

        Ok(Self {
            path: Some(path.to_path_buf()),
            file: Some(Mutex::new(LineWriter::new(file))),
        })
    }

    /// A [RunLog] without file sink, only forwarding to the [`log`] facade.
    pub fn console_only() -> Self {
        Self {
            path: None,
            file: None,
        }
    }

    /// Location of the log file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, target: &str, message: impl Display) {
        self.line(Level::Info, target, message);
    }

    pub fn warn(&self, target: &str, message: impl Display) {
        self.line(Level::Warn, target, message);
    }

    pub fn error(&self, target: &str, message: impl Display) {
        self.line(Level::Error, target, message);
    }

    /// Writes an empty separator line to the file sink.
    pub fn blank(&self) {
        self.append("");
    }

    fn line(&self, level: Level, target: &str, message: impl Display) {
        let message = message.to_string();
        log::log!(target: target, level, "{message}");

        let timestamp = Local::now().format(LOG_TIMESTAMP_FORMAT);
        self.append(&format!("[{timestamp}] {level:<5} {message}"));
    }

    fn append(&self, line: &str) {
        let Some(file) = &self.file else {
            return;
        };

        // a poisoned lock only means another writer panicked mid-line
        let mut file = match file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{line}") {
            log::warn!(target: "backup::run", "Appending to the run log failed: {e}");
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let mut file = match file.into_inner() {
                Ok(file) => file,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Err(e) = file.flush() {
                log::warn!(target: "backup::run", "Flushing the run log failed: {e}");
            }
        }
    }
}

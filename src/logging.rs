//! Logging setup

use crate::Result;
use anyhow::Context;
use log::{LevelFilter, Log, Metadata, Record};
use std::{
    fs::File,
    io::{LineWriter, Write},
    path::Path,
    sync::{Mutex, PoisonError},
};

/// Set up logging, to syslog or to `log_file` if specified
pub fn setup(log_file: Option<&Path>) -> Result<()> {
    let level = max_level();
    match log_file {
        Some(path) => {
            let logger = FileLogger::create(path, level)?;
            log::set_logger(Box::leak(Box::new(logger)))
                .map_err(|e| anyhow::format_err!("{e}"))?;
            log::set_max_level(level);
            Ok(())
        }
        None => syslog::init(syslog::Facility::LOG_USER, level, None)
            .map_err(|e| anyhow::format_err!("{e}")),
    }
}

/// Most verbose level that should be logged
fn max_level() -> LevelFilter {
    if cfg!(feature = "log-trace") {
        LevelFilter::Trace
    } else if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Logger that writes records to a file, one line per record
#[derive(Debug)]
struct FileLogger {
    /// Destination file
    file: Mutex<LineWriter<File>>,

    /// Most verbose level that gets recorded
    level: LevelFilter,
}
//
impl FileLogger {
    /// Create or truncate the log file
    fn create(path: &Path, level: LevelFilter) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(LineWriter::new(file)),
            level,
        })
    }

    /// Format a record as a log line
    fn format(record: &Record<'_>) -> String {
        format!(
            "{} {}:{}:{}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    }
}
//
impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        // There is nowhere left to report a failure to write logs
        let _ = writeln!(file, "{line}");
    }

    fn flush(&self) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logger_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.log");
        std::fs::write(&path, "stale contents\n").unwrap();

        let logger = FileLogger::create(&path, LevelFilter::Info).unwrap();
        for (level, message) in [
            (log::Level::Info, "Query \"f-score\" for year 2001"),
            (log::Level::Debug, "not recorded"),
        ] {
            logger.log(
                &Record::builder()
                    .level(level)
                    .target("scholar_trends")
                    .args(format_args!("{message}"))
                    .build(),
            );
        }
        logger.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("INFO:scholar_trends:Query \"f-score\" for year 2001"));
    }
}

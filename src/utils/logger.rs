//! Logger utility for run-wide logging
//!
//! This module provides a custom logger that works alongside the standard
//! log crate: every record at DEBUG and above goes to the run log file,
//! records at INFO and above are also echoed to the console.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Custom logger implementation
pub struct Logger {
    /// File handle for log output
    file: Mutex<Option<File>>,
    /// Where the file handle points to
    path: PathBuf,
    /// Most verbose level echoed to the console
    console_level: Level,
}

impl Logger {
    /// Creates a new logger instance
    ///
    /// # Arguments
    ///
    /// * `log_file` - Path to the log file
    ///
    /// # Returns
    ///
    /// A new Logger instance or an error if the file cannot be created
    pub fn new(log_file: &Path) -> io::Result<Self> {
        let file = File::create(log_file)?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            path: log_file.to_path_buf(),
            console_level: Level::Info,
        })
    }

    /// Creates a logger writing `core_cutting_<timestamp>.log` in `log_dir`
    pub fn for_run(log_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        Self::new(&log_dir.join(format!("core_cutting_{}.log", stamp)))
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one line to the log file
    ///
    /// # Arguments
    ///
    /// * `message` - The message to log
    pub fn write_line(&self, message: &str) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", message)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Static method to install a run logger as the global logger
    ///
    /// # Returns
    ///
    /// Path of the log file that was opened
    pub fn init_global_logger(log_dir: &Path) -> io::Result<PathBuf> {
        let global_logger = Logger::for_run(log_dir)?;
        let path = global_logger.path().to_path_buf();

        if log::set_boxed_logger(Box::new(global_logger)).is_err() {
            eprintln!("Warning: Global logger was already initialized");
        }

        log::set_max_level(LevelFilter::Debug);
        Ok(path)
    }
}

// Implement the Log trait to make our Logger work with the log crate
impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let message = format!("{} | {:<5} | {}", stamp, record.level(), record.args());
        let _ = self.write_line(&message);

        if record.level() <= self.console_level {
            println!("{}", message);
        }
    }

    fn flush(&self) {
        // Already flushing in write_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_log_is_timestamped_and_written() {
        let dir = tempdir().unwrap();
        let logger = Logger::for_run(&dir.path().join("logs")).unwrap();

        let name = logger.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("core_cutting_") && name.ends_with(".log"));

        logger.write_line("hello").unwrap();
        assert_eq!(fs::read_to_string(logger.path()).unwrap(), "hello\n");
    }
}

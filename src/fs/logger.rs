//! File-based logger implementation.
//!
//! This module implements the [`log`] crate's logging facade, writing log
//! messages to both the console and a file. On the V5 Brain the file lands
//! on the SD card, which makes it possible to read back what a motion did
//! after the match.
//!
//! # Usage
//!
//! Initialize the logger once at the start of your program:
//!
//! ```ignore
//! use skar_motion::fs::logger;
//! use log::{LevelFilter, info};
//!
//! logger::init(LevelFilter::Debug).expect("Logger init failed");
//! info!("Program started");
//! ```
//!
//! # Log Output
//!
//! Each line carries the level, the time since the program started, the
//! target and the message:
//!
//! ```text
//! INFO [2m 5s 123ms] skar_motion::motion::drive - Drive started: 900 ticks on 4 motors, max power 127, timeout 5s
//! WARN [2m 7s 456ms] skar_motion::motion::turn - Turn timed out after 5s
//! ```
//!
//! Per-tick controller traces are logged at `trace` level. They are
//! plentiful at a 2 ms loop rate, so keep the filter at `Debug` or above
//! during matches.

use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
    sync::{Mutex, OnceLock},
    time::Duration,
};

use humantime::{FormattedDuration, format_duration};
use log::{LevelFilter, Metadata, Record, SetLoggerError};

/// File the logger writes to unless told otherwise.
pub const DEFAULT_LOG_PATH: &str = "log.txt";

/// A dual-output logger.
///
/// Writes log messages to both the console and a file. The file is
/// created or truncated when the logger is initialized.
pub struct SkarLogger {
    /// `None` if the file could not be opened (e.g., no SD card present).
    file_writer: Mutex<Option<BufWriter<std::fs::File>>>,
}

impl SkarLogger {
    fn new(path: &Path) -> Self {
        let file_writer = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .ok()
            .map(BufWriter::new);

        Self {
            file_writer: Mutex::new(file_writer),
        }
    }

    fn format(record: &Record) -> String {
        format!(
            "{} [{}] {} - {}\n",
            record.level(),
            uptime(),
            record.target(),
            record.args()
        )
    }
}

impl log::Log for SkarLogger {
    fn enabled(&self, metadata: &Metadata) -> bool { metadata.level() <= log::max_level() }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_line = Self::format(record);

            print!("{}", log_line);

            if let Ok(mut writer_guard) = self.file_writer.lock() {
                if let Some(ref mut writer) = *writer_guard {
                    let _ = writer.write_all(log_line.as_bytes());
                }
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut writer_guard) = self.file_writer.lock() {
            if let Some(ref mut writer) = *writer_guard {
                let _ = writer.flush();
            }
        }
    }
}

static LOGGER: OnceLock<SkarLogger> = OnceLock::new();

/// Initializes the logger, writing to [`DEFAULT_LOG_PATH`].
///
/// # Errors
///
/// Returns [`SetLoggerError`] if a logger has already been set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    init_with_path(level, DEFAULT_LOG_PATH)
}

/// Initializes the logger, writing to `path`.
///
/// Only the first call opens a file; the path passed to later calls is
/// ignored.
///
/// # Errors
///
/// Returns [`SetLoggerError`] if a logger has already been set.
pub fn init_with_path(level: LevelFilter, path: impl AsRef<Path>) -> Result<(), SetLoggerError> {
    start_uptime();
    let logger = LOGGER.get_or_init(|| SkarLogger::new(path.as_ref()));
    log::set_logger(logger).map(|()| log::set_max_level(level))
}

#[cfg(not(feature = "vexide"))]
static START: OnceLock<std::time::Instant> = OnceLock::new();

#[cfg(not(feature = "vexide"))]
fn start_uptime() { START.get_or_init(std::time::Instant::now); }

#[cfg(feature = "vexide")]
fn start_uptime() {}

/// Time since the user program started.
#[cfg(feature = "vexide")]
fn elapsed() -> Duration { vexide::time::user_uptime() }

/// Time since the logger was initialized.
#[cfg(not(feature = "vexide"))]
fn elapsed() -> Duration { START.get().map_or(Duration::ZERO, |start| start.elapsed()) }

/// Uptime truncated to milliseconds, formatted for a log line.
fn uptime() -> FormattedDuration {
    let millis = elapsed().as_millis() as u64;
    format_duration(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use log::{Level, LevelFilter, debug, error, info, trace, warn};

    use super::*;

    #[test]
    fn line_format() {
        let line = SkarLogger::format(
            &Record::builder()
                .level(Level::Warn)
                .target("skar_motion::motion::turn")
                .args(format_args!("Turn timed out"))
                .build(),
        );
        assert!(line.starts_with("WARN ["));
        assert!(line.ends_with("] skar_motion::motion::turn - Turn timed out\n"));
    }

    #[test]
    #[ignore = "filesystem access needed (file write)"]
    fn log_full_test() {
        let path = std::env::temp_dir().join("skar-motion-log-test.txt");
        super::init_with_path(LevelFilter::Trace, &path).expect("Failed to initialize logger");

        trace!("This is a trace message");
        debug!("This is a debug message");
        info!("This is an info message");
        warn!("This is a warning message");
        error!("This is an error message");

        log::logger().flush();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 5);
        assert!(written.contains("WARN ["));
    }
}

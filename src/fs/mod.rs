//! Filesystem utilities.
//!
//! # Logging
//!
//! The `logger` submodule provides a file-based logger that writes to
//! `log.txt` (on the V5 Brain, the SD card). This is useful for debugging
//! motions that only misbehave on the robot.
//!
//! # Example
//!
//! ```ignore
//! use skar_motion::fs::logger;
//! use log::{LevelFilter, info};
//!
//! logger::init(LevelFilter::Debug).expect("Failed to initialize logger");
//! info!("Robot initialized successfully");
//! ```

/// File-based logging.
///
/// Provides a logger implementation that writes to both the console
/// and a file.
pub mod logger;

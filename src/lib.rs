//! # skar-motion
//!
//! Closed-loop motion primitives for VEX competition robots. The crate
//! provides:
//!
//! - **PID Control**: a small reusable controller with derivative on error,
//!   used by the drive and turn primitives.
//! - **Motion Primitives**: driving a set distance on per-motor PIDs,
//!   turning by or to a heading on the inertial sensor, centering a vision
//!   signature, and climbing then leveling on a balance platform.
//! - **Device Interfaces**: traits for motors, the inertial sensor, the
//!   vision sensor, an asynchronous chassis and the clock, with V5
//!   implementations behind the `vexide` feature and host-side stand-ins
//!   for testing.
//! - **Configuration**: per-robot tuning read from TOML.
//! - **Logging**: a file-based logger for debugging motions after a match.
//!
//! ## Quick Start
//!
//! ```ignore
//! use skar_motion::{
//!     motion::{drive::drive_ticks, drive::{DriveTuning, STRAIGHT_QUAD}, CancelToken},
//!     peripherals::vex::VexClock,
//! };
//! use vexide::prelude::*;
//!
//! #[vexide::main]
//! async fn main(peripherals: Peripherals) {
//!     let mut motors = [
//!         Motor::new(peripherals.port_1, Gearset::Green, Direction::Forward),
//!         Motor::new(peripherals.port_2, Gearset::Green, Direction::Forward),
//!         Motor::new(peripherals.port_3, Gearset::Green, Direction::Reverse),
//!         Motor::new(peripherals.port_4, Gearset::Green, Direction::Reverse),
//!     ];
//!     let tuning = DriveTuning { max_power: 12.0, ..Default::default() };
//!     let outcome = drive_ticks(
//!         &mut motors,
//!         720.0,
//!         &STRAIGHT_QUAD,
//!         &tuning,
//!         &VexClock,
//!         &CancelToken::new(),
//!     )
//!     .await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`motion`]: the PID controller and the motion primitives.
//! - [`peripherals`]: device traits and their implementations.
//! - [`config`]: TOML tuning.
//! - [`error`]: the crate error type.
//! - [`fs`]: filesystem utilities including logging.

/// Per-robot tuning loaded from TOML.
pub mod config;

/// Error type shared by every primitive.
pub mod error;

/// Filesystem utilities module.
///
/// Contains logging functionality for recording motion traces to a file,
/// on the V5 Brain's SD card when running on the robot.
pub mod fs;

/// Autonomous motion control module.
///
/// - **PID Control**: the [`Pid`](motion::Pid) controller.
/// - **Drive**: straight and spin moves on per-motor PIDs.
/// - **Turn**: heading turns closed on the inertial sensor.
/// - **Vision**: turning to center a vision signature.
/// - **Balance**: the approach, mount and level routine for a tilting
///   platform.
pub mod motion;

/// Device interfaces the motion primitives are written against.
pub mod peripherals;

pub use error::{Error, Result};

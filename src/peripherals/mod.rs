//! Device interfaces consumed by the motion primitives.
//!
//! The control core never talks to hardware directly. Motors, the inertial
//! sensor, the vision sensor, the drivetrain's own asynchronous position
//! controller and the scheduler clock are all reached through the traits in
//! this module, so the same primitives run against V5 devices (see
//! [`vex`], behind the `vexide` feature) or against the host-side stand-ins
//! in [`sim`].
//!
//! # Ownership
//!
//! Primitives borrow their devices mutably for the whole motion. While a
//! drive or turn is running, nothing else can command the same motors.
//!
//! # Example
//!
//! ```ignore
//! use skar_motion::peripherals::{Actuator, MotorGroup};
//!
//! let mut left = MotorGroup::new(vec![front_left, rear_left])?;
//! left.set_power(6.0)?;
//! let ticks = left.position()?;
//! ```

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Motor groups that act as one actuator.
pub mod group;

/// Deterministic host-side devices for desk testing.
pub mod sim;

/// Adapters for vexide devices.
#[cfg(feature = "vexide")]
pub mod vex;

pub use group::MotorGroup;

/// A motor or motor group accepting a signed power command.
///
/// Power units are whatever the implementation accepts (millivolts,
/// volts, the legacy -127..127 scale). Primitives only assume that the sign
/// gives the direction and that larger magnitudes push harder.
pub trait Actuator {
    /// Commands a signed power.
    fn set_power(&mut self, power: f64) -> Result<()>;

    /// Returns the encoder position.
    fn position(&self) -> Result<f64>;

    /// Returns the measured velocity, if the device reports one.
    fn velocity(&self) -> Result<f64> { Err(Error::Unsupported("actuator velocity")) }
}

/// An inertial sensor reporting orientation in degrees.
pub trait OrientationSensor {
    /// Heading in `[0, 360)`.
    fn heading(&self) -> Result<f64>;

    /// Unwrapped rotation since calibration. Keeps counting past 360.
    fn rotation(&self) -> Result<f64>;

    /// Pitch in degrees.
    fn pitch(&self) -> Result<f64>;

    /// Roll in degrees.
    fn roll(&self) -> Result<f64>;
}

/// Identifier of a trained vision signature (a goal color, for instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(pub u8);

/// A camera that locates objects by signature.
pub trait VisionSource {
    /// Horizontal and vertical offset of the object matching `signature`,
    /// measured from the image center in sensor units.
    fn offset_by_signature(&self, signature: Signature) -> Result<(f64, f64)>;

    /// Width of the field of view in the same units as the offsets.
    fn field_of_view_width(&self) -> f64;
}

/// A chassis running its own background position controller.
///
/// Balance hands distance moves to this controller and only watches the
/// inertial sensor while it runs.
pub trait AsyncChassis {
    /// Current maximum velocity of the chassis controller.
    fn max_velocity(&self) -> f64;

    /// Sets the maximum velocity used by following moves.
    fn set_max_velocity(&mut self, velocity: f64) -> Result<()>;

    /// Starts a straight move and returns without waiting for it.
    fn move_distance_async(&mut self, distance: f64) -> Result<()>;

    /// Abandons the current move and stops the drivetrain.
    fn stop(&mut self) -> Result<()>;
}

/// Monotonic time source and cooperative sleep.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed epoch.
    fn now(&self) -> Duration;

    /// Yields to the scheduler for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Which inertial axis a tilt detector watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiltAxis {
    #[default]
    Pitch,
    Roll,
}

impl TiltAxis {
    /// Reads this axis from `imu`, rejecting non-finite values.
    pub fn read(self, imu: &impl OrientationSensor) -> Result<f64> {
        match self {
            TiltAxis::Pitch => finite("imu pitch", imu.pitch()?),
            TiltAxis::Roll => finite("imu roll", imu.roll()?),
        }
    }
}

/// Reads the heading and checks it lies in `[0, 360)`.
pub fn checked_heading(imu: &impl OrientationSensor) -> Result<f64> {
    let heading = finite("imu heading", imu.heading()?)?;
    if !(0.0..360.0).contains(&heading) {
        return Err(Error::sensor(
            "imu heading",
            format!("{heading} outside [0, 360)"),
        ));
    }
    Ok(heading)
}

/// Rejects NaN and infinite readings.
pub(crate) fn finite(device: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::sensor(device, format!("non-finite reading {value}")))
    }
}

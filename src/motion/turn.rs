//! In-place turns held on the inertial sensor.
//!
//! One [`Pid`] tracks the sensor's unwrapped rotation. Its output is clamped
//! to `[-1, 1]`, scaled by `max_power` and sent to every drive motor with
//! that motor's turn direction, so the two sides push against each other.
//!
//! A turn only counts as finished once the rotation has stayed within
//! tolerance for `settle_ms` of consecutive ticks. One noisy in-band sample
//! is not enough.
//!
//! # Sign Convention
//!
//! [`turn_by`] negates the requested angle: a request of `90.0` aims at
//! `initial_rotation - 90.0`. Routines written for this library depend on
//! that, so it is kept. [`turn_to`] and [`turn_to_heading`] take absolute
//! targets and do not negate anything.
//!
//! # Usage
//!
//! ```ignore
//! use skar_motion::motion::{drive::SPIN_QUAD, turn::{self, TurnTuning}};
//!
//! let tuning = TurnTuning::default();
//! turn::turn_by(&mut motors, &SPIN_QUAD, 90.0, &imu, &tuning, &clock, &cancel).await?;
//! ```

use std::time::Duration;

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};

use super::{CancelToken, Outcome, Pid, PidGains, abscap, settle::Settle, stop_all};
use crate::{
    error::{Error, Result},
    peripherals::{Actuator, Clock, OrientationSensor, checked_heading, finite},
};

/// Left side forward, right side backward, for a two-group drivetrain.
///
/// A positive output drives the rotation up, clockwise on a V5 inertial
/// sensor. Matches the sides of [`SPIN_QUAD`](super::drive::SPIN_QUAD).
pub const SPIN_PAIR: [f64; 2] = [1.0, -1.0];

/// Tuning for inertial turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnTuning {
    /// Controller gains. Tolerance is in degrees and also sets the settle band.
    pub gains:      PidGains,
    /// Power sent to a motor at full output.
    pub max_power:  f64,
    /// Give up after this long.
    pub timeout_ms: u64,
    /// Loop period. Also the `dt` handed to the controller, in ms.
    pub tick_ms:    u64,
    /// How long the rotation must stay in band before the turn ends.
    pub settle_ms:  u64,
}

impl Default for TurnTuning {
    fn default() -> Self {
        Self {
            gains:      PidGains::new(0.28, 0.000001, -0.005, 1.0),
            max_power:  50.0,
            timeout_ms: 5000,
            tick_ms:    2,
            settle_ms:  100,
        }
    }
}

impl TurnTuning {
    pub fn validate(&self) -> Result<()> {
        self.gains.validate()?;
        if !(self.max_power.is_finite() && self.max_power > 0.0) {
            return Err(Error::invalid(format!(
                "max_power must be positive, got {}",
                self.max_power
            )));
        }
        if self.tick_ms == 0 {
            return Err(Error::invalid("turn tick must be positive"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    pub fn tick(&self) -> Duration { Duration::from_millis(self.tick_ms) }

    pub fn settle(&self) -> Duration { Duration::from_millis(self.settle_ms) }
}

/// Rotation a [`turn_by`] of `degrees` aims for, starting from `initial`.
pub fn relative_target(initial: f64, degrees: f64) -> f64 { initial + -degrees }

/// Shortest signed angle from heading `from` to heading `to`, in
/// `(-180, 180]`.
pub fn heading_delta(from: f64, to: f64) -> f64 {
    let delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Turns by `degrees` relative to the current rotation, using the negated
/// sign convention described in the module docs.
pub async fn turn_by<A: Actuator, S: OrientationSensor, C: Clock>(
    motors: &mut [A],
    directions: &[f64],
    degrees: f64,
    imu: &S,
    tuning: &TurnTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    if !degrees.is_finite() {
        return Err(Error::invalid("turn angle must be finite"));
    }
    let initial = finite("imu rotation", imu.rotation()?)?;
    let target = relative_target(initial, degrees);
    turn_to(motors, directions, target, imu, tuning, clock, cancel).await
}

/// Turns the shortest way to an absolute `heading` in `[0, 360)`.
pub async fn turn_to_heading<A: Actuator, S: OrientationSensor, C: Clock>(
    motors: &mut [A],
    directions: &[f64],
    heading: f64,
    imu: &S,
    tuning: &TurnTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    if !(0.0..360.0).contains(&heading) {
        return Err(Error::invalid(format!(
            "target heading {heading} outside [0, 360)"
        )));
    }
    let current = checked_heading(imu)?;
    let rotation = finite("imu rotation", imu.rotation()?)?;
    let target = rotation + heading_delta(current, heading);
    turn_to(motors, directions, target, imu, tuning, clock, cancel).await
}

/// Turns until the unwrapped rotation settles at `target`.
///
/// All motors are set to zero power on the way out, including when an
/// error is returned.
pub async fn turn_to<A: Actuator, S: OrientationSensor, C: Clock>(
    motors: &mut [A],
    directions: &[f64],
    target: f64,
    imu: &S,
    tuning: &TurnTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    tuning.validate()?;
    if motors.is_empty() {
        return Err(Error::invalid("turn needs at least one motor"));
    }
    if motors.len() != directions.len() {
        return Err(Error::invalid(format!(
            "{} motors but {} directions",
            motors.len(),
            directions.len()
        )));
    }
    if !target.is_finite() {
        return Err(Error::invalid("turn target must be finite"));
    }

    info!(
        "Turn started: target rotation {:.2}, max power {}, timeout {:?}",
        target,
        tuning.max_power,
        tuning.timeout()
    );
    let start = clock.now();
    let result = turn_loop(motors, directions, target, imu, tuning, clock, cancel).await;
    let stopped = stop_all(motors);
    let outcome = result?;
    stopped?;

    let elapsed = clock.now().saturating_sub(start);
    match outcome {
        Outcome::TimedOut => warn!("Turn timed out after {:?}", elapsed),
        _ => info!("Turn {} after {:?}", outcome, elapsed),
    }
    Ok(outcome)
}

async fn turn_loop<A: Actuator, S: OrientationSensor, C: Clock>(
    motors: &mut [A],
    directions: &[f64],
    target: f64,
    imu: &S,
    tuning: &TurnTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    let tick = tuning.tick();
    let timeout = tuning.timeout();
    let tolerance = tuning.gains.tolerance;
    let dt = tuning.tick_ms as f64;
    let start = clock.now();

    let mut pid = Pid::from_gains(&tuning.gains);
    pid.set_target(target);
    let mut settle = Settle::new(tuning.settle());

    loop {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let rotation = finite("imu rotation", imu.rotation()?)?;
        let output = abscap(pid.update(rotation, dt)?, 1.0);
        for (motor, direction) in motors.iter_mut().zip(directions) {
            motor.set_power(output * tuning.max_power * direction)?;
        }
        trace!(
            "rotation {:.3}, err {:.3}, output {:.4}",
            rotation,
            pid.last_error(),
            output
        );

        if settle.observe((rotation - target).abs() < tolerance, tick) {
            return Ok(Outcome::Arrived);
        }
        if clock.now().saturating_sub(start) >= timeout {
            return Ok(Outcome::TimedOut);
        }
        clock.sleep(tick).await;
    }
}

//! Synchronized drive-to-position.
//!
//! Every motor gets its own [`Pid`] aimed at `start + distance * direction`,
//! and all of them run under one loop and one stopping condition. The
//! direction vector lets the same routine drive straight (all `1.0`) or spin
//! in place (opposite signs on each side).
//!
//! # Soft Start
//!
//! For the first `ramp_ms` of a motion the output magnitude is capped at
//! `elapsed / ramp`, so the drivetrain does not take a full-power step from
//! rest. After the ramp the cap is `1.0`. The capped output is scaled by
//! `max_power` before it reaches the motor.
//!
//! # Usage
//!
//! ```ignore
//! use skar_motion::motion::drive::{self, DriveGeometry, DriveTuning};
//!
//! let tuning = DriveTuning::default();
//! let geometry = DriveGeometry::default();
//! drive::drive_inches(&mut motors, 24.0, &geometry, &tuning, &clock, &cancel).await?;
//! drive::drive_ticks(&mut motors, 450.0, &drive::SPIN_QUAD, &tuning, &clock, &cancel).await?;
//! ```

use std::{f64::consts::PI, time::Duration};

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};

use super::{CancelToken, Outcome, Pid, PidGains, abscap, stop_all};
use crate::{
    error::{Error, Result},
    peripherals::{Actuator, Clock, finite},
};

/// Largest number of motors one drive can coordinate.
pub const MAX_DRIVE_MOTORS: usize = 8;

/// All four wheels forward.
pub const STRAIGHT_QUAD: [f64; 4] = [1.0, 1.0, 1.0, 1.0];

/// Spin in place. Motor order is front-right, front-left, rear-left,
/// rear-right.
pub const SPIN_QUAD: [f64; 4] = [-1.0, 1.0, 1.0, -1.0];

/// Tuning for [`drive_ticks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveTuning {
    /// Gains shared by every motor's controller. Tolerance is in ticks.
    pub gains:      PidGains,
    /// Power sent to a motor at full output.
    pub max_power:  f64,
    /// Give up after this long.
    pub timeout_ms: u64,
    /// Loop period. Also the `dt` handed to the controllers, in ms.
    pub tick_ms:    u64,
    /// Length of the soft-start ramp. Zero disables it.
    pub ramp_ms:    u64,
}

impl Default for DriveTuning {
    fn default() -> Self {
        Self {
            gains:      PidGains::new(0.01, 0.0, -0.05, 100.0),
            max_power:  127.0,
            timeout_ms: 5000,
            tick_ms:    2,
            ramp_ms:    400,
        }
    }
}

impl DriveTuning {
    pub fn validate(&self) -> Result<()> {
        self.gains.validate()?;
        if !(self.max_power.is_finite() && self.max_power > 0.0) {
            return Err(Error::invalid(format!(
                "max_power must be positive, got {}",
                self.max_power
            )));
        }
        if self.tick_ms == 0 {
            return Err(Error::invalid("drive tick must be positive"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    pub fn tick(&self) -> Duration { Duration::from_millis(self.tick_ms) }

    pub fn ramp(&self) -> Duration { Duration::from_millis(self.ramp_ms) }
}

/// Wheel and encoder geometry, for converting inches to ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveGeometry {
    /// Encoder ticks per wheel revolution.
    pub ticks_per_rev:  f64,
    /// Wheel diameter in inches.
    pub wheel_diameter: f64,
}

impl Default for DriveGeometry {
    fn default() -> Self {
        Self {
            ticks_per_rev:  900.0,
            wheel_diameter: 4.0,
        }
    }
}

impl DriveGeometry {
    pub fn validate(&self) -> Result<()> {
        if !(self.ticks_per_rev.is_finite() && self.ticks_per_rev > 0.0) {
            return Err(Error::invalid("ticks_per_rev must be positive"));
        }
        if !(self.wheel_diameter.is_finite() && self.wheel_diameter > 0.0) {
            return Err(Error::invalid("wheel_diameter must be positive"));
        }
        Ok(())
    }

    pub fn ticks_per_inch(&self) -> f64 { self.ticks_per_rev / (self.wheel_diameter * PI) }
}

/// Output magnitude allowed at `t` into a ramp of length `ramp`.
fn ramp_limit(t: Duration, ramp: Duration) -> f64 {
    if ramp.is_zero() || t >= ramp {
        1.0
    } else {
        t.as_secs_f64() / ramp.as_secs_f64()
    }
}

/// Drives each motor `distance * directions[i]` ticks from where it is now.
///
/// Finishes with [`Outcome::Arrived`] once every controller is inside its
/// tolerance, [`Outcome::TimedOut`] when `timeout_ms` elapses first, or
/// [`Outcome::Cancelled`]. All motors are set to zero power on the way out,
/// including when an error is returned.
pub async fn drive_ticks<A: Actuator, C: Clock>(
    motors: &mut [A],
    distance: f64,
    directions: &[f64],
    tuning: &DriveTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    tuning.validate()?;
    if motors.is_empty() {
        return Err(Error::invalid("drive needs at least one motor"));
    }
    if motors.len() != directions.len() {
        return Err(Error::invalid(format!(
            "{} motors but {} directions",
            motors.len(),
            directions.len()
        )));
    }
    if !distance.is_finite() || directions.iter().any(|d| !d.is_finite()) {
        return Err(Error::invalid("drive distance and directions must be finite"));
    }

    let mut controllers: heapless::Vec<Pid, MAX_DRIVE_MOTORS> = heapless::Vec::new();
    for (motor, direction) in motors.iter().zip(directions) {
        let start = finite("motor position", motor.position()?)?;
        let mut pid = Pid::from_gains(&tuning.gains);
        pid.set_target(start + distance * direction);
        controllers.push(pid).map_err(|_| {
            Error::invalid(format!(
                "drive supports at most {MAX_DRIVE_MOTORS} motors, got {}",
                directions.len()
            ))
        })?;
    }

    info!(
        "Drive started: {} ticks on {} motors, max power {}, timeout {:?}",
        distance,
        motors.len(),
        tuning.max_power,
        tuning.timeout()
    );
    let start = clock.now();
    let result = drive_loop(motors, &mut controllers, tuning, clock, cancel).await;
    let stopped = stop_all(motors);
    let outcome = result?;
    stopped?;

    let elapsed = clock.now().saturating_sub(start);
    match outcome {
        Outcome::TimedOut => warn!("Drive timed out after {:?}", elapsed),
        _ => info!("Drive {} after {:?}", outcome, elapsed),
    }
    Ok(outcome)
}

async fn drive_loop<A: Actuator, C: Clock>(
    motors: &mut [A],
    controllers: &mut [Pid],
    tuning: &DriveTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    let tick = tuning.tick();
    let timeout = tuning.timeout();
    let ramp = tuning.ramp();
    // controllers were tuned with dt in milliseconds
    let dt = tuning.tick_ms as f64;
    let start = clock.now();

    loop {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let elapsed = clock.now().saturating_sub(start);
        let limit = ramp_limit(elapsed + tick, ramp);
        for (i, (motor, pid)) in motors.iter_mut().zip(controllers.iter_mut()).enumerate() {
            let position = finite("motor position", motor.position()?)?;
            let output = abscap(pid.update(position, dt)?, limit);
            trace!(
                "motor {}: err {:.3}, output {:.4}, limit {:.4}",
                i,
                pid.last_error(),
                output,
                limit
            );
            motor.set_power(output * tuning.max_power)?;
        }

        if controllers.iter().all(Pid::is_arrived) {
            return Ok(Outcome::Arrived);
        }
        if clock.now().saturating_sub(start) >= timeout {
            return Ok(Outcome::TimedOut);
        }
        clock.sleep(tick).await;
    }
}

/// Drives every motor forward by `inches`, converted with `geometry`.
pub async fn drive_inches<A: Actuator, C: Clock>(
    motors: &mut [A],
    inches: f64,
    geometry: &DriveGeometry,
    tuning: &DriveTuning,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Outcome> {
    geometry.validate()?;
    let forward = [1.0; MAX_DRIVE_MOTORS];
    let directions = forward.get(..motors.len()).ok_or_else(|| {
        Error::invalid(format!(
            "drive supports at most {MAX_DRIVE_MOTORS} motors, got {}",
            motors.len()
        ))
    })?;
    drive_ticks(
        motors,
        inches * geometry.ticks_per_inch(),
        directions,
        tuning,
        clock,
        cancel,
    )
    .await
}

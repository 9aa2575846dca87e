//! PID controller used by every closed-loop primitive.
//!
//! # How PID Works
//!
//! PID control calculates an output from three terms:
//!
//! - **P (Proportional)**: Output proportional to the error (distance from target).
//! - **I (Integral)**: Output proportional to accumulated error over time.
//! - **D (Derivative)**: Output proportional to the rate of error change.
//!
//! The formula is: `output = Kp*error + Ki*error_sum + Kd*(error - last_error)/dt`
//!
//! # Derivative Baseline
//!
//! The derivative acts on the error, not on the measurement. Retargeting
//! with [`Pid::set_target`] clears the integral and sets `last_error` to the
//! new target value. Tuning constants in the field are calibrated against
//! exactly this behavior, including the sign conventions it implies (which
//! is why a negative `kd` is common in the defaults).
//!
//! # Tuning
//!
//! Start with Kp and increase until the mechanism reaches the target.
//! Add Kd to reduce overshoot. Only add Ki if the mechanism consistently
//! stops short.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Gains and arrival tolerance for one controller.
///
/// Fields left out of a config table take their [`Default`] value, a plain
/// unit proportional loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    /// Proportional gain.
    pub kp:        f64,
    /// Integral gain.
    pub ki:        f64,
    /// Derivative gain. May be negative.
    pub kd:        f64,
    /// The controller counts as arrived while `|error|` is below this.
    pub tolerance: f64,
}

impl Default for PidGains {
    fn default() -> Self { Self::new(1.0, 0.0, 0.0, 1.0) }
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64, tolerance: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            tolerance,
        }
    }

    /// Checks that gains are finite and the tolerance is positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()) {
            return Err(Error::invalid(format!(
                "gains must be finite (kp {}, ki {}, kd {})",
                self.kp, self.ki, self.kd
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(Error::invalid(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// A single feedback loop.
///
/// # Examples
///
/// ```
/// use skar_motion::motion::pid::Pid;
///
/// let mut pid = Pid::new(0.5, 0.0, 0.0, 1.0);
/// pid.set_target(10.0);
/// let output = pid.update(4.0, 2.0).unwrap();
/// assert_eq!(output, 3.0);
/// assert!(!pid.is_arrived());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Pid {
    kp:         f64,
    ki:         f64,
    kd:         f64,
    tolerance:  f64,
    target:     f64,
    error_sum:  f64,
    last_error: f64,
}

impl Pid {
    /// Creates a controller with target, integral and last error at zero.
    pub fn new(kp: f64, ki: f64, kd: f64, tolerance: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            tolerance,
            target: 0.0,
            error_sum: 0.0,
            last_error: 0.0,
        }
    }

    pub fn from_gains(gains: &PidGains) -> Self {
        Self::new(gains.kp, gains.ki, gains.kd, gains.tolerance)
    }

    /// Replaces gains and tolerance. Target and accumulated state are kept.
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64, tolerance: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self.tolerance = tolerance;
    }

    /// Moves the setpoint. Clears the integral and sets the derivative
    /// baseline to `target`.
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
        self.error_sum = 0.0;
        self.last_error = target;
    }

    /// Feeds one measurement taken `dt` after the previous one and returns
    /// the control output.
    ///
    /// `dt` is in whatever time unit the gains were tuned for. It must be
    /// positive; anything else is rejected before the state is touched.
    pub fn update(&mut self, measurement: f64, dt: f64) -> Result<f64> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::invalid(format!("dt must be positive, got {dt}")));
        }
        let error = self.target - measurement;
        self.error_sum += error * dt;
        let derivative = (error - self.last_error) / dt;
        let output = self.kp * error + self.ki * self.error_sum + self.kd * derivative;
        self.last_error = error;
        Ok(output)
    }

    /// Whether the last computed error is strictly inside the tolerance.
    pub fn is_arrived(&self) -> bool { self.last_error.abs() < self.tolerance }

    pub fn kp(&self) -> f64 { self.kp }

    pub fn ki(&self) -> f64 { self.ki }

    pub fn kd(&self) -> f64 { self.kd }

    pub fn tolerance(&self) -> f64 { self.tolerance }

    pub fn target(&self) -> f64 { self.target }

    pub fn error_sum(&self) -> f64 { self.error_sum }

    pub fn last_error(&self) -> f64 { self.last_error }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_controller_is_zeroed() {
        let pid = Pid::new(1.0, 2.0, 3.0, 0.5);
        assert_eq!(pid.target(), 0.0);
        assert_eq!(pid.error_sum(), 0.0);
        assert_eq!(pid.last_error(), 0.0);
        assert_eq!((pid.kp(), pid.ki(), pid.kd()), (1.0, 2.0, 3.0));
    }

    #[test]
    fn default_gains_are_valid() {
        let gains = PidGains::default();
        assert!(gains.validate().is_ok());
        assert_eq!(gains, PidGains::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn update_matches_formula() {
        let mut pid = Pid::new(2.0, 0.5, -0.25, 1.0);
        pid.set_target(10.0);
        // error 6, sum 6*2, derivative (6 - 10) / 2
        let out = pid.update(4.0, 2.0).unwrap();
        let expected = 2.0 * 6.0 + 0.5 * 12.0 + -0.25 * (6.0 - 10.0) / 2.0;
        assert_eq!(out, expected);
        assert_eq!(pid.last_error(), 6.0);
        assert_eq!(pid.error_sum(), 12.0);
    }

    #[test]
    fn update_is_deterministic() {
        let mut a = Pid::new(0.3, 0.01, -0.05, 1.0);
        a.set_target(42.0);
        a.update(3.0, 2.0).unwrap();
        let mut b = a.clone();

        let out_a = a.update(17.5, 2.0).unwrap();
        let out_b = b.update(17.5, 2.0).unwrap();
        assert_eq!(out_a, out_b);
        assert_eq!(a, b);
    }

    #[test]
    fn set_target_resets_state_regardless_of_history() {
        let mut pid = Pid::new(1.0, 1.0, 1.0, 1.0);
        pid.set_target(5.0);
        for m in [0.0, 1.0, 2.5, 9.0] {
            pid.update(m, 5.0).unwrap();
        }
        pid.set_target(-7.0);
        assert_eq!(pid.target(), -7.0);
        assert_eq!(pid.error_sum(), 0.0);
        assert_eq!(pid.last_error(), -7.0);

        let snapshot = pid.clone();
        pid.set_target(-7.0);
        assert_eq!(pid, snapshot);
    }

    #[test]
    fn set_gains_keeps_state() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 1.0);
        pid.set_target(3.0);
        pid.update(1.0, 1.0).unwrap();
        pid.set_gains(4.0, 0.1, 0.2, 0.5);
        assert_eq!(pid.target(), 3.0);
        assert_eq!(pid.last_error(), 2.0);
        assert_eq!(pid.error_sum(), 2.0);
        assert_eq!(pid.kp(), 4.0);
        assert_eq!(pid.tolerance(), 0.5);
    }

    #[test]
    fn arrival_uses_strict_inequality() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 2.0);
        pid.set_target(10.0);
        pid.update(8.0, 1.0).unwrap();
        assert_eq!(pid.last_error(), 2.0);
        assert!(!pid.is_arrived());

        pid.update(8.5, 1.0).unwrap();
        assert!(pid.is_arrived());

        pid.update(12.0, 1.0).unwrap();
        assert!(!pid.is_arrived());
    }

    #[test]
    fn non_positive_dt_is_rejected_without_side_effects() {
        let mut pid = Pid::new(1.0, 1.0, 1.0, 1.0);
        pid.set_target(1.0);
        let before = pid.clone();
        assert!(matches!(
            pid.update(0.0, 0.0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(pid.update(0.0, -2.0).is_err());
        assert!(pid.update(0.0, f64::NAN).is_err());
        assert_eq!(pid, before);
    }

    #[test]
    fn gains_validation() {
        assert!(PidGains::new(0.1, 0.0, -0.05, 100.0).validate().is_ok());
        assert!(PidGains::new(0.1, 0.0, 0.0, 0.0).validate().is_err());
        assert!(PidGains::new(0.1, 0.0, 0.0, -1.0).validate().is_err());
        assert!(PidGains::new(f64::INFINITY, 0.0, 0.0, 1.0).validate().is_err());
    }
}
